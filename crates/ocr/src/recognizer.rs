use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

use crate::preprocess::{self, PreprocessConfig, PreprocessError};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR backend not available: {0}")]
    NotAvailable(String),
    #[error("All OCR backends failed: {}", summarize(.0))]
    AllBackendsFailed(Vec<BackendFailure>),
}

/// One backend's error, kept for the aggregate failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub backend: String,
    pub message: String,
}

fn summarize(failures: &[BackendFailure]) -> String {
    if failures.is_empty() {
        return "no backends configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.backend, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<PreprocessError> for OcrError {
    fn from(e: PreprocessError) -> Self {
        match e {
            PreprocessError::Load(e) => OcrError::ImageDecode(e.to_string()),
            PreprocessError::Encode(msg) => OcrError::Engine(msg),
        }
    }
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

// ── Backend chain ─────────────────────────────────────────────────────────────

/// Text plus the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognized {
    pub text: String,
    pub backend: String,
}

/// Backends tried one after another, in insertion order, until one succeeds.
#[derive(Default)]
pub struct BackendChain {
    backends: Vec<Box<dyn OcrBackend>>,
}

impl BackendChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: impl OcrBackend + 'static) -> Self {
        self.push(Box::new(backend));
        self
    }

    pub fn push(&mut self, backend: Box<dyn OcrBackend>) {
        self.backends.push(backend);
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// First successful recognition. Empty text counts as success.
    pub fn recognize_first(&self, image_bytes: &[u8]) -> Result<Recognized, OcrError> {
        let mut failures = Vec::new();
        for backend in &self.backends {
            match recognize_caught(backend.as_ref(), image_bytes) {
                Ok(text) => {
                    debug!(backend = backend.name(), chars = text.len(), "OCR succeeded");
                    return Ok(Recognized { text, backend: backend.name().to_string() });
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "OCR backend failed, trying next");
                    failures.push(BackendFailure {
                        backend: backend.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Err(OcrError::AllBackendsFailed(failures))
    }
}

impl std::fmt::Debug for BackendChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendChain").field("backends", &self.names()).finish()
    }
}

impl OcrBackend for BackendChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        self.recognize_first(image_bytes).map(|r| r.text)
    }
}

/// Calls `backend`, turning a panic inside it into an engine error.
pub(crate) fn recognize_caught<B>(backend: &B, image_bytes: &[u8]) -> Result<String, OcrError>
where
    B: OcrBackend + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| backend.recognize(image_bytes))).unwrap_or_else(|payload| {
        Err(OcrError::Engine(format!(
            "{} panicked: {}",
            backend.name(),
            panic_message(payload.as_ref())
        )))
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ── Mock backends (always available, used for tests) ──────────────────────────

/// Returns a pre-set string, for testing the extraction pipeline
/// without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn name(&self) -> &str {
        "mock"
    }

    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Always fails with an engine error.
pub struct FailingRecognizer {
    pub message: String,
}

impl FailingRecognizer {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl OcrBackend for FailingRecognizer {
    fn name(&self) -> &str {
        "failing"
    }

    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::Engine(self.message.clone()))
    }
}

// ── Multi-pass helpers ────────────────────────────────────────────────────────

/// Runs `pass` once per page-segmentation mode and keeps the longest trimmed
/// output; the earliest mode wins ties. Fails only if every pass fails.
fn best_of_passes<F>(modes: &[u32], mut pass: F) -> Result<String, OcrError>
where
    F: FnMut(u32) -> Result<String, OcrError>,
{
    let modes: &[u32] = if modes.is_empty() { &[DEFAULT_PSM] } else { modes };
    let mut best: Option<String> = None;
    let mut last_err = None;
    for &psm in modes {
        match pass(psm) {
            Ok(text) => {
                let text = text.trim().to_string();
                debug!(psm, chars = text.len(), "OCR pass finished");
                if best.as_ref().map_or(true, |b| text.len() > b.len()) {
                    best = Some(text);
                }
            }
            Err(e) => {
                debug!(psm, error = %e, "OCR pass failed");
                last_err = Some(e);
            }
        }
    }
    match (best, last_err) {
        (Some(text), _) => Ok(text),
        (None, Some(e)) => Err(e),
        (None, None) => Ok(String::new()),
    }
}

/// Single uniform block of text.
const DEFAULT_PSM: u32 = 6;

// ── Tesseract CLI backend ─────────────────────────────────────────────────────

/// Shells out to the `tesseract` executable, feeding the preprocessed image on stdin.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    data_path: Option<String>,
    lang: String,
    page_seg_modes: Vec<u32>,
    preprocess: PreprocessConfig,
}

impl TesseractCli {
    pub fn new(lang: &str) -> Self {
        Self {
            program: "tesseract".to_string(),
            data_path: None,
            lang: lang.to_string(),
            page_seg_modes: vec![DEFAULT_PSM],
            preprocess: PreprocessConfig::default(),
        }
    }

    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn data_path(mut self, data_path: Option<String>) -> Self {
        self.data_path = data_path;
        self
    }

    pub fn page_seg_modes(mut self, modes: Vec<u32>) -> Self {
        self.page_seg_modes = modes;
        self
    }

    pub fn preprocess(mut self, cfg: PreprocessConfig) -> Self {
        self.preprocess = cfg;
        self
    }

    fn run_once(&self, png: &[u8], psm: u32) -> Result<String, OcrError> {
        let psm = psm.to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(["stdin", "stdout", "--psm", psm.as_str(), "-l", self.lang.as_str()]);
        if let Some(dir) = &self.data_path {
            cmd.args(["--tessdata-dir", dir.as_str()]);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    OcrError::NotAvailable(format!("`{}` not found on PATH", self.program))
                }
                _ => OcrError::Engine(format!("failed to start `{}`: {e}", self.program)),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(png)
                .map_err(|e| OcrError::Engine(format!("failed to write image: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| OcrError::Engine(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "tesseract failed (code {:?}): {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrBackend for TesseractCli {
    fn name(&self) -> &str {
        "tesseract-cli"
    }

    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let png = preprocess::prepare_for_ocr_from_bytes(image_bytes, &self.preprocess)?;
        best_of_passes(&self.page_seg_modes, |psm| self.run_once(&png, psm))
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{best_of_passes, OcrBackend, OcrError, DEFAULT_PSM};
    use crate::preprocess::{self, PreprocessConfig};
    use leptess::{LepTess, Variable};

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
        page_seg_modes: Vec<u32>,
        preprocess: PreprocessConfig,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self {
                data_path,
                lang: lang.to_string(),
                page_seg_modes: vec![DEFAULT_PSM],
                preprocess: PreprocessConfig::default(),
            }
        }

        pub fn page_seg_modes(mut self, modes: Vec<u32>) -> Self {
            self.page_seg_modes = modes;
            self
        }

        pub fn preprocess(mut self, cfg: PreprocessConfig) -> Self {
            self.preprocess = cfg;
            self
        }

        fn run_once(&self, png: &[u8], psm: u32) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::NotAvailable(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, &psm.to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let png = preprocess::prepare_for_ocr_from_bytes(image_bytes, &self.preprocess)?;
            best_of_passes(&self.page_seg_modes, |psm| self.run_once(&png, psm))
        }
    }
}
