use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info, info_span};

use crate::config::{ConfigError, OcrConfig};
use crate::extract::Extractor;
use crate::recognizer::{panic_message, recognize_caught, BackendChain, OcrBackend, OcrError};
use crate::types::ExtractionResult;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to read receipt: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Extraction failed: {0}")]
    Extraction(String),
}

/// Orchestrates: OCR → field extraction → scored result.
///
/// Never returns an error: every failure becomes an [`ExtractionResult`] with
/// `success == false`. Holds no mutable state, so one instance can serve
/// concurrent callers behind an `Arc`.
pub struct ReceiptProcessor<B: OcrBackend = BackendChain> {
    backend: B,
    extractor: Extractor,
}

impl ReceiptProcessor<BackendChain> {
    /// Backends, keyword table and preprocessing all taken from `cfg`.
    pub fn from_config(cfg: &OcrConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_extractor(
            cfg.backend_chain()?,
            Extractor::new(cfg.keyword_table()?),
        ))
    }
}

impl<B: OcrBackend> ReceiptProcessor<B> {
    pub fn new(backend: B) -> Self {
        Self::with_extractor(backend, Extractor::default())
    }

    pub fn with_extractor(backend: B, extractor: Extractor) -> Self {
        Self { backend, extractor }
    }

    /// Recognize and extract one receipt image.
    pub fn process(&self, image_bytes: &[u8]) -> ExtractionResult {
        let span = info_span!("receipt", bytes = image_bytes.len());
        let _enter = span.enter();
        match recognize_caught(&self.backend, image_bytes) {
            Ok(text) => self.process_text(&text),
            Err(e) => failed("", ProcessError::Ocr(e)),
        }
    }

    /// Read an image from disk (blocking) and process it.
    pub fn process_path(&self, path: &Path) -> ExtractionResult {
        match std::fs::read(path) {
            Ok(bytes) => self.process(&bytes),
            Err(e) => failed("", ProcessError::Io(e)),
        }
    }

    /// Read an image with `tokio::fs` and process it. Recognition itself still
    /// runs on the calling task.
    pub async fn process_file(&self, path: &Path) -> ExtractionResult {
        match tokio::fs::read(path).await {
            Ok(bytes) => self.process(&bytes),
            Err(e) => failed("", ProcessError::Io(e)),
        }
    }

    /// Run the extractors on already-recognized text.
    pub fn process_text(&self, text: &str) -> ExtractionResult {
        guard(text, || self.extractor.extract(text))
    }
}

/// Runs one extraction, turning a panic into a failed result that keeps `raw_text`.
fn guard<F>(raw_text: &str, extract: F) -> ExtractionResult
where
    F: FnOnce() -> ExtractionResult,
{
    match panic::catch_unwind(AssertUnwindSafe(extract)) {
        Ok(result) => {
            info!(
                merchant = result.merchant.as_deref().unwrap_or("-"),
                amount = %result.amount.map(|a| a.to_plain_string()).unwrap_or_default(),
                date = result.date.as_deref().unwrap_or("-"),
                category = %result.category,
                confidence = result.confidence,
                "receipt extracted"
            );
            if result.needs_review() {
                debug!("low confidence, flag for review");
            }
            result
        }
        Err(payload) => failed(raw_text, ProcessError::Extraction(panic_message(payload.as_ref()))),
    }
}

fn failed(raw_text: &str, err: ProcessError) -> ExtractionResult {
    error!(error = %err, "receipt processing failed");
    ExtractionResult::failed(raw_text, err.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{FailingRecognizer, MockRecognizer};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;
    use std::sync::Arc;
    use tally_core::{Category, Money};

    const RECEIPT: &str = "CORNER GROCERY STORE\n\
                           Date: 2024-01-15\n\
                           Bananas      1.99\n\
                           Milk         3.49\n\
                           Subtotal     5.48\n\
                           TOTAL        5.48\n\
                           VISA ****4321";

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn assert_safe_defaults(r: &ExtractionResult) {
        assert!(!r.success);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.category, Category::Others);
        assert_eq!(r.amount, None);
        assert_eq!(r.merchant, None);
        assert_eq!(r.date, None);
        assert!(r.error.is_some());
    }

    #[test]
    fn process_produces_extraction_result() {
        init_tracing();
        let processor = ReceiptProcessor::new(MockRecognizer::new(RECEIPT));
        let r = processor.process(&tiny_png());

        assert!(r.success);
        assert_eq!(r.amount, Some(Money::from_cents(548)));
        assert_eq!(r.merchant.as_deref(), Some("CORNER GROCERY STORE"));
        assert_eq!(r.date.as_deref(), Some("2024-01-15"));
        assert_eq!(r.category, Category::Shopping);
        assert_eq!(r.raw_text, RECEIPT);
        assert!(r.confidence > 0.9);
    }

    #[test]
    fn every_backend_failing_is_contained() {
        init_tracing();
        let chain = BackendChain::new()
            .with(FailingRecognizer::new("model missing"))
            .with(FailingRecognizer::new("timeout"));
        let r = ReceiptProcessor::new(chain).process(&tiny_png());

        assert_safe_defaults(&r);
        assert_eq!(r.raw_text, "");
        let msg = r.error.unwrap();
        assert!(msg.contains("model missing") && msg.contains("timeout"), "{msg}");
    }

    #[test]
    fn fallback_backend_is_used() {
        let chain = BackendChain::new()
            .with(FailingRecognizer::new("boom"))
            .with(MockRecognizer::new(RECEIPT));
        let r = ReceiptProcessor::new(chain).process(b"ignored");
        assert!(r.success);
        assert_eq!(r.amount, Some(Money::from_cents(548)));
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let processor = ReceiptProcessor::new(MockRecognizer::new(RECEIPT));
        assert_eq!(processor.process(b"a"), processor.process(b"a"));
        assert_eq!(processor.process_text(RECEIPT), processor.process_text(RECEIPT));
    }

    #[test]
    fn extraction_panic_becomes_failed_result() {
        let r = guard("TOTAL 1.00", || panic!("regex exploded"));
        assert_safe_defaults(&r);
        assert_eq!(r.raw_text, "TOTAL 1.00");
        assert_eq!(r.error.as_deref(), Some("Extraction failed: regex exploded"));
    }

    struct ExplodingRecognizer;

    impl OcrBackend for ExplodingRecognizer {
        fn name(&self) -> &str {
            "exploding"
        }

        fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
            panic!("segfault in engine")
        }
    }

    #[test]
    fn panicking_backend_is_contained() {
        let r = ReceiptProcessor::new(ExplodingRecognizer).process(b"img");
        assert_safe_defaults(&r);
        assert_eq!(r.raw_text, "");
        assert!(r.error.unwrap().contains("segfault in engine"));
    }

    #[test]
    fn fullwidth_digits_do_not_sink_other_fields() {
        let text = "STARBUCKS COFFEE\nTotal $9.54\nＴＸＮ ２０２４０３１５";
        let r = ReceiptProcessor::new(MockRecognizer::new(text)).process(b"img");
        assert!(r.success);
        assert_eq!(r.merchant.as_deref(), Some("STARBUCKS COFFEE"));
        assert_eq!(r.amount, Some(Money::from_cents(954)));
        assert_eq!(r.date, None);
    }

    #[test]
    fn missing_file_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let processor = ReceiptProcessor::new(MockRecognizer::new(RECEIPT));
        let r = processor.process_path(&dir.path().join("nope.png"));
        assert_safe_defaults(&r);
        assert!(r.error.unwrap().starts_with("Failed to read receipt"));
    }

    #[test]
    fn process_path_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, tiny_png()).unwrap();
        let processor = ReceiptProcessor::new(MockRecognizer::new(RECEIPT));
        assert!(processor.process_path(&path).success);
    }

    #[tokio::test]
    async fn process_file_reads_asynchronously() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        tokio::fs::write(&path, tiny_png()).await.unwrap();

        let processor = ReceiptProcessor::new(MockRecognizer::new(RECEIPT));
        let r = processor.process_file(&path).await;
        assert!(r.success);
        assert_eq!(r.date.as_deref(), Some("2024-01-15"));

        let missing = processor.process_file(&dir.path().join("missing.jpg")).await;
        assert_safe_defaults(&missing);
    }

    #[tokio::test]
    async fn processor_is_shareable_across_tasks() {
        let processor = Arc::new(ReceiptProcessor::new(MockRecognizer::new(RECEIPT)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&processor);
                tokio::spawn(async move { p.process(b"img") })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().amount, Some(Money::from_cents(548)));
        }
    }

    #[test]
    fn from_config_with_unusable_cli_fails_softly() {
        let mut cfg = OcrConfig { backends: vec!["tesseract-cli".into()], ..OcrConfig::default() };
        cfg.tesseract.program = "definitely-not-a-real-tesseract-binary".into();
        let processor = ReceiptProcessor::from_config(&cfg).unwrap();
        let r = processor.process(&tiny_png());
        assert_safe_defaults(&r);
        assert!(r.error.unwrap().contains("not available"));
    }

    #[test]
    fn empty_ocr_text_is_a_successful_empty_result() {
        let r = ReceiptProcessor::new(MockRecognizer::new("")).process(b"img");
        assert!(r.success);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.category, Category::Others);
    }
}
