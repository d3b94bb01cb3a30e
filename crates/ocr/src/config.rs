use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tally_core::Category;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::extract::KeywordTable;
use crate::preprocess::PreprocessConfig;
use crate::recognizer::{BackendChain, TesseractCli};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unknown category in keyword table: '{0}'")]
    UnknownCategory(String),
    #[error("Unknown OCR backend: '{0}'")]
    UnknownBackend(String),
}

/// Tesseract settings shared by the library and CLI backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub data_path: Option<String>,
    pub lang: String,
    /// Page-segmentation modes to try; the longest output wins.
    pub page_seg_modes: Vec<u32>,
    /// Executable used by the `tesseract-cli` backend.
    pub program: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            lang: "eng".to_string(),
            page_seg_modes: vec![6, 4, 3],
            program: "tesseract".to_string(),
        }
    }
}

/// Construction-time settings for a [`crate::ReceiptProcessor`].
///
/// ```toml
/// backends = ["tesseract", "tesseract-cli"]
/// log_level = "debug"
///
/// [tesseract]
/// lang = "eng"
/// page_seg_modes = [6, 4]
///
/// [preprocess]
/// blur_sigma = 0.8
///
/// [category_keywords]
/// "Groceries" = ["lidl", "co-op"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Backend names in the order they are tried.
    pub backends: Vec<String>,
    pub tesseract: TesseractConfig,
    pub preprocess: PreprocessConfig,
    /// Extra keywords per category label, appended to the built-in table.
    pub category_keywords: BTreeMap<String, Vec<String>>,
    /// Directive for the host's tracing subscriber, see [`OcrConfig::log_filter`].
    pub log_level: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backends: vec!["tesseract".to_string(), "tesseract-cli".to_string()],
            tesseract: TesseractConfig::default(),
            preprocess: PreprocessConfig::default(),
            category_keywords: BTreeMap::new(),
            log_level: "info".to_string(),
        }
    }
}

impl OcrConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Filter built from `log_level`; an unparsable directive falls back to `info`.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|e| {
            tracing::warn!(log_level = %self.log_level, error = %e, "invalid log_level, using info");
            EnvFilter::new("info")
        })
    }

    /// Built-in keywords plus the configured extras.
    pub fn keyword_table(&self) -> Result<KeywordTable, ConfigError> {
        let mut table = KeywordTable::default();
        for (label, words) in &self.category_keywords {
            let category: Category = label
                .parse()
                .map_err(|_| ConfigError::UnknownCategory(label.clone()))?;
            table.extend(category, words);
        }
        Ok(table)
    }

    /// The configured backends, in order. A backend compiled out of this
    /// build is skipped with a warning.
    pub fn backend_chain(&self) -> Result<BackendChain, ConfigError> {
        let mut chain = BackendChain::new();
        for name in &self.backends {
            match name.trim().to_lowercase().as_str() {
                "tesseract" => self.push_tesseract(&mut chain),
                "tesseract-cli" => chain.push(Box::new(
                    TesseractCli::new(&self.tesseract.lang)
                        .program(self.tesseract.program.clone())
                        .data_path(self.tesseract.data_path.clone())
                        .page_seg_modes(self.tesseract.page_seg_modes.clone())
                        .preprocess(self.preprocess.clone()),
                )),
                _ => return Err(ConfigError::UnknownBackend(name.clone())),
            }
        }
        Ok(chain)
    }

    #[cfg(feature = "tesseract")]
    fn push_tesseract(&self, chain: &mut BackendChain) {
        use crate::recognizer::tesseract_backend::TesseractRecognizer;
        chain.push(Box::new(
            TesseractRecognizer::new(self.tesseract.data_path.clone(), &self.tesseract.lang)
                .page_seg_modes(self.tesseract.page_seg_modes.clone())
                .preprocess(self.preprocess.clone()),
        ));
    }

    #[cfg(not(feature = "tesseract"))]
    fn push_tesseract(&self, _chain: &mut BackendChain) {
        tracing::warn!("`tesseract` backend requested but this build lacks the `tesseract` feature; skipping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_any_keys() {
        let cfg = OcrConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, OcrConfig::default());
        assert_eq!(cfg.preprocess.threshold_block, 11);
        assert_eq!(cfg.tesseract.lang, "eng");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg = OcrConfig::from_toml_str(
            r#"
backends = ["tesseract-cli"]
log_level = "debug"

[tesseract]
lang = "deu"

[preprocess]
blur_sigma = 0.5
"#,
        )
        .unwrap();
        assert_eq!(cfg.backends, vec!["tesseract-cli"]);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.tesseract.lang, "deu");
        assert_eq!(cfg.tesseract.page_seg_modes, vec![6, 4, 3]);
        assert_eq!(cfg.preprocess.blur_sigma, 0.5);
        assert_eq!(cfg.preprocess.max_dimension, 2800);
    }

    #[test]
    fn log_level_becomes_filter() {
        let cfg = OcrConfig { log_level: "debug".into(), ..OcrConfig::default() };
        assert!(cfg.log_filter().to_string().eq_ignore_ascii_case("debug"));
        let scoped = OcrConfig { log_level: "tally_ocr=trace".into(), ..OcrConfig::default() };
        assert!(scoped.log_filter().to_string().contains("tally_ocr"));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            OcrConfig::from_toml_str("backends = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn extra_keywords_reach_the_table() {
        let cfg = OcrConfig::from_toml_str(
            r#"
[category_keywords]
"groceries" = ["Lidl"]
"Food & Dining" = ["taqueria"]
"#,
        )
        .unwrap();
        let table = cfg.keyword_table().unwrap();
        assert_eq!(table.classify("", Some("LIDL")), Category::Groceries);
        assert_eq!(table.classify("", Some("La Taqueria")), Category::FoodAndDining);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut cfg = OcrConfig::default();
        cfg.category_keywords.insert("Pets".into(), vec!["vet".into()]);
        assert!(matches!(cfg.keyword_table(), Err(ConfigError::UnknownCategory(l)) if l == "Pets"));
    }

    #[test]
    fn backend_chain_follows_order() {
        let cfg = OcrConfig { backends: vec!["tesseract-cli".into()], ..OcrConfig::default() };
        assert_eq!(cfg.backend_chain().unwrap().names(), vec!["tesseract-cli"]);

        let bad = OcrConfig { backends: vec!["easyocr".into()], ..OcrConfig::default() };
        assert!(matches!(bad.backend_chain(), Err(ConfigError::UnknownBackend(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocr.toml");
        std::fs::write(&path, "log_level = \"warn\"\n").unwrap();
        assert_eq!(OcrConfig::load(&path).unwrap().log_level, "warn");
        assert!(matches!(
            OcrConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
