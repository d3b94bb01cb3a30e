pub mod config;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use config::{ConfigError, OcrConfig, TesseractConfig};
pub use extract::{Extractor, KeywordTable};
pub use pipeline::{ProcessError, ReceiptProcessor};
pub use preprocess::{prepare_for_ocr, prepare_for_ocr_from_bytes, PreprocessConfig, PreprocessError};
pub use recognizer::{
    BackendChain, BackendFailure, FailingRecognizer, MockRecognizer, OcrBackend, OcrError,
    Recognized, TesseractCli,
};
pub use types::{
    AmountCandidate, AmountPattern, DateCandidate, ExtractionResult, MerchantCandidate,
    MerchantPass,
};
