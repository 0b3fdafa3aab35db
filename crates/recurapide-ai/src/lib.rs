pub mod completion;
pub mod ocr;
pub mod pipeline;

pub use completion::{
    ChatCompletionClient, CompletionBackend, CompletionConfig, CompletionError, CompletionRequest,
};
pub use ocr::{OcrConfig, OcrError, TextRecognizer, UnavailableRecognizer, default_recognizer};
#[cfg(feature = "tesseract")]
pub use ocr::TesseractRecognizer;
pub use pipeline::{Extraction, ReceiptPipeline};
