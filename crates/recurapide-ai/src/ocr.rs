//! Text recognition over uploaded receipt images.
//!
//! Bytes are decoded with the `image` crate first, so an unreadable upload is
//! reported as a decode failure before any engine runs. The Tesseract engine
//! needs the system Tesseract/Leptonica libraries and is only compiled with the
//! `tesseract` feature.

use std::sync::Arc;

use image::DynamicImage;
use recurapide_core::PipelineError;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("OCR engine error: {0}")]
    Engine(String),
}

impl From<OcrError> for PipelineError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::ImageDecode(e) => PipelineError::ImageDecode(e.to_string()),
            OcrError::Engine(msg) => PipelineError::OcrExecution(msg),
        }
    }
}

/// Engine settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    /// Tesseract language code, e.g. `eng`.
    pub language: String,
    /// Directory holding `tessdata`; `None` uses the engine's default lookup.
    pub data_path: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            data_path: None,
        }
    }
}

/// A pluggable OCR capability.
///
/// Implementations block; callers run them off the async executor.
pub trait TextRecognizer: Send + Sync {
    /// Engine identifier used in logs.
    fn name(&self) -> &'static str;

    /// Recognise text in a decoded image. An image without text yields `Ok("")`.
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Decode uploaded bytes into an image, guessing the format from its contents.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Decode `bytes` and run `recognizer` over the result.
pub fn recognize_bytes(recognizer: &dyn TextRecognizer, bytes: &[u8]) -> Result<String, OcrError> {
    let image = decode_image(bytes)?;
    debug!(
        engine = recognizer.name(),
        width = image.width(),
        height = image.height(),
        "image decoded"
    );
    recognizer.recognize(&image)
}

/// Stand-in engine for builds without an OCR backend. Every image fails.
pub struct UnavailableRecognizer;

impl TextRecognizer for UnavailableRecognizer {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Err(OcrError::Engine(
            "no OCR engine available; build with the `tesseract` feature".to_string(),
        ))
    }
}

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat};
    use leptess::LepTess;

    use super::{OcrConfig, OcrError, TextRecognizer};

    /// Tesseract via `leptess`. A fresh engine is initialised per image.
    pub struct TesseractRecognizer {
        config: OcrConfig,
    }

    impl TesseractRecognizer {
        pub fn new(config: OcrConfig) -> Self {
            Self { config }
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn name(&self) -> &'static str {
            "tesseract"
        }

        fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
            // Leptonica reads encoded bytes, so hand it a lossless PNG.
            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| OcrError::Engine(format!("re-encode image: {e}")))?;

            let mut lt = LepTess::new(self.config.data_path.as_deref(), &self.config.language)
                .map_err(|e| OcrError::Engine(format!("tesseract init: {e}")))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::Engine(format!("tesseract set image: {e}")))?;
            lt.get_utf8_text()
                .map_err(|e| OcrError::Engine(format!("tesseract run: {e}")))
        }
    }
}

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;

/// The engine compiled into this build.
pub fn default_recognizer(config: &OcrConfig) -> Arc<dyn TextRecognizer> {
    #[cfg(feature = "tesseract")]
    {
        Arc::new(TesseractRecognizer::new(config.clone()))
    }
    #[cfg(not(feature = "tesseract"))]
    {
        let _ = config;
        Arc::new(UnavailableRecognizer)
    }
}
