//! Input normalisation and evidence assembly.
//!
//! A request carries an optional receipt image and optional free text. The
//! normaliser decides whether there is anything to work with; the combiner
//! merges the OCR pass and the user's text into one block, OCR first.

use crate::error::PipelineError;

/// Marker placed between OCR text and the user's own notes.
pub const USER_CONTEXT_SEPARATOR: &str = "\n\n--- Additional context from user ---\n";

/// A request's inputs after normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInput {
    pub has_image: bool,
    /// User text with surrounding whitespace removed; may be empty when an image is present.
    pub text: String,
}

/// Check that a request carries at least one usable source.
///
/// A zero-length image counts as absent, as does text that is blank after trimming.
pub fn normalize(
    image: Option<&[u8]>,
    text: Option<&str>,
) -> Result<NormalizedInput, PipelineError> {
    let has_image = image.is_some_and(|bytes| !bytes.is_empty());
    let text = text.map(str::trim).unwrap_or_default().to_string();

    if !has_image && text.is_empty() {
        return Err(PipelineError::MissingEvidence);
    }

    Ok(NormalizedInput { has_image, text })
}

/// Combined textual evidence handed to the structuring step.
///
/// Only [`combine`] builds one, so every instance holds at least one
/// non-whitespace character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence(String);

impl Evidence {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Merge OCR output and user text into one evidence block.
///
/// OCR text is kept byte-for-byte. When both sources are present the user text
/// follows [`USER_CONTEXT_SEPARATOR`]. Evidence with no visible characters is
/// refused with [`PipelineError::MissingEvidence`], which covers an image whose
/// OCR pass came back blank with nothing typed alongside it.
pub fn combine(ocr_text: Option<&str>, user_text: &str) -> Result<Evidence, PipelineError> {
    let combined = match (ocr_text, user_text.is_empty()) {
        (Some(ocr), false) => format!("{ocr}{USER_CONTEXT_SEPARATOR}{user_text}"),
        (Some(ocr), true) => ocr.to_string(),
        (None, _) => user_text.to_string(),
    };

    if combined.trim().is_empty() {
        return Err(PipelineError::MissingEvidence);
    }

    Ok(Evidence(combined))
}
