use thiserror::Error;

/// Classification of a pipeline failure, one per origin component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Neither an image nor non-blank text was supplied.
    MissingEvidence,
    /// The uploaded bytes are not a readable image.
    ImageDecode,
    /// The OCR engine failed while recognising a decoded image.
    OcrExecution,
    /// The completion service errored, timed out, or answered with nothing.
    CompletionUnavailable,
    /// The model's answer is not parseable JSON.
    MalformedJson,
    /// The model's answer is JSON but does not match the receipt schema.
    SchemaViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingEvidence => "MissingEvidence",
            Self::ImageDecode => "ImageDecodeError",
            Self::OcrExecution => "OCRExecutionError",
            Self::CompletionUnavailable => "CompletionUnavailable",
            Self::MalformedJson => "MalformedJSON",
            Self::SchemaViolation => "SchemaViolation",
        }
    }

    /// Whether the failure was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingEvidence | Self::ImageDecode)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no image or text provided")]
    MissingEvidence,

    #[error("invalid image file: {0}")]
    ImageDecode(String),

    #[error("OCR processing failed: {0}")]
    OcrExecution(String),

    #[error("completion service unavailable: {0}")]
    CompletionUnavailable(String),

    #[error("model output is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("model output violates the receipt schema: {0}")]
    SchemaViolation(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingEvidence => ErrorKind::MissingEvidence,
            Self::ImageDecode(_) => ErrorKind::ImageDecode,
            Self::OcrExecution(_) => ErrorKind::OcrExecution,
            Self::CompletionUnavailable(_) => ErrorKind::CompletionUnavailable,
            Self::MalformedJson(_) => ErrorKind::MalformedJson,
            Self::SchemaViolation(_) => ErrorKind::SchemaViolation,
        }
    }
}
