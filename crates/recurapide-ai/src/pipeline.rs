//! End-to-end receipt extraction: normalise → OCR → combine → prompt →
//! complete → validate.

use std::sync::Arc;

use recurapide_core::{
    PipelineError, StructuredResult, build_instruction, combine, normalize, validate_completion,
};
use tracing::{debug, info};

use crate::completion::{CompletionBackend, invoke};
use crate::ocr::{TextRecognizer, recognize_bytes};

/// Successful outcome of one extraction request.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Text recognised in the uploaded image; `None` when no image was sent.
    pub ocr_text: Option<String>,
    pub formatted: StructuredResult,
}

/// Receipt extraction pipeline.
///
/// Holds only shared, immutable collaborators; each call to
/// [`extract`](Self::extract) owns all of its intermediate data.
#[derive(Clone)]
pub struct ReceiptPipeline {
    recognizer: Arc<dyn TextRecognizer>,
    completion: Arc<dyn CompletionBackend>,
}

impl ReceiptPipeline {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            recognizer,
            completion,
        }
    }

    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    pub fn model(&self) -> &str {
        self.completion.model()
    }

    /// Run one request through every stage. The first failing stage's error is
    /// returned unchanged; nothing is retried.
    pub async fn extract(
        &self,
        image: Option<Vec<u8>>,
        text: Option<String>,
    ) -> Result<Extraction, PipelineError> {
        let input = normalize(image.as_deref(), text.as_deref())?;
        info!(
            has_image = input.has_image,
            text_chars = input.text.chars().count(),
            "extraction request accepted"
        );

        let ocr_text = match image {
            Some(bytes) if input.has_image => Some(self.recognize(bytes).await?),
            _ => None,
        };

        let evidence = combine(ocr_text.as_deref(), &input.text)?;
        let instruction = build_instruction(&evidence);
        info!(evidence_bytes = evidence.len(), "evidence assembled");

        let raw = invoke(self.completion.as_ref(), &instruction).await?;
        let formatted = validate_completion(&raw)?;
        info!(
            transactions = formatted.transactions.len(),
            summary_fields = formatted.summary_fields.len(),
            total = formatted.transactions_total(),
            "completion validated"
        );

        Ok(Extraction {
            ocr_text,
            formatted,
        })
    }

    /// OCR is blocking, so it runs on the blocking pool.
    async fn recognize(&self, bytes: Vec<u8>) -> Result<String, PipelineError> {
        let recognizer = Arc::clone(&self.recognizer);
        let text =
            tokio::task::spawn_blocking(move || recognize_bytes(recognizer.as_ref(), &bytes))
                .await
                .map_err(|e| PipelineError::OcrExecution(format!("OCR task failed: {e}")))??;

        info!(
            engine = self.recognizer.name(),
            chars = text.chars().count(),
            "image processed by OCR"
        );
        debug!(ocr_text = %text, "OCR output");
        Ok(text)
    }
}
