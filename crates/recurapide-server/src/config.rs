use std::time::Duration;

use clap::Parser;
use recurapide_ai::completion::DEFAULT_BASE_URL;
use recurapide_ai::{CompletionConfig, OcrConfig};

/// Receipt OCR and structuring service.
///
/// Every option can also be set through the environment (or a `.env` file).
#[derive(Parser)]
#[command(name = "recurapide", version, about)]
pub struct Config {
    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// Completion model identifier
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: String,

    /// Completion service credential
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Root of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Timeout for one completion call, in seconds
    #[arg(long, env = "COMPLETION_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Tesseract language code
    #[arg(long, env = "OCR_LANG", default_value = "eng")]
    pub ocr_lang: String,

    /// Directory containing Tesseract language data
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata: Option<String>,

    /// Maximum request body size in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 10)]
    pub max_upload_mb: usize,

    /// Allow cross-origin requests from any origin
    #[arg(long, env = "CORS")]
    pub cors: bool,
}

impl Config {
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn ocr(&self) -> OcrConfig {
        OcrConfig {
            language: self.ocr_lang.clone(),
            data_path: self.tessdata.clone(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
