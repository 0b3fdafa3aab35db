//! HTTP surface: `POST /extract-and-format-ocr` and `GET /health`.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use recurapide_ai::ReceiptPipeline;
use recurapide_core::{PipelineError, StructuredResult};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
struct AppState {
    pipeline: ReceiptPipeline,
}

/// Build the service router.
pub fn router(pipeline: ReceiptPipeline, max_upload_bytes: usize, cors: bool) -> Router {
    let app = Router::new()
        .route("/health", get(health))
        .route("/extract-and-format-ocr", post(extract_and_format))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline });

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

#[derive(Serialize)]
struct ExtractResponse {
    status: &'static str,
    ocr_text: String,
    formatted_data: StructuredResult,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::Pipeline(e) => {
                let kind = e.kind();
                let status = if kind.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, kind.as_str())
            }
            ApiError::Multipart(e) => (e.status(), "InvalidMultipart"),
        };

        let details = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error, %details, "extraction failed");
        } else {
            warn!(status = status.as_u16(), error, %details, "extraction rejected");
        }

        (status, Json(ErrorBody { error, details })).into_response()
    }
}

/// Form parts of an extraction request.
#[derive(Default)]
struct Upload {
    image: Option<Vec<u8>>,
    text: Option<String>,
}

async fn read_upload(multipart: Result<Multipart, MultipartRejection>) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    // A request that is not multipart at all carries no parts.
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            debug!(%rejection, "request is not multipart");
            return Ok(upload);
        }
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let data = field.bytes().await?;
                if data.is_empty() || upload.image.is_some() {
                    continue;
                }
                info!(bytes = data.len(), "image file received");
                upload.image = Some(data.to_vec());
            }
            "text" => {
                let text = field.text().await?;
                if text.trim().is_empty() || upload.text.is_some() {
                    continue;
                }
                upload.text = Some(text);
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(upload)
}

async fn extract_and_format(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let extraction = state.pipeline.extract(upload.image, upload.text).await?;

    Ok(Json(ExtractResponse {
        status: "success",
        ocr_text: extraction.ocr_text.unwrap_or_default(),
        formatted_data: extraction.formatted,
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "running" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use recurapide_ai::{
        CompletionBackend, CompletionError, CompletionRequest, OcrError, TextRecognizer,
    };
    use serde_json::Value;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const BOUNDARY: &str = "recurapide-test-boundary";
    const COFFEE_OCR: &str = "COFFEE SHOP $4.50 2024-01-01";
    const COFFEE_JSON: &str = r#"{"transactions":[{"Transaction Name":"Coffee Shop","Category":null,"Amount":4.50,"Place":null,"Date":"2024-01-01","Additional Info":null}]}"#;

    struct FakeOcr {
        result: Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl TextRecognizer for FakeOcr {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .map(str::to_string)
                .map_err(|msg| OcrError::Engine(msg.to_string()))
        }
    }

    struct FakeLlm {
        reply: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionBackend for FakeLlm {
        fn model(&self) -> &str {
            "fake-model"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest<'_>,
        ) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    struct Harness {
        app: Router,
        ocr: Arc<FakeOcr>,
        llm: Arc<FakeLlm>,
    }

    fn harness(ocr: Result<&'static str, &'static str>, reply: &'static str) -> Harness {
        harness_with_limit(ocr, reply, 10 * 1024 * 1024)
    }

    fn harness_with_limit(
        ocr: Result<&'static str, &'static str>,
        reply: &'static str,
        limit: usize,
    ) -> Harness {
        let ocr = Arc::new(FakeOcr {
            result: ocr,
            calls: AtomicUsize::new(0),
        });
        let llm = Arc::new(FakeLlm {
            reply,
            calls: AtomicUsize::new(0),
        });
        let pipeline = ReceiptPipeline::new(ocr.clone(), llm.clone());
        Harness {
            app: router(pipeline, limit, false),
            ocr,
            llm,
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 16, Rgb([250, 250, 250]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    enum Part<'a> {
        File(&'a [u8]),
        Text(&'a str),
    }

    fn multipart_request(parts: &[(&str, Part<'_>)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, part) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"receipt.png\"\r\n\
                             Content-Type: image/png\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(text) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(text.as_bytes());
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/extract-and-format-ocr")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_running() {
        let h = harness(Ok(""), COFFEE_JSON);
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "running" }));
    }

    #[tokio::test]
    async fn coffee_receipt_end_to_end() {
        let h = harness(Ok(COFFEE_OCR), COFFEE_JSON);
        let png = png_bytes();
        let (status, body) = send(
            h.app,
            multipart_request(&[("image", Part::File(&png))]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["ocr_text"], COFFEE_OCR);
        let transactions = body["formatted_data"]["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 1);
        assert!(transactions[0]["Amount"].is_number());
        assert_eq!(transactions[0]["Amount"].as_f64(), Some(4.50));
        assert_eq!(transactions[0]["Transaction Name"], "Coffee Shop");
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_form_is_missing_evidence() {
        let h = harness(Ok(COFFEE_OCR), COFFEE_JSON);
        let (status, body) = send(h.app, multipart_request(&[])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MissingEvidence");
        assert!(body["details"].is_string());
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_multipart_request_is_missing_evidence() {
        let h = harness(Ok(COFFEE_OCR), COFFEE_JSON);
        let request = Request::builder()
            .method("POST")
            .uri("/extract-and-format-ocr")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(h.app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MissingEvidence");
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_file_part_and_blank_text_are_missing_evidence() {
        let h = harness(Ok(COFFEE_OCR), COFFEE_JSON);
        let request = multipart_request(&[("image", Part::File(b"")), ("text", Part::Text("  "))]);
        let (status, body) = send(h.app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MissingEvidence");
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_text_part_does_not_shadow_later_text() {
        let h = harness(Ok(COFFEE_OCR), COFFEE_JSON);
        let request = multipart_request(&[
            ("text", Part::Text("")),
            ("text", Part::Text("Coffee 4.50")),
        ]);
        let (status, body) = send(h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn text_only_request_has_empty_ocr_text() {
        let h = harness(Ok(COFFEE_OCR), COFFEE_JSON);
        let request = multipart_request(&[
            ("image", Part::File(b"")),
            ("text", Part::Text("Coffee 4.50 on Jan 1st 2024")),
        ]);
        let (status, body) = send(h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ocr_text"], "");
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_completion_is_server_error_without_ocr_text() {
        let h = harness(Ok(COFFEE_OCR), "   ");
        let png = png_bytes();
        let request = multipart_request(&[
            ("image", Part::File(&png)),
            ("text", Part::Text("morning coffee")),
        ]);
        let (status, body) = send(h.app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "CompletionUnavailable");
        assert!(body.get("ocr_text").is_none());
        assert!(body.get("formatted_data").is_none());
    }

    #[tokio::test]
    async fn unreadable_image_is_client_error() {
        let h = harness(Ok(COFFEE_OCR), COFFEE_JSON);
        let request = multipart_request(&[("image", Part::File(b"not an image at all"))]);
        let (status, body) = send(h.app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ImageDecodeError");
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn engine_failure_is_server_error() {
        let h = harness(Err("engine crashed"), COFFEE_JSON);
        let png = png_bytes();
        let (status, body) = send(h.app, multipart_request(&[("image", Part::File(&png))])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "OCRExecutionError");
        assert!(body["details"].as_str().unwrap().contains("engine crashed"));
        assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fenced_completion_is_malformed_json() {
        let h = harness(
            Ok(COFFEE_OCR),
            "```json\n{\"transactions\": []}\n```",
        );
        let png = png_bytes();
        let (status, body) = send(h.app, multipart_request(&[("image", Part::File(&png))])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "MalformedJSON");
    }

    #[tokio::test]
    async fn missing_transactions_is_schema_violation() {
        let h = harness(Ok(COFFEE_OCR), r#"{"Total Amount": 4.5}"#);
        let png = png_bytes();
        let (status, body) = send(h.app, multipart_request(&[("image", Part::File(&png))])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "SchemaViolation");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let h = harness_with_limit(Ok(COFFEE_OCR), COFFEE_JSON, 64);
        let png = vec![0u8; 4096];
        let (status, body) = send(h.app, multipart_request(&[("image", Part::File(&png))])).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "InvalidMultipart");
        assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 0);
    }
}
