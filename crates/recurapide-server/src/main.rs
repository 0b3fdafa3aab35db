mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use recurapide_ai::{ChatCompletionClient, ReceiptPipeline, default_recognizer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("recurapide v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::parse();

    let completion =
        ChatCompletionClient::new(&config.completion()).context("building completion client")?;
    let recognizer = default_recognizer(&config.ocr());
    let pipeline = ReceiptPipeline::new(recognizer, Arc::new(completion));
    info!(
        model = pipeline.model(),
        ocr_engine = pipeline.recognizer_name(),
        "pipeline initialised"
    );

    let app = routes::router(pipeline, config.max_upload_bytes(), config.cors);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
