//! hooktrap - capture, inspect and replay incoming HTTP requests
//!
//! Runs two listeners: the capture endpoint, which accepts any request
//! on any path and renders it for inspection, and the web dashboard,
//! which serves the request history, a live event stream and replay.

mod capture;
mod dashboard;
mod html;
mod output;
mod render;
mod savefile;

use anyhow::{Context, Result};
use capture::{CaptureConfig, CaptureState};
use clap::Parser;
use hooktrap_core::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hooktrap")]
#[command(version)]
#[command(about = "Capture, inspect and replay incoming HTTP requests", long_about = None)]
struct Cli {
    /// Capture endpoint listen address
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:9002")]
    listen: String,

    /// HMAC secret used to verify signed payloads
    #[arg(long, env = "HMAC_SECRET")]
    hmac_secret: Option<String>,

    /// Name of the signature header, e.g. X-Hub-Signature-256
    #[arg(long, env = "HMAC_HEADER_NAME")]
    hmac_header_name: Option<String>,

    /// Shared secret token value
    #[arg(long, env = "SECRET_TOKEN")]
    secret_token: Option<String>,

    /// Name of the secret token header, e.g. X-Gitlab-Token
    #[arg(long, env = "SECRET_TOKEN_HEADER_NAME")]
    secret_token_header_name: Option<String>,

    /// Where rendered requests are written: "stdout" or a file path
    #[arg(long, env = "OUTPUT", default_value = "stdout")]
    output: String,

    /// Also save each sanitized raw request to its own file
    #[arg(long, env = "SAVE_RAW_HTTP_REQUEST")]
    save_raw_http_request: bool,

    /// Filename template for saved raw requests
    #[arg(
        long,
        env = "SAVE_FORMAT",
        default_value = "%Y-%m-%d-%H%i%s-{hostname}-{url}.raw"
    )]
    save_format: String,

    /// Dashboard listen address (default: capture port + 1)
    #[arg(long, env = "WEB_LISTEN")]
    web_listen: Option<String>,

    /// Maximum number of requests kept in memory
    #[arg(long, env = "MAX_REQUESTS", default_value_t = 50)]
    max_requests: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("{log_level},hooktrap_cli=info"))
            }),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let capture_addr: SocketAddr = cli
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", cli.listen))?;
    let web_addr: SocketAddr = match &cli.web_listen {
        Some(addr) => addr
            .parse()
            .with_context(|| format!("invalid web listen address {addr}"))?,
        None => default_web_addr(capture_addr)
            .context("no port left for the web dashboard; pass --web-listen")?,
    };

    let sink = Arc::new(output::OutputSink::open(&cli.output)?);
    let store = Arc::new(Store::new(cli.max_requests));

    let capture_state = Arc::new(CaptureState {
        store: store.clone(),
        sink: sink.clone(),
        config: CaptureConfig {
            hmac_secret: cli.hmac_secret,
            hmac_header_name: cli.hmac_header_name,
            secret_token: cli.secret_token,
            secret_token_header_name: cli.secret_token_header_name,
            save_raw_request: cli.save_raw_http_request,
            save_format: cli.save_format,
        },
    });

    let capture_listener = TcpListener::bind(capture_addr)
        .await
        .with_context(|| format!("failed to bind capture endpoint to {capture_addr}"))?;
    let web_listener = TcpListener::bind(web_addr)
        .await
        .with_context(|| format!("failed to bind web dashboard to {web_addr}"))?;

    tracing::info!("capture endpoint listening at http://{capture_addr}");
    if capture_state.config.hmac_secret.is_some() {
        tracing::info!("hmac secret is set");
    }
    if let Some(name) = &capture_state.config.hmac_header_name {
        tracing::info!("hmac header name: {name}");
    }
    if let Some(path) = sink.path() {
        tracing::info!("output is set to {}", path.display());
    }
    if capture_state.config.save_raw_request {
        tracing::info!("saving raw http requests is enabled");
    }
    tracing::info!("web dashboard available at http://{web_addr}");

    let dashboard_state = dashboard::DashboardState::new(store, capture_addr.to_string());
    let web_server = tokio::spawn(async move {
        axum::serve(web_listener, dashboard::router(dashboard_state))
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    axum::serve(capture_listener, capture::router(capture_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("capture server error")?;

    web_server
        .await
        .context("web dashboard task panicked")?
        .context("web dashboard error")?;

    tracing::info!("exit, all clear");
    Ok(())
}

/// Dashboard defaults to the capture port plus one, same interface.
/// None when the capture endpoint already sits on the last port.
fn default_web_addr(capture_addr: SocketAddr) -> Option<SocketAddr> {
    let port = capture_addr.port().checked_add(1)?;
    Some(SocketAddr::new(capture_addr.ip(), port))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_addr_defaults_to_next_port() {
        let addr = default_web_addr("127.0.0.1:9002".parse().unwrap()).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9003");
    }

    #[test]
    fn web_addr_has_no_default_past_last_port() {
        assert!(default_web_addr("127.0.0.1:65535".parse().unwrap()).is_none());
    }
}
