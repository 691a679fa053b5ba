//! Repolens API - same-origin proxy for the GitHub access layer.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use repolens::github::GitHubClient;
use repolens::http::ReqwestTransport;
use repolens::pace::{ApiRateLimiter, DEFAULT_RPS};

#[derive(Parser)]
#[command(name = "repolens-api")]
#[command(version)]
#[command(about = "Same-origin proxy for the repolens GitHub access layer")]
#[command(
    long_about = "Serves the frontend-facing /api/github endpoints. Outbound GitHub calls \
are quota-guarded, paced, cached, and authenticated with a caller's bearer \
token when present, falling back to the configured app token."
)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Fallback GitHub token used when callers send none
    #[arg(long, env = "REPOLENS_GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Outbound requests per second
    #[arg(long, default_value_t = DEFAULT_RPS)]
    rps: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("repolens=info,repolens_api=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let transport = Arc::new(ReqwestTransport::new()?);
    let client = GitHubClient::builder(transport)
        .app_token(cli.github_token)
        .pacer(ApiRateLimiter::new(cli.rps))
        .build();

    let app = routes::router(Arc::new(routes::AppState { client }));
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!(addr = %cli.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::warn!(error = %e, "failed to install shutdown handler"),
    }
}
