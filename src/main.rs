use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = backoffice::config::Config::from_env()?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "backoffice",
        "Backoffice starting: RUST_LOG='{}', http_port={}, backend={:?}, provider={:?}, seed_admin={}",
        rust_log,
        config.http_port,
        config.backend,
        config.remote.as_ref().map(|r| r.provider_url.as_str()),
        config.seed_admin.is_some()
    );

    backoffice::server::run(config).await
}
