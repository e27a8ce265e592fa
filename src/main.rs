use shareserve::{router, Config, ServeState};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    let _ = dotenv::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let config = Config::from_env()?;

    let state = ServeState::new(&config.share_dir)
        .await
        .map_err(|e| format!("cannot serve {}: {e}", config.share_dir.display()))?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        root = %state.root().display(),
        "serving on {}",
        listener.local_addr()?
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
