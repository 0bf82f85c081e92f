//! Newsdesk entry point.

use newsdesk::{api, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("newsdesk=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.model,
        "starting newsdesk"
    );

    api::serve(config).await
}
