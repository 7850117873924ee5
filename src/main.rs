use tracing_subscriber::{prelude::*, EnvFilter};

use happns_lib::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,tower_http=debug"))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    happns_lib::run(AppConfig::load()).await
}
