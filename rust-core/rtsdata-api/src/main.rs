// SPDX-License-Identifier: PMPL-1.0-or-later
//! rtsdata API server binary

use rtsdata_api::{serve, ApiConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ApiConfig::from_env()?;
    tracing::info!(
        "Starting rtsdata API on {}:{} (root path: {})",
        config.host,
        config.port,
        config.root_path.as_deref().unwrap_or("/")
    );

    serve(config).await?;
    Ok(())
}
