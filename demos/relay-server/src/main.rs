//! Runs an avatar relay.
//!
//! ```text
//! relay-server [config.json]
//! ```
//!
//! Without a config path every setting takes its default. Log level comes
//! from `RUST_LOG` (default `info`).

use avatar_relay::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(%path, "loading config");
            RelayConfig::load(&path)?
        }
        None => RelayConfig::default(),
    };

    let server = RelayServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "avatar relay listening");
    server.run().await
}
