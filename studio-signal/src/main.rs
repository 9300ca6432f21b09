//! `studio-signal`: signaling gateway for the live studio.
//!
//! Configuration comes from the environment (see [`studio_signal::config`]);
//! logging follows `RUST_LOG` and defaults to `info`.

use log::info;
use studio_signal::{ServerConfig, ServerError, SignalServer};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::load()?;
    info!(
        "Starting signaling server on {} (outbound queue {} frames, max message {} bytes)",
        config.bind_addr(),
        config.outbound_capacity,
        config.max_message_bytes
    );

    SignalServer::new(config).run().await
}
