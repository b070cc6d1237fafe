//! Screen recorder - captures the screen and microphone and muxes both
//! streams through an external encoder.

pub mod capture;
pub mod cli;
pub mod encoder;
pub mod recorder;
pub mod utils;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "screen_recorder_lib=debug,ffmpeg=warn";

/// Initialize logging and run the recorder CLI
pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting screen recorder v{}", env!("CARGO_PKG_VERSION"));

    let args = cli::Args::parse();

    // cpal streams are not Send, so everything runs on one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::record(args))
}
