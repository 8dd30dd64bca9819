use std::process::ExitCode;

use clap::Parser;
use scribe::{
    config::ConsumerConfiguration, consume, sink::ConsoleSink, utils::shutdown::shutdown_channel,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ConsumerConfiguration::parse();

    let (trigger, shutdown) = shutdown_channel();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted, stopping.");
                trigger.trigger();
            }
            Err(err) => tracing::error!("Unable to listen for interrupts: {}", err),
        }
    });

    match consume(&config, ConsoleSink::stdout(), shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Consumer stopped: {}", err);
            ExitCode::FAILURE
        }
    }
}
