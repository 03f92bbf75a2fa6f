//! mcp-bridge entry point.
//!
//! Exit codes: 0 after a clean run, 1 on a fatal local I/O error or when
//! shutdown left messages unhandled, 2 on invalid configuration.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mcp_bridge::bridge::{BridgeOptions, run_bridge};
use mcp_bridge::cli::BridgeArgs;
use mcp_bridge::error::BridgeError;
use mcp_bridge::logging::init_tracing;
use mcp_bridge_core::transport::HttpTransport;

#[tokio::main]
async fn main() {
    let args = BridgeArgs::parse();
    init_tracing(args.log_level.as_deref(), args.log_format);

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "bridge failed");
            eprintln!("mcp-bridge: {e}");
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(args: BridgeArgs) -> Result<i32, BridgeError> {
    let config = args.to_config()?;
    let transport = HttpTransport::new(&config)?;

    info!(
        name = %config.name,
        uri = %config.uri,
        timeout_ms = config.timeout.as_millis() as u64,
        max_queue = config.max_queue,
        authenticated = config.bearer_token.is_some(),
        "starting bridge"
    );

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let summary = run_bridge(
        tokio::io::stdin(),
        tokio::io::stdout(),
        transport,
        BridgeOptions::from(&config),
        shutdown,
    )
    .await?;

    summary.log();
    Ok(summary.exit_code())
}

/// SIGINT and SIGTERM both start a graceful shutdown: stop reading stdin,
/// let the in-flight request settle, start nothing new.
fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_sigint = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received SIGINT, initiating graceful shutdown");
                shutdown_sigint.cancel();
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGINT");
            }
        }
    });

    #[cfg(unix)]
    {
        let shutdown_sigterm = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, initiating graceful shutdown");
                    shutdown_sigterm.cancel();
                }
                Err(e) => {
                    error!(error = %e, "Failed to listen for SIGTERM");
                }
            }
        });
    }

    #[cfg(not(unix))]
    let _ = shutdown;
}
