//! Bridge Node
//!
//! Runs one side of the quorum lock/unlock bridge behind an HTTP API:
//!
//! 1. Users lock funds through `POST /v1/lock`; a `Locked` event is emitted
//! 2. Relayers read finalized events and collect signer attestations
//! 3. Relayers submit the signed unlock intent through `POST /v1/unlock`
//! 4. The node checks expiry, time lock, quorum, nonce, balance and replay
//!    before releasing funds
//!
//! Signer-set rotation and the pause switch go through `POST /v1/admin` and
//! need the same quorum as unlocks.

use std::sync::Arc;
use std::time::Duration;

use bridge_core::{BridgeController, SystemClock};
use bridge_node::config::Config;
use bridge_node::feed::run_event_feed;
use bridge_node::logging::init_logging;
use bridge_node::server::{start_server, AppState, Metrics};
use eyre::WrapErr;
use tokio::sync::watch;
use tracing::info;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    let config = Config::load()?;
    init_logging(config.log_json);

    info!(
        node_id = %config.node_id,
        this_chain = %config.bridge.this_chain,
        counterpart_chain = %config.bridge.counterpart_chain,
        signers = config.signers.len(),
        "Starting bridge node"
    );

    let controller = Arc::new(
        BridgeController::new(
            config.bridge.clone(),
            config.signers.iter().copied(),
            Arc::new(SystemClock),
        )
        .wrap_err("Failed to initialize bridge controller")?,
    );
    let metrics = Arc::new(Metrics::new().wrap_err("Failed to register metrics")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let feed = tokio::spawn(run_event_feed(
        controller.event_log(),
        metrics.clone(),
        Duration::from_millis(config.event_poll_interval_ms),
        shutdown_rx.clone(),
    ));

    let state = AppState {
        controller,
        metrics,
        node_id: config.node_id.clone(),
    };

    let mut server_shutdown = shutdown_rx;
    start_server(
        &config.api_bind_address,
        config.api_port,
        state,
        async move {
            let _ = server_shutdown.changed().await;
        },
    )
    .await?;

    feed.await.wrap_err("Event feed task failed")?;

    info!("Bridge node stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
