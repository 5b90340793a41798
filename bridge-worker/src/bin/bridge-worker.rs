//! Thin process entrypoint (`spec.md` §4.I, §6 "CLI surface"): load
//! settings from the environment, install logging, and run the worker
//! until `ctrl_c` or the control plane closes the stream.
//!
//! No bridge or function handlers are registered here. Handler
//! implementations are an external collaborator (`spec.md` §4.C) built by
//! whatever embeds this crate; this binary is the minimal runnable shape
//! of [`bridge_worker::Worker`]'s bootstrap, useful on its own only to
//! confirm connectivity and exercise the heartbeat round trip.

use bridge_worker::{Settings, WorkerBuilder};
use bridge_worker_core::WorkerIdentity;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(%err, "failed to load settings");
            std::process::exit(1);
        }
    };
    tracing::info!(
        worker_id = %settings.worker_id,
        auth_method = ?settings.auth_method,
        in_cluster = settings.in_cluster,
        "settings loaded"
    );

    tracing::warn!("no bridge or function handlers registered; every incoming event will be reported as unroutable");

    let identity = WorkerIdentity::new(
        settings.worker_id.clone(),
        settings.worker_secret.expose_secret().to_string(),
        settings.server_url.clone(),
    );

    let cancellation = CancellationToken::new();
    let shutdown = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown.cancel();
        }
    });

    let worker = match WorkerBuilder::new(identity).build(cancellation) {
        Ok(worker) => worker,
        Err(err) => {
            tracing::error!(%err, "failed to build worker");
            std::process::exit(1);
        }
    };

    if let Err(err) = worker.run().await {
        tracing::error!(%err, "worker exited with an error");
        std::process::exit(1);
    }
}
