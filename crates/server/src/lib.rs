//! Switchyard server assembly.
//!
//! Wires the gateway router behind the authentication and rate-limit
//! middleware, binds the listener, and runs until the shutdown token
//! cancels, then gives in-flight workers a bounded drain window before
//! tearing down (closing the admission queue and removing the status
//! file).

#![deny(missing_docs)]

mod auth;
mod logger;
mod rate_limit;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::anyhow;
use auth::AuthLayer;
use config::Config;
use gateway::Pipeline;
use self::rate_limit::RateLimitLayer;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use ::rate_limit::RateLimitManager;

/// Seconds granted to in-flight requests after shutdown is requested.
const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

/// Configuration for serving the gateway.
pub struct ServeConfig {
    /// The immutable configuration snapshot.
    pub config: Config,
    /// Cancellation token for graceful shutdown.
    pub shutdown: CancellationToken,
    /// Optional oneshot sender receiving the bound address (useful when
    /// port 0 was requested).
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Start and run the gateway with the provided configuration.
pub async fn serve(
    ServeConfig {
        config,
        shutdown,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    logger::init(&config.log_filter);

    log::info!("switchyard {}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(config);
    let pipeline = Arc::new(Pipeline::new(config.clone(), shutdown.clone()));

    let mut app = gateway::router(pipeline.clone());

    // Layer ordering matters: later layers run earlier, so auth is applied
    // after the limiter here to run before it per request.
    if config.rate_limit.enabled {
        let manager = Arc::new(RateLimitManager::new(&config.rate_limit));
        app = app.layer(RateLimitLayer::new(manager));
    }
    app = app.layer(AuthLayer::new(&config.auth));

    let listen_address = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("failed to bind to {listen_address}: {e}"))?;

    let bound = listener.local_addr()?;
    log::info!("gateway endpoint: http://{bound}/v1/messages (provider '{}')", config.provider);

    if let Some(sender) = bound_addr_sender
        && sender.send(bound).is_err()
    {
        log::warn!("bound address receiver dropped");
    }

    let drain = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        drain.cancelled().await;
        log::info!("received shutdown signal, draining in-flight requests...");
    });

    tokio::select! {
        result = server => {
            result.map_err(|e| anyhow!("server error: {e}"))?;
        }
        _ = drain_deadline(&shutdown) => {
            log::warn!("drain deadline of {DRAIN_DEADLINE:?} reached, exiting with requests in flight");
        }
    }

    pipeline.shutdown();
    log::info!("shutdown complete");

    Ok(())
}

async fn drain_deadline(shutdown: &CancellationToken) {
    shutdown.cancelled().await;
    tokio::time::sleep(DRAIN_DEADLINE).await;
}
