//! Server assembly: wires the inbox client, rule engine, poller and registry
//! behind the HTTP routes and serves them.

use std::future::IntoFuture;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::audit::RuleEngine;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::inbox::{HttpInbox, InboxSource};
use crate::monitor::{Poller, Registry, monitor_routes};

/// Build the full application router from configuration.
pub fn build_app(config: &MonitorConfig) -> Result<Router> {
    let engine = Arc::new(RuleEngine::new(config.audit.clone())?);
    let inbox: Arc<dyn InboxSource> = Arc::new(HttpInbox::new(config.inbox.clone())?);
    let poller = Poller::new(inbox, Arc::clone(&engine), config.poll_interval);
    let registry = Registry::new(poller);

    Ok(monitor_routes(registry, engine, config.observer_buffer))
}

/// Bind `config.bind_addr` and serve until Ctrl-C.
pub async fn run(config: MonitorConfig) -> Result<()> {
    let app = build_app(&config)?;
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Monitor server started");

    // Event streams never complete; exit on Ctrl-C rather than draining them.
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        }
    }

    Ok(())
}
