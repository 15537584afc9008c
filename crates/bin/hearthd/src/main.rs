//! # hearthd — hearth daemon
//!
//! Composition root that wires the broker, runtime and HTTP server together.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env var overrides)
//! - Connect the MQTT client and start its event pump
//! - Start the reactive runtime with the house program
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod home;

use anyhow::Context;
use chrono::Timelike;
use hearth_adapter_mqtt::RumqttcBroker;
use hearth_adapter_mqtt::pump::EventPump;
use hearth_app::runtime::Runtime;
use hearth_domain::time;
use std::sync::Arc;

use crate::config::Config;
use crate::home::{Home, Model, Msg};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();

    let (broker, eventloop) = RumqttcBroker::connect(&config.broker);

    let handle = Runtime::<Home>::new(Model::default(), Arc::new(broker), home::registry())
        .start(Some(Msg::SetHour(time::now().hour())))
        .await?;

    EventPump::new(eventloop, handle.subscriptions()).start();

    let app = hearth_adapter_http_axum::router::build(handle);

    let bind_addr = config.bind_addr();
    tracing::info!(%bind_addr, "hearthd listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Completes when the process receives SIGTERM or Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                tracing::warn!(%err, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
