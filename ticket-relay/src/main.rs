//! Ticket Relay web server.
//!
//! Receives Tito ticket webhooks, verifies them and forwards attendees to
//! Mailchimp and Slack when those integrations are configured.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ticket_relay::web::{router, AppState};
use ticket_relay::{Config, MailchimpClient, Relay, SlackInviter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        mailchimp_enabled = config.mailchimp.is_some(),
        mailchimp_sync_mode = ?config.mailchimp.as_ref().map(|m| m.sync_mode),
        slack_enabled = config.slack.is_some(),
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    // One HTTP client for all outbound calls
    let client = Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let mut relay = Relay::new();
    if let Some(mailchimp) = &config.mailchimp {
        relay = relay.with_contacts(Arc::new(MailchimpClient::new(client.clone(), mailchimp)));
        info!(list_id = %mailchimp.list_id, datacenter = mailchimp.datacenter(), "mailchimp_sync_enabled");
    }
    if let Some(slack) = &config.slack {
        relay = relay.with_inviter(Arc::new(SlackInviter::new(client.clone(), slack)));
        info!(team = %slack.team, "slack_invites_enabled");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config, relay));

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
