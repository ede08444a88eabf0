//! Slack team invitations.
//!
//! Uses the `users.admin.invite` method on the team's own domain, the same
//! endpoint self-serve invite pages post to. Slack answers HTTP 200 for most
//! failures and reports them through `ok`/`error` in the JSON body.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use super::Inviter;
use crate::config::SlackConfig;
use crate::tickets::TicketRecord;

/// Errors from the Slack invite call.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack API error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Invites ticket holders to one Slack team.
#[derive(Debug, Clone)]
pub struct SlackInviter {
    client: Client,
    team: String,
    token: String,
    base_url: String,
}

impl SlackInviter {
    pub fn new(client: Client, config: &SlackConfig) -> Self {
        Self {
            client,
            team: config.team.clone(),
            token: config.token.clone(),
            base_url: format!("https://{}.slack.com", config.team),
        }
    }

    /// Set a custom base URL (for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Submit an invitation for `email`.
    pub async fn send_invite(&self, email: &str, ticket: &TicketRecord) -> Result<(), SlackError> {
        let mut form = vec![
            ("email", email),
            ("token", self.token.as_str()),
            ("set_active", "true"),
        ];
        if !ticket.first_name().is_empty() {
            form.push(("first_name", ticket.first_name()));
        }
        if !ticket.last_name().is_empty() {
            form.push(("last_name", ticket.last_name()));
        }

        let response: SlackResponse = self
            .client
            .post(format!("{}/api/users.admin.invite", self.base_url))
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.ok {
            Ok(())
        } else {
            Err(SlackError::Api(
                response.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

#[async_trait]
impl Inviter for SlackInviter {
    async fn invite(&self, ticket: &TicketRecord) -> bool {
        let Some(email) = ticket.email() else {
            return false;
        };

        match self.send_invite(email, ticket).await {
            Ok(()) => {
                info!(email = %email, team = %self.team, "slack_invite_sent");
                true
            }
            Err(e) => {
                error!(email = %email, team = %self.team, error = %e, "slack_invite_failed");
                false
            }
        }
    }
}
