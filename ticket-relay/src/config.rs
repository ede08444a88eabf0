//! Configuration module for environment variable parsing.
//!
//! Every setting comes from the process environment. The Mailchimp and Slack
//! integrations are switched on by the presence of their credentials.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Datacenter used when a Mailchimp key carries no `-usN` suffix.
const MAILCHIMP_DEFAULT_DATACENTER: &str = "us1";

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("{name} is set but {requires} is missing")]
    Incomplete {
        name: &'static str,
        requires: &'static str,
    },

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// How an existing list member is treated when a ticket arrives for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Leave existing members untouched.
    #[default]
    CreateOnly,
    /// Overwrite FNAME/LNAME on existing members when they differ.
    Upsert,
}

impl FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create_only" | "create-only" => Ok(SyncMode::CreateOnly),
            "upsert" => Ok(SyncMode::Upsert),
            _ => Err(ConfigError::Invalid {
                name: "MAILCHIMP_SYNC_MODE",
                value: s.to_string(),
            }),
        }
    }
}

/// Mailchimp list sync settings.
#[derive(Debug, Clone)]
pub struct MailchimpConfig {
    pub api_key: String,
    pub list_id: String,
    pub sync_mode: SyncMode,
}

impl MailchimpConfig {
    /// Datacenter encoded in the API key suffix, e.g. `us6` for `abc123-us6`.
    pub fn datacenter(&self) -> &str {
        self.api_key
            .rsplit_once('-')
            .map(|(_, dc)| dc)
            .filter(|dc| !dc.is_empty())
            .unwrap_or(MAILCHIMP_DEFAULT_DATACENTER)
    }

    /// Marketing API root for the key's datacenter.
    pub fn base_url(&self) -> String {
        format!("https://{}.api.mailchimp.com/3.0", self.datacenter())
    }
}

/// Slack invitation settings.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub team: String,
    pub token: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret Tito signs webhook bodies with
    pub signing_secret: String,

    /// Mailing-list sync, enabled by MAILCHIMP_API_KEY
    pub mailchimp: Option<MailchimpConfig>,

    /// Chat invitations, enabled by SLACK_TOKEN + SLACK_TEAM
    pub slack: Option<SlackConfig>,

    /// Port for the web server to listen on
    pub port: u16,

    /// Outbound HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Largest accepted webhook body
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let signing_secret = var("TITO_WEBHOOK_SECURITY_TOKEN")
            .ok_or(ConfigError::Missing("TITO_WEBHOOK_SECURITY_TOKEN"))?;

        let mailchimp = match var("MAILCHIMP_API_KEY") {
            Some(api_key) => {
                let list_id = var("MAILCHIMP_LIST_ID").ok_or(ConfigError::Incomplete {
                    name: "MAILCHIMP_API_KEY",
                    requires: "MAILCHIMP_LIST_ID",
                })?;
                let sync_mode = match var("MAILCHIMP_SYNC_MODE") {
                    Some(raw) => raw.parse()?,
                    None => SyncMode::default(),
                };
                Some(MailchimpConfig {
                    api_key: api_key.trim().to_string(),
                    list_id: list_id.trim().to_string(),
                    sync_mode,
                })
            }
            None => {
                if var("MAILCHIMP_LIST_ID").is_some() {
                    warn!("MAILCHIMP_LIST_ID set without MAILCHIMP_API_KEY, mailchimp sync disabled");
                }
                None
            }
        };

        let slack = match (var("SLACK_TOKEN"), var("SLACK_TEAM")) {
            (Some(token), Some(team)) => Some(SlackConfig {
                team: team.trim().to_string(),
                token: token.trim().to_string(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    name: "SLACK_TOKEN",
                    requires: "SLACK_TEAM",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    name: "SLACK_TEAM",
                    requires: "SLACK_TOKEN",
                })
            }
        };

        Ok(Config {
            signing_secret,
            mailchimp,
            slack,
            // Platforms such as Cloud Foundry hand the port over as VCAP_APP_PORT
            port: parse_or("PORT", var("PORT").or_else(|| var("VCAP_APP_PORT")), 8080),
            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", var("REQUEST_TIMEOUT_MS"), 10_000),
            max_body_bytes: parse_or("MAX_BODY_BYTES", var("MAX_BODY_BYTES"), 1024 * 1024),
        })
    }

    /// Outbound HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Parse a numeric setting, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}
