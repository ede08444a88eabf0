//! Ticket Relay - Tito webhook receiver.
//!
//! Verifies signed ticket deliveries from Tito and forwards each attendee to
//! the configured audience systems:
//! - Mailchimp: subscribe to a list (create-only or upsert)
//! - Slack: invite to a team
//!
//! ## Architecture
//!
//! ```text
//! Tito → POST /ticket → signature check → parse → Relay → Mailchimp / Slack
//! ```

pub mod config;
pub mod integrations;
pub mod relay;
pub mod tickets;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError, SyncMode};
pub use integrations::{ContactSync, Inviter, MailchimpClient, SlackInviter, SyncOutcome};
pub use relay::{DispatchReport, Relay};
pub use tickets::{parse_event, MalformedPayload, TicketRecord, WebhookEvent};
pub use web::AppState;
