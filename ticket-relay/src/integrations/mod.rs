//! Downstream audience systems.
//!
//! Each integration sits behind a small trait so the webhook handler can be
//! built with any combination of them, or with test doubles.
//!
//! ```text
//! TicketRecord → ContactSync (Mailchimp list) → SyncOutcome
//!              → Inviter (Slack team)         → bool
//! ```

pub mod mailchimp;
pub mod slack;

use async_trait::async_trait;

use crate::tickets::TicketRecord;

pub use mailchimp::{subscriber_id, MailchimpClient, MailchimpError};
pub use slack::{SlackError, SlackInviter};

/// Result of syncing one ticket to a mailing list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Ticket had no usable email
    Skipped,
    AlreadyPresent,
    Created,
    Updated,
    /// The provider call failed; the failure has already been logged
    Failed,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Skipped => "skipped",
            SyncOutcome::AlreadyPresent => "already_present",
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Failed => "failed",
        }
    }
}

/// Mailing-list contact sync.
#[async_trait]
pub trait ContactSync: Send + Sync {
    /// Make sure the ticket holder is on the list.
    ///
    /// Never fails: provider errors are logged and reported as
    /// [`SyncOutcome::Failed`].
    async fn sync(&self, ticket: &TicketRecord) -> SyncOutcome;
}

/// Chat workspace invitations.
#[async_trait]
pub trait Inviter: Send + Sync {
    /// Invite the ticket holder. Returns `true` when the provider accepted it.
    async fn invite(&self, ticket: &TicketRecord) -> bool;
}
