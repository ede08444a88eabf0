//! Per-ticket fan-out to the configured integrations.
//!
//! Tickets are processed in event order, one at a time. A failure on one
//! ticket or one integration never stops the rest; the integrations log their
//! own failures and the relay only counts them.

use std::sync::Arc;

use tracing::{debug, info};

use crate::integrations::{ContactSync, Inviter, SyncOutcome};
use crate::tickets::WebhookEvent;

/// Tally of what happened to one delivery's tickets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub tickets: usize,
    /// Tickets without an email
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub already_present: usize,
    pub sync_failed: usize,
    pub invited: usize,
    pub invite_failed: usize,
}

impl DispatchReport {
    fn record_sync(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Skipped => {}
            SyncOutcome::AlreadyPresent => self.already_present += 1,
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Failed => self.sync_failed += 1,
        }
    }
}

/// Holds the enabled integrations. Built once at startup and shared.
#[derive(Clone, Default)]
pub struct Relay {
    contacts: Option<Arc<dyn ContactSync>>,
    inviter: Option<Arc<dyn Inviter>>,
}

impl Relay {
    /// A relay with no integrations; tickets are parsed and echoed only.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_contacts(mut self, contacts: Arc<dyn ContactSync>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    #[must_use]
    pub fn with_inviter(mut self, inviter: Arc<dyn Inviter>) -> Self {
        self.inviter = Some(inviter);
        self
    }

    /// Forward every ticket that has an email to each enabled integration.
    ///
    /// Returns once all calls have settled.
    pub async fn dispatch(&self, event: &WebhookEvent) -> DispatchReport {
        let mut report = DispatchReport {
            tickets: event.tickets.len(),
            ..Default::default()
        };

        for (index, ticket) in event.tickets.iter().enumerate() {
            let Some(email) = ticket.email() else {
                debug!(ticket_index = index, "ticket_without_email_skipped");
                report.skipped += 1;
                continue;
            };

            if let Some(contacts) = &self.contacts {
                let outcome = contacts.sync(ticket).await;
                debug!(
                    ticket_index = index,
                    email = %email,
                    outcome = outcome.as_str(),
                    "ticket_contact_synced"
                );
                report.record_sync(outcome);
            }

            if let Some(inviter) = &self.inviter {
                if inviter.invite(ticket).await {
                    report.invited += 1;
                } else {
                    report.invite_failed += 1;
                }
            }
        }

        info!(
            tickets = report.tickets,
            skipped = report.skipped,
            created = report.created,
            updated = report.updated,
            already_present = report.already_present,
            sync_failed = report.sync_failed,
            invited = report.invited,
            invite_failed = report.invite_failed,
            "ticket_dispatch_complete"
        );

        report
    }
}
