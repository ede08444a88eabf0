//! Ticket event types.
//!
//! Fields this service does not use are kept in `extra` so the parsed event
//! can be echoed back to Tito intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One webhook delivery, e.g. a `registration.finished` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Tickets in the order Tito sent them
    pub tickets: Vec<TicketRecord>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single ticket from a registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TicketRecord {
    /// Build a ticket with just contact details.
    pub fn new(email: Option<&str>, first_name: Option<&str>, last_name: Option<&str>) -> Self {
        Self {
            email: email.map(str::to_string),
            first_name: first_name.map(str::to_string),
            last_name: last_name.map(str::to_string),
            extra: Map::new(),
        }
    }

    /// Trimmed email, or `None` when absent or blank.
    ///
    /// Tickets without an email are never forwarded anywhere.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn first_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or("")
    }

    pub fn last_name(&self) -> &str {
        self.last_name.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_blank_is_absent() {
        assert_eq!(TicketRecord::new(None, None, None).email(), None);
        assert_eq!(TicketRecord::new(Some(""), None, None).email(), None);
        assert_eq!(TicketRecord::new(Some("   "), None, None).email(), None);
        assert_eq!(
            TicketRecord::new(Some(" a@x.com "), None, None).email(),
            Some("a@x.com")
        );
    }

    #[test]
    fn test_null_fields_deserialize() {
        let ticket: TicketRecord =
            serde_json::from_str(r#"{"email":null,"first_name":null}"#).unwrap();

        assert_eq!(ticket.email(), None);
        assert_eq!(ticket.first_name(), "");
        assert_eq!(ticket.last_name(), "");
    }

    #[test]
    fn test_passthrough_fields_survive_echo() {
        let raw = r#"{"reference":"ABCD-1","tickets":[{"email":"a@x.com","release_title":"Early Bird","price":25.0}]}"#;

        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.extra["reference"], "ABCD-1");
        assert_eq!(event.tickets[0].extra["release_title"], "Early Bird");

        let echoed: Value = serde_json::to_value(&event).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(echoed, original);
    }
}
