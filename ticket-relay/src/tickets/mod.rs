//! Tito webhook payloads.
//!
//! Bodies are only parsed after their signature has been checked against the
//! untouched raw bytes.

pub mod types;

use thiserror::Error;
use tracing::info;

pub use types::{TicketRecord, WebhookEvent};

/// The body is not JSON, or lacks the `tickets` array.
#[derive(Debug, Error)]
#[error("malformed ticket payload: {0}")]
pub struct MalformedPayload(#[from] serde_json::Error);

/// Parse a raw webhook body into a [`WebhookEvent`].
pub fn parse_event(raw: &[u8]) -> Result<WebhookEvent, MalformedPayload> {
    let event: WebhookEvent = serde_json::from_slice(raw)?;

    info!(
        ticket_count = event.tickets.len(),
        with_email = event.tickets.iter().filter(|t| t.email().is_some()).count(),
        "ticket_payload_parsed"
    );

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event() {
        let raw = br#"{"tickets":[{"email":"a@x.com","first_name":"A","last_name":"Z"}]}"#;

        let event = parse_event(raw).unwrap();

        assert_eq!(event.tickets.len(), 1);
        assert_eq!(event.tickets[0].email(), Some("a@x.com"));
        assert_eq!(event.tickets[0].first_name(), "A");
        assert_eq!(event.tickets[0].last_name(), "Z");
    }

    #[test]
    fn test_parse_event_empty_tickets() {
        let event = parse_event(br#"{"tickets":[]}"#).unwrap();
        assert!(event.tickets.is_empty());
    }

    #[test]
    fn test_parse_event_invalid_json() {
        assert!(parse_event(b"not json").is_err());
        assert!(parse_event(b"").is_err());
    }

    #[test]
    fn test_parse_event_missing_tickets() {
        let err = parse_event(br#"{"reference":"ABCD-1"}"#).unwrap_err();
        assert!(err.to_string().contains("tickets"));
    }

    #[test]
    fn test_parse_event_rejects_non_object_ticket() {
        assert!(parse_event(br#"{"tickets":["a@x.com"]}"#).is_err());
    }
}
