//! Mailchimp list member sync.
//!
//! Members are addressed by the MD5 hash of their lowercased email, so the
//! lookup key for a ticket holder is stable across deliveries.
//! Reference: https://mailchimp.com/developer/marketing/api/list-members/

use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use super::{ContactSync, SyncOutcome};
use crate::config::{MailchimpConfig, SyncMode};
use crate::tickets::TicketRecord;

/// Mailchimp accepts any username alongside the API key.
const BASIC_AUTH_USER: &str = "anystring";

/// Errors from the Mailchimp API.
#[derive(Debug, Error)]
pub enum MailchimpError {
    /// Member lookup missed. This is the branch that triggers a create.
    #[error("member not found")]
    NotFound,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mailchimp API error ({status}): {title}: {detail}")]
    Api {
        status: u16,
        title: String,
        detail: String,
    },
}

/// Subscriber hash for an email: hex MD5 of the trimmed, lowercased address.
pub fn subscriber_id(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    hex::encode(Md5::digest(normalized.as_bytes()))
}

/// FNAME/LNAME merge fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeFields {
    #[serde(rename = "FNAME", default)]
    pub first_name: String,
    #[serde(rename = "LNAME", default)]
    pub last_name: String,
}

impl MergeFields {
    fn from_ticket(ticket: &TicketRecord) -> Self {
        Self {
            first_name: ticket.first_name().to_string(),
            last_name: ticket.last_name().to_string(),
        }
    }
}

/// Body for `POST /lists/{list_id}/members`.
#[derive(Debug, Serialize)]
struct NewMember<'a> {
    email_address: &'a str,
    status: &'static str,
    merge_fields: MergeFields,
}

/// Partial FNAME/LNAME update. Unset fields are left as Mailchimp has them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeFieldsUpdate {
    #[serde(rename = "FNAME", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "LNAME", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl MergeFieldsUpdate {
    /// Names the ticket carries that differ from `existing`.
    ///
    /// Blank or missing ticket names never overwrite stored ones.
    fn changes(ticket: &TicketRecord, existing: &MergeFields) -> Option<Self> {
        let changed = |name: &str, current: &str| {
            let name = name.trim();
            (!name.is_empty() && name != current).then(|| name.to_string())
        };

        let update = Self {
            first_name: changed(ticket.first_name(), &existing.first_name),
            last_name: changed(ticket.last_name(), &existing.last_name),
        };

        (update != Self::default()).then_some(update)
    }
}

/// Body for `PATCH /lists/{list_id}/members/{subscriber_hash}`.
#[derive(Debug, Serialize)]
struct MemberUpdate {
    merge_fields: MergeFieldsUpdate,
}

/// The parts of a list member this service reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub merge_fields: MergeFields,
}

/// Mailchimp problem-detail error body.
#[derive(Debug, Default, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

/// Mailchimp Marketing API client bound to one list.
#[derive(Debug, Clone)]
pub struct MailchimpClient {
    client: Client,
    api_key: String,
    list_id: String,
    sync_mode: SyncMode,
    base_url: String,
}

impl MailchimpClient {
    /// Create a client sharing the given HTTP connection pool.
    pub fn new(client: Client, config: &MailchimpConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            list_id: config.list_id.clone(),
            sync_mode: config.sync_mode,
            base_url: config.base_url(),
        }
    }

    /// Set a custom base URL (for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn members_url(&self) -> String {
        format!("{}/lists/{}/members", self.base_url, self.list_id)
    }

    fn member_url(&self, member_id: &str) -> String {
        format!("{}/{}", self.members_url(), member_id)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(BASIC_AUTH_USER, Some(&self.api_key))
    }

    /// Look up a list member by subscriber hash.
    ///
    /// A 404 here is [`MailchimpError::NotFound`], the cue to create.
    pub async fn get_member(&self, member_id: &str) -> Result<Member, MailchimpError> {
        let response = self
            .authed(self.client.get(self.member_url(member_id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MailchimpError::NotFound);
        }

        Ok(check(response).await?.json().await?)
    }

    /// Add a subscribed member with the ticket's name fields.
    pub async fn create_member(
        &self,
        email: &str,
        merge_fields: MergeFields,
    ) -> Result<(), MailchimpError> {
        let body = NewMember {
            email_address: email,
            status: "subscribed",
            merge_fields,
        };

        let response = self
            .authed(self.client.post(self.members_url()))
            .json(&body)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    /// Overwrite the given name fields on an existing member.
    pub async fn update_member(
        &self,
        member_id: &str,
        merge_fields: MergeFieldsUpdate,
    ) -> Result<(), MailchimpError> {
        let response = self
            .authed(self.client.patch(self.member_url(member_id)))
            .json(&MemberUpdate { merge_fields })
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    /// Lookup, then create or (in upsert mode) update.
    pub async fn try_sync(&self, ticket: &TicketRecord) -> Result<SyncOutcome, MailchimpError> {
        let Some(email) = ticket.email() else {
            return Ok(SyncOutcome::Skipped);
        };

        let member_id = subscriber_id(email);

        match self.get_member(&member_id).await {
            Ok(existing) => {
                let update = match self.sync_mode {
                    SyncMode::Upsert => MergeFieldsUpdate::changes(ticket, &existing.merge_fields),
                    SyncMode::CreateOnly => None,
                };

                if let Some(update) = update {
                    self.update_member(&member_id, update).await?;
                    info!(
                        email = %email,
                        list_id = %self.list_id,
                        "mailchimp_member_updated"
                    );
                    Ok(SyncOutcome::Updated)
                } else {
                    info!(
                        email = %email,
                        list_id = %self.list_id,
                        member_status = %existing.status,
                        "mailchimp_member_already_present"
                    );
                    Ok(SyncOutcome::AlreadyPresent)
                }
            }
            Err(MailchimpError::NotFound) => {
                self.create_member(email, MergeFields::from_ticket(ticket)).await?;
                info!(
                    email = %email,
                    list_id = %self.list_id,
                    "mailchimp_member_created"
                );
                Ok(SyncOutcome::Created)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ContactSync for MailchimpClient {
    async fn sync(&self, ticket: &TicketRecord) -> SyncOutcome {
        match self.try_sync(ticket).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    email = ticket.email().unwrap_or_default(),
                    list_id = %self.list_id,
                    error = %e,
                    "mailchimp_sync_failed"
                );
                SyncOutcome::Failed
            }
        }
    }
}

/// Map non-success statuses to [`MailchimpError::Api`].
async fn check(response: Response) -> Result<Response, MailchimpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let problem: ApiProblem = response.json().await.unwrap_or_default();
    Err(MailchimpError::Api {
        status: status.as_u16(),
        title: problem.title,
        detail: problem.detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MEMBERS_PATH: &str = "/lists/list1/members";
    const ALICE_ID: &str = "743173788aa9166801df2e18f0e7ff24";

    async fn setup_mock_client(sync_mode: SyncMode) -> (MockServer, MailchimpClient) {
        let mock_server = MockServer::start().await;
        let config = MailchimpConfig {
            api_key: "key-us6".to_string(),
            list_id: "list1".to_string(),
            sync_mode,
        };
        let client = MailchimpClient::new(Client::new(), &config).with_base_url(mock_server.uri());
        (mock_server, client)
    }

    fn alice() -> TicketRecord {
        TicketRecord::new(Some("a@x.com"), Some("A"), Some("Z"))
    }

    fn member_json(first: &str, last: &str) -> serde_json::Value {
        serde_json::json!({
            "id": ALICE_ID,
            "email_address": "a@x.com",
            "status": "subscribed",
            "merge_fields": { "FNAME": first, "LNAME": last }
        })
    }

    #[test]
    fn test_subscriber_id() {
        assert_eq!(subscriber_id("a@x.com"), ALICE_ID);
        assert_eq!(subscriber_id("  A@X.com "), ALICE_ID);
        assert_eq!(subscriber_id("a@x.com"), subscriber_id("a@x.com"));
        assert_ne!(subscriber_id("a@x.com"), subscriber_id("b@x.com"));
    }

    #[tokio::test]
    async fn test_creates_missing_member() {
        let (mock_server, client) = setup_mock_client(SyncMode::CreateOnly).await;

        Mock::given(method("GET"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .and(basic_auth("anystring", "key-us6"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "title": "Resource Not Found",
                "status": 404
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(MEMBERS_PATH))
            .and(body_json(serde_json::json!({
                "email_address": "a@x.com",
                "status": "subscribed",
                "merge_fields": { "FNAME": "A", "LNAME": "Z" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("A", "Z")))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert_eq!(client.sync(&alice()).await, SyncOutcome::Created);
    }

    #[tokio::test]
    async fn test_existing_member_left_alone_in_create_only() {
        let (mock_server, client) = setup_mock_client(SyncMode::CreateOnly).await;

        Mock::given(method("GET"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("Old", "Name")))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        assert_eq!(client.sync(&alice()).await, SyncOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_upsert_updates_changed_names() {
        let (mock_server, client) = setup_mock_client(SyncMode::Upsert).await;

        Mock::given(method("GET"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("Old", "Name")))
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .and(body_json(serde_json::json!({
                "merge_fields": { "FNAME": "A", "LNAME": "Z" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("A", "Z")))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert_eq!(client.sync(&alice()).await, SyncOutcome::Updated);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_for_unchanged_names() {
        let (mock_server, client) = setup_mock_client(SyncMode::Upsert).await;

        Mock::given(method("GET"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("A", "Z")))
            .expect(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        assert_eq!(client.sync(&alice()).await, SyncOutcome::AlreadyPresent);
        assert_eq!(client.sync(&alice()).await, SyncOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_lookup_failure_does_not_create() {
        let (mock_server, client) = setup_mock_client(SyncMode::CreateOnly).await;

        Mock::given(method("GET"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "title": "API Key Invalid",
                "status": 401,
                "detail": "Your API key may be invalid, or you've attempted to access the wrong datacenter."
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = client.try_sync(&alice()).await.unwrap_err();
        match err {
            MailchimpError::Api { status, title, .. } => {
                assert_eq!(status, 401);
                assert_eq!(title, "API Key Invalid");
            }
            _ => panic!("Expected Api error, got {err:?}"),
        }

        assert_eq!(client.sync(&alice()).await, SyncOutcome::Failed);
    }

    #[tokio::test]
    async fn test_create_failure_reported() {
        let (mock_server, client) = setup_mock_client(SyncMode::CreateOnly).await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(MEMBERS_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "title": "Invalid Resource",
                "status": 400,
                "detail": "a@x.com looks fake or invalid, please enter a real email address."
            })))
            .mount(&mock_server)
            .await;

        assert_eq!(client.sync(&alice()).await, SyncOutcome::Failed);
    }

    #[tokio::test]
    async fn test_create_404_is_api_error() {
        let (mock_server, client) = setup_mock_client(SyncMode::CreateOnly).await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(MEMBERS_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "title": "Resource Not Found",
                "status": 404,
                "detail": "The requested resource could not be found."
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client.try_sync(&alice()).await.unwrap_err();
        match err {
            MailchimpError::Api { status, title, .. } => {
                assert_eq!(status, 404);
                assert_eq!(title, "Resource Not Found");
            }
            _ => panic!("Expected Api error, got {err:?}"),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_names_ticket_lacks() {
        let (mock_server, client) = setup_mock_client(SyncMode::Upsert).await;

        Mock::given(method("GET"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("Alice", "Smith")))
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let no_names = TicketRecord::new(Some("a@x.com"), None, None);
        assert_eq!(client.sync(&no_names).await, SyncOutcome::AlreadyPresent);

        let blank_names = TicketRecord::new(Some("a@x.com"), Some(""), Some("  "));
        assert_eq!(client.sync(&blank_names).await, SyncOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_upsert_patches_only_present_names() {
        let (mock_server, client) = setup_mock_client(SyncMode::Upsert).await;

        Mock::given(method("GET"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("Alice", "Smith")))
            .mount(&mock_server)
            .await;

        Mock::given(method("PATCH"))
            .and(path(format!("{MEMBERS_PATH}/{ALICE_ID}")))
            .and(body_json(serde_json::json!({
                "merge_fields": { "FNAME": "Ally" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_json("Ally", "Smith")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let ticket = TicketRecord::new(Some("a@x.com"), Some("Ally"), None);
        assert_eq!(client.sync(&ticket).await, SyncOutcome::Updated);
    }

    #[tokio::test]
    async fn test_ticket_without_email_skipped() {
        let (mock_server, client) = setup_mock_client(SyncMode::Upsert).await;

        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let ticket = TicketRecord::new(Some(" "), Some("A"), Some("Z"));
        assert_eq!(client.sync(&ticket).await, SyncOutcome::Skipped);
    }
}
