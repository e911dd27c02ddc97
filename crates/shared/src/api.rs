use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Account role. Admins triage and manage accounts, workers handle tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "worker" => Ok(Role::Worker),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Ticket lifecycle state. Any state may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    InProgress,
    Done,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Done => "done",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TicketStatus::New),
            "in_progress" => Ok(TicketStatus::InProgress),
            "done" => Ok(TicketStatus::Done),
            other => Err(ParseEnumError {
                kind: "ticket status",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
}

fn bearer() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: bearer(),
        }
    }
}

/// OAuth2 client-credentials form for service-to-service automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentialsForm {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Full replacement of a user's name and role. An absent or empty password
/// keeps the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn new_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Clients and tickets
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIn {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOut {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload of the unauthenticated intake form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCreatePublic {
    pub title: String,
    pub description: String,
    pub client: ClientIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketOut {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub viewed: bool,
    pub client: ClientOut,
    pub worker: Option<UserOut>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub in_progress_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
    pub requester_ip: Option<String>,
    pub requester_ua: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsPage {
    pub items: Vec<TicketOut>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
}

/// Query string of `GET /tickets`. Missing values fall back to the first
/// page of ten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketListQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub search: Option<String>,
    pub status: Option<TicketStatus>,
    pub worker_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    /// Tickets assigned to the worker that are still `new`.
    pub assigned: i64,
    pub in_progress: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsQuery {
    pub worker_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViewedUpdate {
    pub viewed: bool,
}

/// Assignment target. Accepted both as a bare JSON number and as an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssignRequest {
    Embedded { worker_id: i64 },
    Bare(i64),
}

impl AssignRequest {
    pub fn worker_id(&self) -> i64 {
        match *self {
            AssignRequest::Embedded { worker_id } | AssignRequest::Bare(worker_id) => worker_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AssignQuery {
    pub worker_id: Option<i64>,
}

/// Status change target. Accepted both as a bare JSON string and as an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusRequest {
    Embedded { new_status: TicketStatus },
    Bare(TicketStatus),
}

impl StatusRequest {
    pub fn status(&self) -> TicketStatus {
        match *self {
            StatusRequest::Embedded { new_status } | StatusRequest::Bare(new_status) => new_status,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatusQuery {
    pub new_status: Option<TicketStatus>,
}

// ============================================================================
// Misc responses
// ============================================================================

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!("in_progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert!("IN_PROGRESS".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        assert_eq!("worker".parse::<Role>(), Ok(Role::Worker));
        let err = "owner".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role: owner");
    }

    #[test]
    fn test_assign_request_accepts_both_shapes() {
        let bare: AssignRequest = serde_json::from_str("7").unwrap();
        let embedded: AssignRequest = serde_json::from_str(r#"{"worker_id":7}"#).unwrap();
        assert_eq!(bare.worker_id(), 7);
        assert_eq!(embedded.worker_id(), 7);
    }

    #[test]
    fn test_status_request_accepts_both_shapes() {
        let bare: StatusRequest = serde_json::from_str("\"done\"").unwrap();
        let embedded: StatusRequest =
            serde_json::from_str(r#"{"new_status":"in_progress"}"#).unwrap();
        assert_eq!(bare.status(), TicketStatus::Done);
        assert_eq!(embedded.status(), TicketStatus::InProgress);
        assert!(serde_json::from_str::<StatusRequest>("\"closed\"").is_err());
    }

    #[test]
    fn test_token_response_defaults_to_bearer() {
        let resp: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(resp.token_type, "bearer");
        let json = serde_json::to_value(TokenResponse::bearer("xyz".into())).unwrap();
        assert_eq!(json["token_type"], "bearer");
    }

    #[test]
    fn test_user_update_empty_password_means_unchanged() {
        let update: UserUpdate =
            serde_json::from_str(r#"{"username":"bob","role":"worker","password":""}"#).unwrap();
        assert_eq!(update.new_password(), None);

        let update: UserUpdate =
            serde_json::from_str(r#"{"username":"bob","role":"worker","password":"s3cret"}"#)
                .unwrap();
        assert_eq!(update.new_password(), Some("s3cret"));
    }

    #[test]
    fn test_error_body_omits_missing_details() {
        let body = ErrorBody {
            error: "Ticket not found".into(),
            status: 404,
            details: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"Ticket not found","status":404}"#);
    }

    #[test]
    fn test_intake_phone_is_optional() {
        let payload: TicketCreatePublic = serde_json::from_str(
            r#"{"title":"Leak","description":"Kitchen sink","client":{"name":"A","email":"a@x.com"}}"#,
        )
        .unwrap();
        assert_eq!(payload.client.phone, None);
    }
}
