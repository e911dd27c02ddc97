//! Thin typed client for the repairdesk REST API.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    AssignRequest, ErrorBody, LoginRequest, StatusRequest, TicketCreatePublic, TicketListQuery,
    TicketOut, TicketStats, TicketStatus, TicketsPage, TokenResponse, UserCreate, UserOut,
    UserUpdate, ViewedUpdate,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not logged in. Run 'repairdesk login' first")]
    NotLoggedIn,

    #[error("{message} ({status})")]
    Server {
        status: StatusCode,
        message: String,
        details: Vec<String>,
    },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Turns a non-success response body into an error. Bodies that are not the
/// server's JSON error shape are kept verbatim.
pub fn decode_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => ApiError::Server {
            status,
            message: err.error,
            details: err.details.unwrap_or_default(),
        },
        Err(_) => ApiError::Server {
            status,
            message: if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                body.trim().to_string()
            },
            details: Vec::new(),
        },
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
            token,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::NotLoggedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!("{} -> {}", status, body);
        Err(decode_error(status, &body))
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let resp = Self::check(builder.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        builder: RequestBuilder,
        body: &B,
    ) -> Result<T, ApiError> {
        Self::json(builder.json(body)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        Self::send_json(self.request(Method::POST, "/auth/login"), &req).await
    }

    pub async fn me(&self) -> Result<UserOut, ApiError> {
        Self::json(self.authed(Method::GET, "/auth/me")?).await
    }

    pub async fn view_token(&self) -> Result<TokenResponse, ApiError> {
        Self::json(self.authed(Method::POST, "/auth/request_view_token")?).await
    }

    pub async fn submit(&self, ticket: &TicketCreatePublic) -> Result<TicketOut, ApiError> {
        Self::send_json(self.request(Method::POST, "/public/tickets"), ticket).await
    }

    pub async fn list_tickets(&self, query: &TicketListQuery) -> Result<TicketsPage, ApiError> {
        Self::json(self.authed(Method::GET, "/tickets")?.query(query)).await
    }

    pub async fn ticket(&self, id: i64) -> Result<TicketOut, ApiError> {
        Self::json(self.authed(Method::GET, &format!("/tickets/{id}"))?).await
    }

    pub async fn assign(&self, id: i64, worker_id: i64) -> Result<TicketOut, ApiError> {
        let path = format!("/tickets/{id}/assign");
        Self::send_json(self.authed(Method::POST, &path)?, &AssignRequest::Embedded { worker_id }).await
    }

    pub async fn set_status(&self, id: i64, new_status: TicketStatus) -> Result<TicketOut, ApiError> {
        let path = format!("/tickets/{id}/status");
        Self::send_json(self.authed(Method::POST, &path)?, &StatusRequest::Embedded { new_status }).await
    }

    pub async fn set_viewed(&self, id: i64, viewed: bool) -> Result<TicketOut, ApiError> {
        let path = format!("/tickets/{id}/viewed");
        Self::send_json(self.authed(Method::POST, &path)?, &ViewedUpdate { viewed }).await
    }

    pub async fn stats(&self, worker_id: i64) -> Result<TicketStats, ApiError> {
        let builder = self
            .authed(Method::GET, "/tickets/stats")?
            .query(&[("worker_id", worker_id)]);
        Self::json(builder).await
    }

    pub async fn users(&self) -> Result<Vec<UserOut>, ApiError> {
        Self::json(self.authed(Method::GET, "/users")?).await
    }

    pub async fn create_user(&self, req: &UserCreate) -> Result<UserOut, ApiError> {
        Self::send_json(self.authed(Method::POST, "/users")?, req).await
    }

    pub async fn update_user(&self, id: i64, req: &UserUpdate) -> Result<UserOut, ApiError> {
        Self::send_json(self.authed(Method::PUT, &format!("/users/{id}"))?, req).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        let builder = self.authed(Method::DELETE, &format!("/users/{id}"))?;
        Self::check(builder.send().await?).await?;
        Ok(())
    }
}
