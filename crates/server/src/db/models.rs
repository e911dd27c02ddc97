use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use shared::{ClientOut, Role, TicketOut, TicketStatus, UserOut};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Result<Role> {
        self.role
            .parse()
            .map_err(|e| anyhow!("user {}: {}", self.id, e))
    }

    pub fn to_out(&self) -> Result<UserOut> {
        Ok(UserOut {
            id: self.id,
            username: self.username.clone(),
            role: self.role()?,
            created_at: self.created_at,
        })
    }
}

/// A ticket joined with its client and, when assigned, its worker.
#[derive(Debug, Clone, FromRow)]
pub struct TicketRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub viewed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub in_progress_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
    pub requester_ip: Option<String>,
    pub requester_ua: Option<String>,

    pub client_id: i64,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub client_created_at: DateTime<Utc>,

    pub worker_id: Option<i64>,
    pub worker_username: Option<String>,
    pub worker_role: Option<String>,
    pub worker_created_at: Option<DateTime<Utc>>,
}

impl TicketRecord {
    pub fn status(&self) -> Result<TicketStatus> {
        self.status
            .parse()
            .map_err(|e| anyhow!("ticket {}: {}", self.id, e))
    }

    fn worker(&self) -> Result<Option<UserOut>> {
        match (
            self.worker_id,
            &self.worker_username,
            &self.worker_role,
            self.worker_created_at,
        ) {
            (Some(id), Some(username), Some(role), Some(created_at)) => Ok(Some(UserOut {
                id,
                username: username.clone(),
                role: role.parse().map_err(|e| anyhow!("user {}: {}", id, e))?,
                created_at,
            })),
            _ => Ok(None),
        }
    }

    pub fn into_out(self) -> Result<TicketOut> {
        let status = self.status()?;
        let worker = self.worker()?;
        Ok(TicketOut {
            id: self.id,
            title: self.title,
            description: self.description,
            status,
            viewed: self.viewed,
            client: ClientOut {
                id: self.client_id,
                name: self.client_name,
                email: self.client_email,
                phone: self.client_phone,
                created_at: self.client_created_at,
            },
            worker,
            created_at: self.created_at,
            updated_at: self.updated_at,
            assigned_at: self.assigned_at,
            in_progress_at: self.in_progress_at,
            done_at: self.done_at,
            requester_ip: self.requester_ip,
            requester_ua: self.requester_ua,
        })
    }
}
