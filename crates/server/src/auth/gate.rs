use shared::Role;

use crate::error::AppError;

/// Who is making a request, after the bearer token has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Admin { id: i64, username: String },
    Worker { id: i64, username: String },
    /// Machine credential exchanged through the client-credentials grant.
    Service { client_id: String },
    /// Holder of an admin-minted view token. Read-only.
    Viewer { username: String },
}

impl Identity {
    pub fn role(&self) -> Role {
        match self {
            Identity::Worker { .. } => Role::Worker,
            Identity::Admin { .. } | Identity::Service { .. } | Identity::Viewer { .. } => {
                Role::Admin
            }
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Identity::Admin { username, .. }
            | Identity::Worker { username, .. }
            | Identity::Viewer { username } => username,
            Identity::Service { client_id } => client_id,
        }
    }

    /// Row id of the backing user account, if there is one.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Identity::Admin { id, .. } | Identity::Worker { id, .. } => Some(*id),
            Identity::Service { .. } | Identity::Viewer { .. } => None,
        }
    }

    /// Workers only ever see their own tickets.
    pub fn worker_scope(&self) -> Option<i64> {
        match self {
            Identity::Worker { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Identity::Viewer { .. })
    }

    /// Fails with Forbidden when a worker touches a ticket held by someone
    /// else (or by nobody).
    pub fn check_owns(&self, ticket_worker: Option<i64>) -> Result<(), AppError> {
        match self.worker_scope() {
            Some(me) if ticket_worker != Some(me) => Err(AppError::Forbidden(
                "Cannot modify other worker's ticket".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

pub fn require_role(identity: &Identity, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&identity.role()) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Insufficient permissions".to_string()))
    }
}

const STAFF: &[Role] = &[Role::Admin, Role::Worker];
const ADMIN: &[Role] = &[Role::Admin];

/// Every guarded operation of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    WhoAmI,
    ListTickets,
    ReadTicket,
    MarkViewed,
    UpdateStatus,
    AssignTicket,
    TicketStats,
    ListUsers,
    ManageUsers,
    MintViewToken,
    ResetData,
}

impl Operation {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Operation::WhoAmI
            | Operation::ListTickets
            | Operation::ReadTicket
            | Operation::MarkViewed
            | Operation::UpdateStatus => STAFF,
            Operation::AssignTicket
            | Operation::TicketStats
            | Operation::ListUsers
            | Operation::ManageUsers
            | Operation::MintViewToken
            | Operation::ResetData => ADMIN,
        }
    }

    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            Operation::WhoAmI
                | Operation::ListTickets
                | Operation::ReadTicket
                | Operation::TicketStats
                | Operation::ListUsers
        )
    }
}

pub fn authorize(identity: &Identity, op: Operation) -> Result<(), AppError> {
    require_role(identity, op.allowed_roles())?;
    if op.mutates() && identity.is_read_only() {
        return Err(AppError::Forbidden("View token is read-only".to_string()));
    }
    Ok(())
}
