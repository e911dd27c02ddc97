//! Ticket lifecycle: intake, listing, assignment and status changes.

use chrono::Utc;
use shared::{TicketCreatePublic, TicketListQuery, TicketOut, TicketStats, TicketStatus, TicketsPage};

use crate::{
    auth::{authorize, Identity, Operation},
    db::{Database, IntakeOutcome, NewIntake, TicketFilter, TicketRecord},
    error::AppError,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
const SEARCH_MAX: usize = 100;
const TITLE_MAX: usize = 200;
const CLIENT_NAME_MAX: usize = 100;
const EMAIL_MAX: usize = 200;
const PHONE_MAX: usize = 50;
const IP_MAX: usize = 64;
const UA_MAX: usize = 256;

/// A public submission together with what was observed about the sender.
#[derive(Debug, Clone)]
pub struct Intake {
    pub payload: TicketCreatePublic,
    pub requester_ip: Option<String>,
    pub requester_ua: Option<String>,
}

fn truncate(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn validate_intake(payload: &TicketCreatePublic) -> Result<(), AppError> {
    let mut problems = Vec::new();
    let mut check = |ok: bool, msg: &str| {
        if !ok {
            problems.push(msg.to_string());
        }
    };

    check(!payload.title.trim().is_empty(), "title: must not be empty");
    check(payload.title.chars().count() <= TITLE_MAX, "title: at most 200 characters");
    check(!payload.description.trim().is_empty(), "description: must not be empty");
    check(!payload.client.name.trim().is_empty(), "client.name: must not be empty");
    check(
        payload.client.name.chars().count() <= CLIENT_NAME_MAX,
        "client.name: at most 100 characters",
    );
    check(
        looks_like_email(&payload.client.email) && payload.client.email.len() <= EMAIL_MAX,
        "client.email: not a valid email address",
    );
    if let Some(phone) = &payload.client.phone {
        check(phone.chars().count() <= PHONE_MAX, "client.phone: at most 50 characters");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(problems))
    }
}

fn duplicate() -> AppError {
    AppError::Conflict("Duplicate ticket detected".to_string())
}

fn not_found() -> AppError {
    AppError::NotFound("Ticket not found".to_string())
}

pub fn positive_id(value: i64, field: &str) -> Result<i64, AppError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(AppError::validation(format!("{field}: must be greater than 0")))
    }
}

/// Creates a client and its ticket from the public form. Identical content
/// from the same email address is rejected as a duplicate.
pub async fn submit(db: &Database, intake: Intake) -> Result<TicketOut, AppError> {
    let payload = &intake.payload;
    validate_intake(payload)?;

    if db
        .find_duplicate_ticket(&payload.title, &payload.description, &payload.client.email)
        .await?
        .is_some()
    {
        tracing::info!("Rejected duplicate ticket from {}", payload.client.email);
        return Err(duplicate());
    }

    let new = NewIntake {
        title: &payload.title,
        description: &payload.description,
        client_name: &payload.client.name,
        client_email: &payload.client.email,
        client_phone: payload.client.phone.as_deref(),
        requester_ip: intake.requester_ip.as_deref().map(|ip| truncate(ip, IP_MAX)),
        requester_ua: intake.requester_ua.as_deref().map(|ua| truncate(ua, UA_MAX)),
    };

    let id = match db.create_ticket_with_client(&new, Utc::now()).await? {
        IntakeOutcome::Created(id) => id,
        IntakeOutcome::Duplicate => {
            tracing::info!("Lost duplicate race for {}", payload.client.email);
            return Err(duplicate());
        }
    };

    tracing::info!("Ticket {} submitted by {}", id, payload.client.email);
    load(db, id).await
}

/// Validated paging parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub size: u32,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.size as i64
    }
}

fn parse_list_query(query: &TicketListQuery) -> Result<(TicketFilter, Page), AppError> {
    let mut problems = Vec::new();

    let page = query.page.unwrap_or(1);
    if page < 1 {
        problems.push("page: must be at least 1".to_string());
    }
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&size) {
        problems.push(format!("size: must be between 1 and {MAX_PAGE_SIZE}"));
    }
    let search = query.search.as_deref().filter(|s| !s.is_empty());
    if search.is_some_and(|s| s.chars().count() > SEARCH_MAX) {
        problems.push(format!("search: at most {SEARCH_MAX} characters"));
    }
    if query.worker_id.is_some_and(|id| id <= 0) {
        problems.push("worker_id: must be greater than 0".to_string());
    }

    if !problems.is_empty() {
        return Err(AppError::Validation(problems));
    }

    let filter = TicketFilter {
        search: search.map(str::to_string),
        status: query.status,
        worker_id: query.worker_id,
    };
    Ok((filter, Page { page, size }))
}

/// One page of tickets, newest first. Workers are pinned to their own
/// tickets whatever `worker_id` they ask for.
pub async fn list(db: &Database, actor: &Identity, query: &TicketListQuery) -> Result<TicketsPage, AppError> {
    authorize(actor, Operation::ListTickets)?;
    let (mut filter, page) = parse_list_query(query)?;

    if let Some(me) = actor.worker_scope() {
        filter.worker_id = Some(me);
    }

    let (records, total) = db.list_tickets(&filter, page.limit(), page.offset()).await?;
    let items = records
        .into_iter()
        .map(TicketRecord::into_out)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(TicketsPage {
        items,
        total,
        page: page.page,
        size: page.size,
    })
}

async fn load(db: &Database, id: i64) -> Result<TicketOut, AppError> {
    let record = db.get_ticket(id).await?.ok_or_else(not_found)?;
    Ok(record.into_out()?)
}

/// Fetches the ticket and applies the worker ownership rule.
async fn load_owned(db: &Database, actor: &Identity, id: i64) -> Result<TicketRecord, AppError> {
    let record = db.get_ticket(id).await?.ok_or_else(not_found)?;
    actor.check_owns(record.worker_id)?;
    Ok(record)
}

pub async fn get(db: &Database, actor: &Identity, id: i64) -> Result<TicketOut, AppError> {
    authorize(actor, Operation::ReadTicket)?;
    Ok(load_owned(db, actor, id).await?.into_out()?)
}

pub async fn set_viewed(
    db: &Database,
    actor: &Identity,
    id: i64,
    viewed: bool,
) -> Result<TicketOut, AppError> {
    authorize(actor, Operation::MarkViewed)?;
    load_owned(db, actor, id).await?;

    db.set_ticket_viewed(id, viewed).await?;
    load(db, id).await
}

/// Hands the ticket to a worker. Re-assigning refreshes `assigned_at`; the
/// status is left alone.
pub async fn assign(
    db: &Database,
    actor: &Identity,
    id: i64,
    worker_id: i64,
) -> Result<TicketOut, AppError> {
    authorize(actor, Operation::AssignTicket)?;
    db.get_ticket(id).await?.ok_or_else(not_found)?;

    if db.get_worker(worker_id).await?.is_none() {
        return Err(AppError::BadRequest("Worker not found or not a worker".to_string()));
    }

    db.assign_ticket(id, worker_id, Utc::now()).await?;
    tracing::info!("Ticket {} assigned to worker {} by {}", id, worker_id, actor.subject());
    load(db, id).await
}

/// Moves a ticket to any status. Entering `in_progress` or `done` stamps the
/// matching timestamp the first time only.
pub async fn set_status(
    db: &Database,
    actor: &Identity,
    id: i64,
    status: TicketStatus,
) -> Result<TicketOut, AppError> {
    authorize(actor, Operation::UpdateStatus)?;
    let current = load_owned(db, actor, id).await?;

    db.set_ticket_status(id, status, Utc::now()).await?;
    tracing::info!(
        "Ticket {} moved {} -> {} by {}",
        id,
        current.status,
        status,
        actor.subject()
    );
    load(db, id).await
}

/// Per-worker counters for the dashboard. `assigned` only counts tickets
/// still in `new`; in-progress tickets are reported separately.
pub async fn stats(db: &Database, actor: &Identity, worker_id: i64) -> Result<TicketStats, AppError> {
    authorize(actor, Operation::TicketStats)?;
    positive_id(worker_id, "worker_id")?;

    Ok(TicketStats {
        assigned: db.count_worker_tickets(worker_id, TicketStatus::New).await?,
        in_progress: db
            .count_worker_tickets(worker_id, TicketStatus::InProgress)
            .await?,
    })
}
