use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use shared::{
    AssignQuery, AssignRequest, StatsQuery, StatusQuery, StatusRequest, TicketListQuery, TicketOut,
    TicketStats, TicketsPage, ViewedUpdate,
};

use super::optional_json;
use crate::{
    auth::CurrentUser,
    error::AppError,
    state::AppState,
    tickets::{self, positive_id},
};

type TicketId = WithRejection<Path<i64>, AppError>;

/// GET /tickets
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Query(query), _): WithRejection<Query<TicketListQuery>, AppError>,
) -> Result<Json<TicketsPage>, AppError> {
    Ok(Json(tickets::list(&state.db, &identity, &query).await?))
}

/// GET /tickets/stats
pub async fn stats(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Query(query), _): WithRejection<Query<StatsQuery>, AppError>,
) -> Result<Json<TicketStats>, AppError> {
    Ok(Json(tickets::stats(&state.db, &identity, query.worker_id).await?))
}

/// GET /tickets/:id
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Path(id), _): TicketId,
) -> Result<Json<TicketOut>, AppError> {
    let id = positive_id(id, "ticket_id")?;
    Ok(Json(tickets::get(&state.db, &identity, id).await?))
}

/// POST /tickets/:id/viewed
pub async fn viewed(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Path(id), _): TicketId,
    WithRejection(Json(update), _): WithRejection<Json<ViewedUpdate>, AppError>,
) -> Result<Json<TicketOut>, AppError> {
    let id = positive_id(id, "ticket_id")?;
    Ok(Json(tickets::set_viewed(&state.db, &identity, id, update.viewed).await?))
}

/// `worker_id` comes from the query string or the JSON body.
/// POST /tickets/:id/assign
pub async fn assign(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Path(id), _): TicketId,
    WithRejection(Query(query), _): WithRejection<Query<AssignQuery>, AppError>,
    body: Bytes,
) -> Result<Json<TicketOut>, AppError> {
    let id = positive_id(id, "ticket_id")?;
    let worker_id = match query.worker_id {
        Some(worker_id) => worker_id,
        None => optional_json::<AssignRequest>(&body)?
            .map(|req| req.worker_id())
            .ok_or_else(|| AppError::validation("worker_id: field required"))?,
    };
    let worker_id = positive_id(worker_id, "worker_id")?;

    Ok(Json(tickets::assign(&state.db, &identity, id, worker_id).await?))
}

/// `new_status` comes from the query string or the JSON body.
/// POST /tickets/:id/status
pub async fn status(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Path(id), _): TicketId,
    WithRejection(Query(query), _): WithRejection<Query<StatusQuery>, AppError>,
    body: Bytes,
) -> Result<Json<TicketOut>, AppError> {
    let id = positive_id(id, "ticket_id")?;
    let new_status = match query.new_status {
        Some(status) => status,
        None => optional_json::<StatusRequest>(&body)?
            .map(|req| req.status())
            .ok_or_else(|| AppError::validation("new_status: field required"))?,
    };

    Ok(Json(tickets::set_status(&state.db, &identity, id, new_status).await?))
}
