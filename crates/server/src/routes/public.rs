use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    Json,
};
use axum_extra::{extract::WithRejection, headers::UserAgent, TypedHeader};
use shared::{TicketCreatePublic, TicketOut};

use crate::{
    error::AppError,
    state::AppState,
    tickets::{self, Intake},
};

/// Unauthenticated intake form
/// POST /public/tickets
pub async fn submit_ticket(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    user_agent: Option<TypedHeader<UserAgent>>,
    WithRejection(Json(payload), _): WithRejection<Json<TicketCreatePublic>, AppError>,
) -> Result<(StatusCode, Json<TicketOut>), AppError> {
    let intake = Intake {
        payload,
        requester_ip: peer.map(|ConnectInfo(addr)| addr.ip().to_string()),
        requester_ua: user_agent.map(|TypedHeader(ua)| ua.as_str().to_string()),
    };

    let ticket = tickets::submit(&state.db, intake).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}
