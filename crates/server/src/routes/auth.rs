use axum::{extract::State, Form, Json};
use axum_extra::extract::WithRejection;
use shared::{ClientCredentialsForm, LoginRequest, TokenResponse, UserOut};

use crate::{accounts, auth::CurrentUser, error::AppError, state::AppState};

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = accounts::authenticate(&state.db, &state.tokens, &req.username, &req.password).await?;
    Ok(Json(token))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<UserOut>, AppError> {
    Ok(Json(accounts::current_user(&state.db, &identity).await?))
}

/// OAuth2 client-credentials grant
/// POST /auth/token
pub async fn client_credentials(
    State(state): State<AppState>,
    WithRejection(Form(form), _): WithRejection<Form<ClientCredentialsForm>, AppError>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = accounts::exchange_client_credentials(&state.config.auth, &state.tokens, &form)?;
    Ok(Json(token))
}

/// POST /auth/request_view_token
pub async fn request_view_token(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(accounts::mint_view_token(&state.tokens, &identity)?))
}

/// Kept for old dashboards; the exchange flow is switched off.
/// POST /auth/exchange_view_token
pub async fn exchange_view_token() -> AppError {
    AppError::NotFound("disabled".to_string())
}
