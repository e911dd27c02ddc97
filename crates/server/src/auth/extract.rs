use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use shared::Role;

use super::{
    gate::Identity,
    token::{Claims, TokenKind},
};
use crate::{config::AuthConfig, db::Database, error::AppError, state::AppState};

/// The authenticated caller. Rejects with 401 when the bearer token is
/// missing, invalid, expired, or names an account that no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("Not authenticated".to_string()))?;

        let claims = state.tokens.verify(bearer.token())?;
        let identity = resolve_identity(&state.db, &state.config.auth, claims).await?;
        Ok(CurrentUser(identity))
    }
}

/// Maps verified claims onto a live identity. The stored role wins over the
/// role in the token so demoted accounts lose access immediately.
pub(crate) async fn resolve_identity(
    db: &Database,
    auth: &AuthConfig,
    claims: Claims,
) -> Result<Identity, AppError> {
    let invalid = || AppError::Unauthorized("Could not validate credentials".to_string());

    let user = db.get_user_by_username(&claims.sub).await?;

    match (claims.kind, user) {
        (TokenKind::View, Some(user)) if user.role()? == Role::Admin => Ok(Identity::Viewer {
            username: user.username,
        }),
        (TokenKind::View, _) => Err(invalid()),
        (TokenKind::Access, Some(user)) => match user.role()? {
            Role::Admin => Ok(Identity::Admin {
                id: user.id,
                username: user.username,
            }),
            Role::Worker => Ok(Identity::Worker {
                id: user.id,
                username: user.username,
            }),
        },
        (TokenKind::Access, None)
            if claims.sub == auth.oauth_client_id && claims.role == Role::Admin =>
        {
            Ok(Identity::Service {
                client_id: claims.sub,
            })
        }
        (TokenKind::Access, None) => Err(invalid()),
    }
}
