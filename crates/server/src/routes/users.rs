use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use shared::{UserCreate, UserOut, UserUpdate};

use crate::{accounts, auth::CurrentUser, error::AppError, state::AppState, tickets::positive_id};

type UserId = WithRejection<Path<i64>, AppError>;

/// GET /users
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Vec<UserOut>>, AppError> {
    Ok(Json(accounts::list_users(&state.db, &identity).await?))
}

/// POST /users
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Json(req), _): WithRejection<Json<UserCreate>, AppError>,
) -> Result<(StatusCode, Json<UserOut>), AppError> {
    let user = accounts::create_user(&state.db, &state.config.auth, &identity, &req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /users/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Path(id), _): UserId,
    WithRejection(Json(req), _): WithRejection<Json<UserUpdate>, AppError>,
) -> Result<Json<UserOut>, AppError> {
    let id = positive_id(id, "user_id")?;
    Ok(Json(accounts::update_user(&state.db, &state.config.auth, &identity, id, &req).await?))
}

/// DELETE /users/:id
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    WithRejection(Path(id), _): UserId,
) -> Result<StatusCode, AppError> {
    let id = positive_id(id, "user_id")?;
    accounts::delete_user(&state.db, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};
    use shared::{Role, UserOut};

    use crate::routes::test_support::{decode, TestApp};

    #[tokio::test]
    async fn test_user_crud() {
        let app = TestApp::new().await;
        let (_, admin) = app.login_as("boss", Role::Admin).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/users",
                Some(&admin),
                Some(json!({"username": "wanda", "password": "pw1", "role": "worker"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: UserOut = decode(body);
        assert_eq!(created.role, Role::Worker);

        let (status, body) = app
            .send(
                Method::POST,
                "/users",
                Some(&admin),
                Some(json!({"username": "wanda", "password": "pw2", "role": "worker"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Username already exists");

        let uri = format!("/users/{}", created.id);
        let (status, body) = app
            .send(
                Method::PUT,
                &uri,
                Some(&admin),
                Some(json!({"username": "wendy", "role": "admin", "password": ""})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let updated: UserOut = decode(body);
        assert_eq!((updated.username.as_str(), updated.role), ("wendy", Role::Admin));

        // Empty password on update keeps the old one
        let (status, _) = app
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({"username": "wendy", "password": "pw1"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.send(Method::GET, "/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let users: Vec<UserOut> = decode(body);
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_workers_cannot_manage_users() {
        let app = TestApp::new().await;
        let (worker_id, worker) = app.login_as("wanda", Role::Worker).await;

        let (status, body) = app.send(Method::GET, "/users", Some(&worker), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Insufficient permissions");

        let uri = format!("/users/{worker_id}");
        let (status, _) = app.send(Method::DELETE, &uri, Some(&worker), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_deleted_account_token_stops_working() {
        let app = TestApp::new().await;
        let (_, admin) = app.login_as("boss", Role::Admin).await;
        let (worker_id, worker) = app.login_as("wanda", Role::Worker).await;

        let uri = format!("/users/{worker_id}");
        app.send(Method::DELETE, &uri, Some(&admin), None).await;

        let (status, _) = app.send(Method::GET, "/tickets", Some(&worker), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
