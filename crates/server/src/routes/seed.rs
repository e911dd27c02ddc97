use axum::{extract::State, Json};
use shared::{DetailResponse, StatusResponse};

use crate::{accounts, auth::CurrentUser, error::AppError, state::AppState};

/// Seeding endpoints that older dashboards still call.
/// POST /admin/seed, /admin/seed/faker, /admin/seed/reset_and_seed, /admin/seed/only_new
pub async fn disabled() -> Json<DetailResponse> {
    Json(DetailResponse {
        detail: "disabled".to_string(),
    })
}

/// Account reset: drops tickets, clients and workers.
/// POST /admin/seed/reset
pub async fn reset(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<StatusResponse>, AppError> {
    accounts::reset_data(&state.db, &identity).await?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use shared::Role;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_legacy_seed_routes_are_noops() {
        let app = TestApp::new().await;
        for uri in [
            "/admin/seed",
            "/admin/seed/faker",
            "/admin/seed/reset_and_seed",
            "/admin/seed/only_new",
        ] {
            let (status, body) = app.send(Method::POST, uri, None, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body, json!({"detail": "disabled"}));
        }
    }

    #[tokio::test]
    async fn test_reset_keeps_admins() {
        let app = TestApp::new().await;
        let (_, admin) = app.login_as("boss", Role::Admin).await;
        let (_, worker) = app.login_as("wanda", Role::Worker).await;
        app.send(
            Method::POST,
            "/public/tickets",
            None,
            Some(json!({
                "title": "Leak",
                "description": "Kitchen sink",
                "client": {"name": "A", "email": "a@x.com"}
            })),
        )
        .await;

        let (status, _) = app.send(Method::POST, "/admin/seed/reset", Some(&worker), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(Method::POST, "/admin/seed/reset", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let (_, body) = app.send(Method::GET, "/tickets", Some(&admin), None).await;
        assert_eq!(body["total"], 0);
        let (_, body) = app.send(Method::GET, "/users", Some(&admin), None).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }
}
