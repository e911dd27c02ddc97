//! Startup seeding of the configured admin and worker accounts.

use shared::Role;

use crate::{
    accounts,
    config::{AuthConfig, SeedConfig},
    db::Database,
    error::AppError,
};

fn pairs(seed: &SeedConfig) -> [(Option<&str>, Option<&str>, Role); 2] {
    [
        (
            seed.admin_username.as_deref(),
            seed.admin_password.as_deref(),
            Role::Admin,
        ),
        (
            seed.worker_username.as_deref(),
            seed.worker_password.as_deref(),
            Role::Worker,
        ),
    ]
}

/// Creates each configured account that does not exist yet. Existing
/// accounts are left untouched, passwords included. Returns how many
/// accounts were created.
pub async fn ensure_accounts(
    db: &Database,
    seed: &SeedConfig,
    auth: &AuthConfig,
) -> Result<usize, AppError> {
    let mut created = 0;

    for (username, password, role) in pairs(seed) {
        let (Some(username), Some(password)) = (username, password) else {
            continue;
        };
        if username.is_empty() || password.is_empty() {
            tracing::warn!("Skipping {} seed account with empty credentials", role);
            continue;
        }

        if db.get_user_by_username(username).await?.is_some() {
            tracing::debug!("Seed account {} already exists", username);
            continue;
        }

        match accounts::create_account(db, auth, username, password, role).await {
            Ok(_) => created += 1,
            // Another instance seeded it first
            Err(AppError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    if created > 0 {
        tracing::info!("Seeded {} account(s)", created);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;

    fn seed() -> SeedConfig {
        SeedConfig {
            admin_username: Some("admin".into()),
            admin_password: Some("admin-pw".into()),
            worker_username: Some("worker".into()),
            worker_password: Some("worker-pw".into()),
        }
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let db = Database::in_memory().await;
        assert_eq!(ensure_accounts(&db, &seed(), &AuthConfig::default()).await.unwrap(), 2);
        assert_eq!(ensure_accounts(&db, &seed(), &AuthConfig::default()).await.unwrap(), 0);

        let users = db.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].role().unwrap(), Role::Admin);
        assert_eq!(users[1].role().unwrap(), Role::Worker);
    }

    #[tokio::test]
    async fn test_existing_password_is_kept() {
        let db = Database::in_memory().await;
        ensure_accounts(&db, &seed(), &AuthConfig::default()).await.unwrap();

        let mut changed = seed();
        changed.admin_password = Some("other".into());
        ensure_accounts(&db, &changed, &AuthConfig::default()).await.unwrap();

        let admin = db.get_user_by_username("admin").await.unwrap().unwrap();
        assert!(verify_password("admin-pw", &admin.password_hash));
    }

    #[tokio::test]
    async fn test_incomplete_pairs_are_skipped() {
        let db = Database::in_memory().await;
        let partial = SeedConfig {
            admin_username: Some("admin".into()),
            admin_password: None,
            worker_username: Some("worker".into()),
            worker_password: Some(String::new()),
        };
        assert_eq!(ensure_accounts(&db, &partial, &AuthConfig::default()).await.unwrap(), 0);
        let seed_default = SeedConfig::default();
        let auth_default = AuthConfig::default();
        let empty = ensure_accounts(&db, &seed_default, &auth_default);
        assert_eq!(empty.await.unwrap(), 0);
    }
}
