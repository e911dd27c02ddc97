//! Credential store: user accounts, login and token exchange.

use chrono::Utc;
use shared::{ClientCredentialsForm, Role, TokenResponse, UserCreate, UserOut, UserUpdate};

use crate::{
    auth::{authorize, hash_password, verify_password, Identity, Operation, TokenIssuer},
    config::AuthConfig,
    db::Database,
    error::{is_unique_violation, AppError},
};

const USERNAME_MAX: usize = 50;

fn validate_credentials(
    auth: &AuthConfig,
    username: &str,
    password: Option<&str>,
) -> Result<(), AppError> {
    let mut problems = Vec::new();
    if username.trim().is_empty() {
        problems.push("username: must not be empty".to_string());
    }
    // A user with this name would shadow the client-credentials subject
    if username == auth.oauth_client_id {
        problems.push("username: reserved for the service client".to_string());
    }
    if username.chars().count() > USERNAME_MAX {
        problems.push(format!("username: at most {USERNAME_MAX} characters"));
    }
    if password.is_some_and(str::is_empty) {
        problems.push("password: must not be empty".to_string());
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(problems))
    }
}

fn username_taken() -> AppError {
    AppError::Conflict("Username already exists".to_string())
}

/// Inserts a new account. Used by the admin endpoint and by bootstrap.
pub async fn create_account(
    db: &Database,
    auth: &AuthConfig,
    username: &str,
    password: &str,
    role: Role,
) -> Result<UserOut, AppError> {
    validate_credentials(auth, username, Some(password))?;

    if db.get_user_by_username(username).await?.is_some() {
        return Err(username_taken());
    }

    let password_hash = hash_password(password)?;
    let id = match db.create_user(username, &password_hash, role, Utc::now()).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => return Err(username_taken()),
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Created {} account {} (id {})", role, username, id);

    let user = db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user {id} vanished after insert")))?;
    Ok(user.to_out()?)
}

pub async fn create_user(
    db: &Database,
    auth: &AuthConfig,
    actor: &Identity,
    req: &UserCreate,
) -> Result<UserOut, AppError> {
    authorize(actor, Operation::ManageUsers)?;
    create_account(db, auth, &req.username, &req.password, req.role).await
}

pub async fn list_users(db: &Database, actor: &Identity) -> Result<Vec<UserOut>, AppError> {
    authorize(actor, Operation::ListUsers)?;
    let users = db.list_users().await?;
    Ok(users
        .iter()
        .map(|u| u.to_out())
        .collect::<anyhow::Result<Vec<_>>>()?)
}

pub async fn update_user(
    db: &Database,
    auth: &AuthConfig,
    actor: &Identity,
    user_id: i64,
    req: &UserUpdate,
) -> Result<UserOut, AppError> {
    authorize(actor, Operation::ManageUsers)?;
    validate_credentials(auth, &req.username, None)?;

    let password_hash = req.new_password().map(hash_password).transpose()?;

    let updated = match db
        .update_user(user_id, &req.username, req.role, password_hash.as_deref())
        .await
    {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => return Err(username_taken()),
        Err(e) => return Err(e.into()),
    };
    if !updated {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let user = db
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(user.to_out()?)
}

/// Removes the account. Tickets it held go back to `new` and unassigned.
pub async fn delete_user(db: &Database, actor: &Identity, user_id: i64) -> Result<(), AppError> {
    authorize(actor, Operation::ManageUsers)?;

    let released = db
        .delete_user_releasing_tickets(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(
        "Deleted user {} by {}, released {} ticket(s)",
        user_id,
        actor.subject(),
        released
    );
    Ok(())
}

/// Username/password login.
pub async fn authenticate(
    db: &Database,
    tokens: &TokenIssuer,
    username: &str,
    password: &str,
) -> Result<TokenResponse, AppError> {
    let rejected = || AppError::Unauthorized("Incorrect username or password".to_string());

    let Some(user) = db.get_user_by_username(username).await? else {
        tracing::warn!("Login failed for unknown user {}", username);
        return Err(rejected());
    };

    if !verify_password(password, &user.password_hash) {
        tracing::warn!("Login failed for {}: bad password", username);
        return Err(rejected());
    }

    let token = tokens.access_token(&user.username, user.role()?)?;
    Ok(TokenResponse::bearer(token))
}

/// OAuth2 client-credentials grant for automation. Yields an admin token.
pub fn exchange_client_credentials(
    auth: &AuthConfig,
    tokens: &TokenIssuer,
    form: &ClientCredentialsForm,
) -> Result<TokenResponse, AppError> {
    if form.grant_type != "client_credentials" {
        return Err(AppError::BadRequest("unsupported_grant_type".to_string()));
    }
    if form.client_id != auth.oauth_client_id || form.client_secret != auth.oauth_client_secret {
        tracing::warn!("Rejected client credentials for {}", form.client_id);
        return Err(AppError::Unauthorized("invalid_client".to_string()));
    }

    let token = tokens.access_token(&form.client_id, Role::Admin)?;
    Ok(TokenResponse::bearer(token))
}

pub fn mint_view_token(tokens: &TokenIssuer, actor: &Identity) -> Result<TokenResponse, AppError> {
    authorize(actor, Operation::MintViewToken)?;
    let token = tokens.view_token(actor.subject())?;
    Ok(TokenResponse::bearer(token))
}

pub async fn current_user(db: &Database, actor: &Identity) -> Result<UserOut, AppError> {
    authorize(actor, Operation::WhoAmI)?;
    let user = db
        .get_user_by_username(actor.subject())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(user.to_out()?)
}

/// Deletes all tickets, clients and worker accounts. Admins are kept.
pub async fn reset_data(db: &Database, actor: &Identity) -> Result<(), AppError> {
    authorize(actor, Operation::ResetData)?;
    db.reset_all().await?;
    tracing::warn!("All tickets, clients and workers deleted by {}", actor.subject());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{IntakeOutcome, NewIntake};
    use shared::TicketStatus;

    fn admin() -> Identity {
        Identity::Admin { id: 1, username: "boss".into() }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig::default())
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let db = Database::in_memory().await;
        create_account(&db, &AuthConfig::default(), "wanda", "pw", Role::Worker).await.unwrap();
        let err = create_account(&db, &AuthConfig::default(), "wanda", "other", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_service_client_id_is_not_a_username() {
        let db = Database::in_memory().await;
        let auth = AuthConfig::default();
        let err = create_account(&db, &auth, "crm-client", "pw", Role::Worker)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let user = create_account(&db, &auth, "wanda", "pw", Role::Worker).await.unwrap();
        let rename = UserUpdate {
            username: "crm-client".into(),
            role: Role::Worker,
            password: None,
        };
        assert!(matches!(
            update_user(&db, &auth, &admin(), user.id, &rename).await,
            Err(AppError::Validation(_))
        ));
        assert!(db.get_user_by_username("crm-client").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_is_never_stored_in_plaintext() {
        let db = Database::in_memory().await;
        create_account(&db, &AuthConfig::default(), "wanda", "pw-123", Role::Worker).await.unwrap();
        let stored = db.get_user_by_username("wanda").await.unwrap().unwrap();
        assert!(!stored.password_hash.contains("pw-123"));
        assert!(stored.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let db = Database::in_memory().await;
        let tokens = issuer();
        create_account(&db, &AuthConfig::default(), "wanda", "pw", Role::Worker).await.unwrap();

        let ok = authenticate(&db, &tokens, "wanda", "pw").await.unwrap();
        assert_eq!(ok.token_type, "bearer");
        let claims = tokens.verify(&ok.access_token).unwrap();
        assert_eq!(claims.sub, "wanda");
        assert_eq!(claims.role, Role::Worker);

        for (user, pw) in [("wanda", "nope"), ("nobody", "pw")] {
            let err = authenticate(&db, &tokens, user, pw).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
    }

    #[tokio::test]
    async fn test_worker_cannot_manage_users() {
        let db = Database::in_memory().await;
        let worker = Identity::Worker { id: 5, username: "w".into() };
        let req = UserCreate {
            username: "x".into(),
            password: "y".into(),
            role: Role::Worker,
        };
        assert!(matches!(
            create_user(&db, &AuthConfig::default(), &worker, &req).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(list_users(&db, &worker).await, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let db = Database::in_memory().await;
        let req = UserUpdate {
            username: "x".into(),
            role: Role::Worker,
            password: None,
        };
        assert!(matches!(
            update_user(&db, &AuthConfig::default(), &admin(), 77, &req).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_changes_password_only_when_given() {
        let db = Database::in_memory().await;
        let tokens = issuer();
        let user = create_account(&db, &AuthConfig::default(), "wanda", "first", Role::Worker)
            .await
            .unwrap();

        let keep = UserUpdate {
            username: "wanda".into(),
            role: Role::Worker,
            password: Some(String::new()),
        };
        update_user(&db, &AuthConfig::default(), &admin(), user.id, &keep).await.unwrap();
        assert!(authenticate(&db, &tokens, "wanda", "first").await.is_ok());

        let change = UserUpdate {
            password: Some("second".into()),
            ..keep
        };
        update_user(&db, &AuthConfig::default(), &admin(), user.id, &change).await.unwrap();
        assert!(authenticate(&db, &tokens, "wanda", "first").await.is_err());
        assert!(authenticate(&db, &tokens, "wanda", "second").await.is_ok());
    }

    #[tokio::test]
    async fn test_deleting_worker_releases_tickets() {
        let db = Database::in_memory().await;
        let worker = create_account(&db, &AuthConfig::default(), "wanda", "pw", Role::Worker)
            .await
            .unwrap();

        let mut ids = Vec::new();
        for title in ["Leak", "Door", "Window"] {
            let intake = NewIntake {
                title,
                description: "d",
                client_name: "A",
                client_email: "a@x.com",
                client_phone: None,
                requester_ip: None,
                requester_ua: None,
            };
            let IntakeOutcome::Created(id) =
                db.create_ticket_with_client(&intake, Utc::now()).await.unwrap()
            else {
                panic!("expected a new ticket");
            };
            db.assign_ticket(id, worker.id, Utc::now()).await.unwrap();
            ids.push(id);
        }
        db.set_ticket_status(ids[0], TicketStatus::InProgress, Utc::now())
            .await
            .unwrap();
        db.set_ticket_status(ids[1], TicketStatus::Done, Utc::now())
            .await
            .unwrap();

        delete_user(&db, &admin(), worker.id).await.unwrap();

        let first = ids[0];
        for id in ids {
            let ticket = db.get_ticket(id).await.unwrap().unwrap();
            assert_eq!(ticket.worker_id, None);
            assert_eq!(ticket.status().unwrap(), TicketStatus::New);
        }
        let first = db.get_ticket(first).await.unwrap().unwrap();
        assert!(first.in_progress_at.is_some());

        assert!(matches!(
            delete_user(&db, &admin(), worker.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_client_credentials_grant() {
        let auth = AuthConfig::default();
        let tokens = TokenIssuer::new(&auth);
        let mut form = ClientCredentialsForm {
            grant_type: "client_credentials".into(),
            client_id: "crm-client".into(),
            client_secret: "crm-secret".into(),
        };

        let token = exchange_client_credentials(&auth, &tokens, &form).unwrap();
        assert_eq!(tokens.verify(&token.access_token).unwrap().role, Role::Admin);

        form.client_secret = "wrong".into();
        assert!(matches!(
            exchange_client_credentials(&auth, &tokens, &form),
            Err(AppError::Unauthorized(_))
        ));

        form.grant_type = "password".into();
        assert!(matches!(
            exchange_client_credentials(&auth, &tokens, &form),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_only_admins_mint_view_tokens() {
        let tokens = issuer();
        assert!(mint_view_token(&tokens, &admin()).is_ok());
        let worker = Identity::Worker { id: 2, username: "w".into() };
        assert!(matches!(
            mint_view_token(&tokens, &worker),
            Err(AppError::Forbidden(_))
        ));
    }
}
