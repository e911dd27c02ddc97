use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::Role;

use super::{Database, User};

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";

impl Database {
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// The user with this id, only if it has the worker role.
    pub async fn get_worker(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND role = 'worker'"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Returns false when no such user exists. Moving a worker to another
    /// role releases their tickets, since only workers may hold tickets.
    pub async fn update_user(
        &self,
        id: i64,
        username: &str,
        role: Role,
        password_hash: Option<&str>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, role = ?, password_hash = COALESCE(?, password_hash)
            WHERE id = ?
            "#,
        )
        .bind(username)
        .bind(role.as_str())
        .bind(password_hash)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if role != Role::Worker {
            sqlx::query("UPDATE tickets SET worker_id = NULL, status = 'new' WHERE worker_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Releases every ticket held by the user back to the `new` queue, then
    /// removes the account. Returns the number of released tickets, or
    /// `None` when the user did not exist.
    pub async fn delete_user_releasing_tickets(&self, id: i64) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query("UPDATE tickets SET worker_id = NULL, status = 'new' WHERE worker_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(released))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_unique_violation;

    #[tokio::test]
    async fn test_username_is_unique() {
        let db = Database::in_memory().await;
        db.create_user("alice", "h", Role::Admin, Utc::now()).await.unwrap();

        let err = db
            .create_user("alice", "h2", Role::Worker, Utc::now())
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_get_worker_filters_by_role() {
        let db = Database::in_memory().await;
        let admin = db.create_user("boss", "h", Role::Admin, Utc::now()).await.unwrap();
        let worker = db.create_user("wanda", "h", Role::Worker, Utc::now()).await.unwrap();

        assert!(db.get_worker(admin).await.unwrap().is_none());
        assert_eq!(db.get_worker(worker).await.unwrap().unwrap().username, "wanda");
    }

    #[tokio::test]
    async fn test_update_keeps_password_when_absent() {
        let db = Database::in_memory().await;
        let id = db.create_user("w", "original", Role::Worker, Utc::now()).await.unwrap();

        assert!(db.update_user(id, "w2", Role::Admin, None).await.unwrap());
        let user = db.get_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.username, "w2");
        assert_eq!(user.role().unwrap(), Role::Admin);
        assert_eq!(user.password_hash, "original");

        assert!(!db.update_user(999, "ghost", Role::Worker, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_promoting_a_worker_releases_tickets() {
        let db = Database::in_memory().await;
        let id = db.create_user("w", "h", Role::Worker, Utc::now()).await.unwrap();
        let intake = crate::db::NewIntake {
            title: "Leak",
            description: "Kitchen sink",
            client_name: "A",
            client_email: "a@x.com",
            client_phone: None,
            requester_ip: None,
            requester_ua: None,
        };
        let crate::db::IntakeOutcome::Created(ticket) =
            db.create_ticket_with_client(&intake, Utc::now()).await.unwrap()
        else {
            panic!("expected a new ticket");
        };
        db.assign_ticket(ticket, id, Utc::now()).await.unwrap();

        db.update_user(id, "w", Role::Worker, None).await.unwrap();
        assert_eq!(db.get_ticket(ticket).await.unwrap().unwrap().worker_id, Some(id));

        db.update_user(id, "w", Role::Admin, None).await.unwrap();
        assert_eq!(db.get_ticket(ticket).await.unwrap().unwrap().worker_id, None);
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_none() {
        let db = Database::in_memory().await;
        assert_eq!(db.delete_user_releasing_tickets(42).await.unwrap(), None);
    }
}
