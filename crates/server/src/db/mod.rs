use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;

mod models;
mod tickets;
mod users;

pub use models::*;
pub use tickets::{IntakeOutcome, NewIntake, TicketFilter};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");

        if !in_memory {
            // Ensure the directory exists
            if let Some(parent) = file_path(url).and_then(|p| Path::new(p).parent()) {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database, so keep exactly
        // one alive for the lifetime of the pool.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('admin', 'worker')),
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS ix_users_role ON users(role)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS ix_clients_email ON clients(email)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                title_folded TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'new'
                    CHECK (status IN ('new', 'in_progress', 'done')),
                client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                worker_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                viewed BOOLEAN NOT NULL DEFAULT 0,
                assigned_at DATETIME,
                in_progress_at DATETIME,
                done_at DATETIME,
                requester_ip TEXT,
                requester_ua TEXT,
                CONSTRAINT uq_ticket_client_content UNIQUE (title, description, client_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        self.add_folded_titles().await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS ix_tickets_title ON tickets(title)",
            "CREATE INDEX IF NOT EXISTS ix_tickets_title_folded ON tickets(title_folded)",
            "CREATE INDEX IF NOT EXISTS ix_tickets_status ON tickets(status)",
            "CREATE INDEX IF NOT EXISTS ix_tickets_created_at ON tickets(created_at)",
            "CREATE INDEX IF NOT EXISTS ix_tickets_viewed ON tickets(viewed)",
            "CREATE INDEX IF NOT EXISTS ix_tickets_worker ON tickets(worker_id)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Databases created before title search folded Unicode lack the
    /// `title_folded` column. Add it and fill it from the titles.
    async fn add_folded_titles(&self) -> Result<()> {
        let present: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('tickets') WHERE name = 'title_folded'",
        )
        .fetch_one(&self.pool)
        .await?;
        if present > 0 {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("ALTER TABLE tickets ADD COLUMN title_folded TEXT NOT NULL DEFAULT ''")
            .execute(&mut *tx)
            .await?;

        let titles: Vec<(i64, String)> = sqlx::query_as("SELECT id, title FROM tickets")
            .fetch_all(&mut *tx)
            .await?;
        for (id, title) in &titles {
            sqlx::query("UPDATE tickets SET title_folded = ? WHERE id = ?")
                .bind(fold_case(title))
                .bind(*id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!("Added folded titles to {} ticket(s)", titles.len());
        Ok(())
    }

    /// Wipes tickets, clients and worker accounts. Admin accounts survive.
    pub async fn reset_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tickets").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM clients").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM users WHERE role = 'worker'")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Fresh migrated in-memory database.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let db = Self::connect("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }
}

/// Case folding used for title search. SQLite's `LIKE` only folds ASCII.
pub(crate) fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Filesystem path of a `sqlite:` URL, without the query string.
fn file_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty()).then_some(path)
}
