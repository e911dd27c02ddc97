use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::TicketStatus;
use sqlx::{QueryBuilder, Sqlite};

use super::{fold_case, Database, TicketRecord};

const TICKET_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.status, t.viewed,
           t.created_at, t.updated_at, t.assigned_at, t.in_progress_at, t.done_at,
           t.requester_ip, t.requester_ua,
           c.id AS client_id, c.name AS client_name, c.email AS client_email,
           c.phone AS client_phone, c.created_at AS client_created_at,
           t.worker_id, w.username AS worker_username, w.role AS worker_role,
           w.created_at AS worker_created_at
    FROM tickets t
    JOIN clients c ON c.id = t.client_id
    LEFT JOIN users w ON w.id = t.worker_id
"#;

/// Row-level filters for ticket listing. All present filters must match.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    pub status: Option<TicketStatus>,
    pub worker_id: Option<i64>,
}

impl TicketFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(search) = &self.search {
            qb.push(" AND t.title_folded LIKE ")
                .push_bind(format!("%{}%", escape_like(&fold_case(search))))
                .push(" ESCAPE '\\'");
        }
        if let Some(status) = self.status {
            qb.push(" AND t.status = ").push_bind(status.as_str());
        }
        if let Some(worker_id) = self.worker_id {
            qb.push(" AND t.worker_id = ").push_bind(worker_id);
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Everything captured from one intake submission.
#[derive(Debug, Clone)]
pub struct NewIntake<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub client_name: &'a str,
    pub client_email: &'a str,
    pub client_phone: Option<&'a str>,
    pub requester_ip: Option<&'a str>,
    pub requester_ua: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    Created(i64),
    Duplicate,
}

impl Database {
    /// Id of an existing ticket with the same content from a client with the
    /// same email.
    pub async fn find_duplicate_ticket(
        &self,
        title: &str,
        description: &str,
        email: &str,
    ) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT t.id FROM tickets t
            JOIN clients c ON c.id = t.client_id
            WHERE t.title = ? AND t.description = ? AND c.email = ?
            LIMIT 1
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Creates the client and its ticket in one transaction. The ticket
    /// insert re-checks for a duplicate inside the write transaction, and a
    /// unique-constraint hit is reported as a duplicate as well.
    pub async fn create_ticket_with_client(
        &self,
        intake: &NewIntake<'_>,
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome> {
        let mut tx = self.pool.begin().await?;

        let client_id = sqlx::query(
            "INSERT INTO clients (name, email, phone, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(intake.client_name)
        .bind(intake.client_email)
        .bind(intake.client_phone)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let inserted = sqlx::query(
            r#"
            INSERT INTO tickets
                (title, title_folded, description, status, client_id, created_at,
                 updated_at, viewed, requester_ip, requester_ua)
            SELECT ?, ?, ?, 'new', ?, ?, ?, 0, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM tickets t
                JOIN clients c ON c.id = t.client_id
                WHERE t.title = ? AND t.description = ? AND c.email = ?
            )
            "#,
        )
        .bind(intake.title)
        .bind(fold_case(intake.title))
        .bind(intake.description)
        .bind(client_id)
        .bind(now)
        .bind(now)
        .bind(intake.requester_ip)
        .bind(intake.requester_ua)
        .bind(intake.title)
        .bind(intake.description)
        .bind(intake.client_email)
        .execute(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(result) if result.rows_affected() == 1 => result,
            Ok(_) => {
                tx.rollback().await?;
                return Ok(IntakeOutcome::Duplicate);
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                return Ok(IntakeOutcome::Duplicate);
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(IntakeOutcome::Created(inserted.last_insert_rowid()))
    }

    pub async fn get_ticket(&self, id: i64) -> Result<Option<TicketRecord>> {
        let ticket = sqlx::query_as::<_, TicketRecord>(&format!("{TICKET_SELECT} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    /// One page of tickets, newest first, plus the total number of matches.
    pub async fn list_tickets(
        &self,
        filter: &TicketFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketRecord>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tickets t");
        filter.push_where(&mut count);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(TICKET_SELECT);
        filter.push_where(&mut select);
        select
            .push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let items = select
            .build_query_as::<TicketRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }

    pub async fn set_ticket_viewed(&self, id: i64, viewed: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE tickets SET viewed = ? WHERE id = ?")
            .bind(viewed)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Assignment always refreshes `assigned_at`.
    pub async fn assign_ticket(&self, id: i64, worker_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tickets SET worker_id = ?, updated_at = ?, assigned_at = ? WHERE id = ?",
        )
        .bind(worker_id)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Moves the ticket to `status`. The entry stamp of that state is only
    /// written the first time; no stamp is ever cleared.
    pub async fn set_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = ?1,
                updated_at = ?2,
                in_progress_at = CASE WHEN ?1 = 'in_progress'
                    THEN COALESCE(in_progress_at, ?2) ELSE in_progress_at END,
                done_at = CASE WHEN ?1 = 'done'
                    THEN COALESCE(done_at, ?2) ELSE done_at END
            WHERE id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_worker_tickets(&self, worker_id: i64, status: TicketStatus) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tickets WHERE worker_id = ? AND status = ?",
        )
        .bind(worker_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
