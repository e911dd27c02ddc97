//! Plain-text rendering of API responses.

use chrono::{DateTime, Local, Utc};
use shared::{TicketOut, TicketStatus, TicketsPage, UserOut};

fn stamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn status_color(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::New => "\x1b[36m",
        TicketStatus::InProgress => "\x1b[33m",
        TicketStatus::Done => "\x1b[32m",
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// One table row: id, status, unread marker, worker, title.
pub fn ticket_row(ticket: &TicketOut) -> String {
    let worker = ticket
        .worker
        .as_ref()
        .map(|w| w.username.as_str())
        .unwrap_or("-");
    let unread = if ticket.viewed { ' ' } else { '*' };
    format!(
        "{:>5} {}{:<11}\x1b[0m {} {:<12} {}",
        ticket.id,
        status_color(ticket.status),
        ticket.status.as_str(),
        unread,
        clip(worker, 12),
        clip(&ticket.title, 60)
    )
}

pub fn ticket_page(page: &TicketsPage) -> String {
    let mut out = String::new();
    for ticket in &page.items {
        out.push_str(&ticket_row(ticket));
        out.push('\n');
    }
    let pages = (page.total + page.size as i64 - 1) / (page.size as i64).max(1);
    out.push_str(&format!(
        "\x1b[90mpage {}/{} · {} ticket(s)\x1b[0m",
        page.page,
        pages.max(1),
        page.total
    ));
    out
}

pub fn ticket_detail(ticket: &TicketOut) -> String {
    let client = &ticket.client;
    let lines = [
        format!("\x1b[1m#{} {}\x1b[0m", ticket.id, ticket.title),
        format!(
            "Status:      {}{}\x1b[0m{}",
            status_color(ticket.status),
            ticket.status,
            if ticket.viewed { "" } else { " (unread)" }
        ),
        format!(
            "Client:      {} <{}>{}",
            client.name,
            client.email,
            client.phone.as_deref().map(|p| format!(" {p}")).unwrap_or_default()
        ),
        format!(
            "Worker:      {}",
            ticket.worker.as_ref().map(|w| w.username.as_str()).unwrap_or("-")
        ),
        format!("Created:     {}", stamp(Some(ticket.created_at))),
        format!("Updated:     {}", stamp(Some(ticket.updated_at))),
        format!("Assigned:    {}", stamp(ticket.assigned_at)),
        format!("In progress: {}", stamp(ticket.in_progress_at)),
        format!("Done:        {}", stamp(ticket.done_at)),
        String::new(),
        ticket.description.clone(),
    ];
    lines.join("\n")
}

pub fn user_row(user: &UserOut) -> String {
    format!("{:>5} {:<8} {}", user.id, user.role.as_str(), user.username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ClientOut, Role};

    fn ticket(viewed: bool) -> TicketOut {
        let now = Utc::now();
        TicketOut {
            id: 7,
            title: "Leak".into(),
            description: "Kitchen sink".into(),
            status: TicketStatus::InProgress,
            viewed,
            client: ClientOut {
                id: 1,
                name: "A".into(),
                email: "a@x.com".into(),
                phone: None,
                created_at: now,
            },
            worker: Some(UserOut {
                id: 2,
                username: "wanda".into(),
                role: Role::Worker,
                created_at: now,
            }),
            created_at: now,
            updated_at: now,
            assigned_at: Some(now),
            in_progress_at: Some(now),
            done_at: None,
            requester_ip: None,
            requester_ua: None,
        }
    }

    #[test]
    fn test_ticket_row_marks_unread() {
        let row = ticket_row(&ticket(false));
        assert!(row.contains("in_progress"));
        assert!(row.contains(" * wanda"));
        assert!(ticket_row(&ticket(true)).contains("   wanda"));
    }

    #[test]
    fn test_page_footer() {
        let page = TicketsPage {
            items: vec![ticket(true)],
            total: 21,
            page: 3,
            size: 10,
        };
        assert!(ticket_page(&page).ends_with("page 3/3 · 21 ticket(s)\x1b[0m"));
    }

    #[test]
    fn test_detail_shows_missing_stamps_as_dash() {
        let detail = ticket_detail(&ticket(false));
        assert!(detail.contains("Done:        -"));
        assert!(detail.contains("(unread)"));
        assert!(detail.ends_with("Kitchen sink"));
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefgh", 4), "abc…");
    }
}
