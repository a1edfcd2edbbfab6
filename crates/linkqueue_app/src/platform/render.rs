use chrono::{DateTime, Utc};
use linkqueue_core::{AppViewModel, ItemRowView, ItemStatus, StatusKind};

/// Renders the view model as a block of plain text for the terminal.
pub fn render(view: &AppViewModel, now: DateTime<Utc>) -> String {
    let mut out = Vec::new();
    out.push(header(view, now));
    if view.queue_expanded {
        out.extend(view.rows.iter().map(render_row));
    } else {
        out.extend(view.rows.iter().filter(|row| row.is_current).map(render_row));
        let folded = view.rows.iter().filter(|row| !row.is_current).count();
        if folded > 0 {
            out.push(format!("  ({folded} more items, type `list` to show them)"));
        }
    }
    if view.staged_lines > 0 {
        out.push(format!("  ({} URL lines staged, type `start`)", view.staged_lines));
    }
    out.push(status_line(view));
    out.join("\n")
}

fn header(view: &AppViewModel, now: DateTime<Utc>) -> String {
    let (current, total) = view.progress;
    let mut parts = vec![if view.running {
        format!("queue running {}/{}", (current + 1).min(total), total)
    } else {
        format!("queue idle, {total} items")
    }];
    if let Some(end) = view.break_until.filter(|end| *end > now) {
        parts.push(format!("break {}", countdown(end - now)));
    }
    if view.single_page_running {
        parts.push("single page running".to_string());
    }
    parts.push(format!("{} records", view.total_extracted));
    if !view.show_notifications {
        parts.push("notifications off".to_string());
    }
    format!("== {} ==", parts.join(" | "))
}

fn render_row(row: &ItemRowView) -> String {
    let marker = if row.is_current { '>' } else { ' ' };
    let status = match row.status {
        ItemStatus::Pending => "pending",
        ItemStatus::Processing => "working",
        ItemStatus::Completed => "done",
        ItemStatus::Failed => "failed",
    };
    let mut line = format!("{marker}{:>3}. [{status:<7}] {}", row.index + 1, row.name);
    if row.profiles_found > 0 {
        line.push_str(&format!(" ({} profiles)", row.profiles_found));
    }
    if let Some(error) = &row.error {
        line.push_str(&format!(" - {error}"));
    }
    line
}

fn status_line(view: &AppViewModel) -> String {
    let tag = match view.status_line.kind {
        StatusKind::Ready => "ok",
        StatusKind::Working => "..",
        StatusKind::Error => "!!",
    };
    format!("[{tag}] {}", view.status_line.text)
}

fn countdown(left: chrono::Duration) -> String {
    let secs = left.num_seconds().max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}
