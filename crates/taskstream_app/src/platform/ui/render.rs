//! Text rendering of view snapshots: each new snapshot prints only what changed.
use taskstream_core::{
    AppViewModel, BrowserStatus, DataExport, FollowMode, LogLevel, Message, ResearchView, Sender,
};

pub(crate) fn render_changes(previous: &AppViewModel, current: &AppViewModel) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.connection != current.connection {
        lines.push(format!("* connection {}", current.connection));
    }

    if previous.active_conversation != current.active_conversation
        || current.messages.len() < previous.messages.len()
    {
        if let Some(row) = current.conversations.iter().find(|row| row.active) {
            lines.push(format!("== {} [{}] ==", row.title, row.id));
        }
        lines.extend(current.messages.iter().map(format_message));
    } else {
        lines.extend(
            current.messages[previous.messages.len()..]
                .iter()
                .map(format_message),
        );
    }

    if current.thinking && !previous.thinking {
        lines.push("  ... thinking".to_string());
    }

    if previous.browser != current.browser {
        lines.push(format_browser(&current.browser));
    }

    if previous.research != current.research && !current.research.categories.is_empty() {
        lines.push(format_research(&current.research));
    }

    if current.logs.mode == FollowMode::Follow {
        let last_seen = previous.logs.entries.last().map(|entry| entry.id);
        lines.extend(
            current
                .logs
                .entries
                .iter()
                .filter(|entry| last_seen.is_none_or(|seen| entry.id > seen))
                .map(|entry| format!("  log {} {}", level_label(entry.level), entry.message)),
        );
    }

    if previous.export != current.export && current.export.available {
        lines.push(format_export(&current.export));
    }

    lines
}

pub(crate) fn render_conversation_list(view: &AppViewModel) -> Vec<String> {
    if view.conversations.is_empty() {
        return vec!["(no conversations)".to_string()];
    }
    view.conversations
        .iter()
        .map(|row| {
            let marker = if row.active { '*' } else { ' ' };
            format!(
                "{marker} {} {} ({} messages)",
                row.id, row.title, row.message_count
            )
        })
        .collect()
}

fn format_message(message: &Message) -> String {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "agent",
        Sender::System => "system",
    };
    format!(
        "[{}] {who}: {}",
        message.timestamp.format("%H:%M:%S"),
        message.content
    )
}

fn format_browser(browser: &BrowserStatus) -> String {
    let mut parts = Vec::new();
    if let Some(url) = &browser.current_url {
        parts.push(url.clone());
    }
    if let Some(action) = &browser.current_action {
        parts.push(action.clone());
    }
    if browser.is_loading == Some(true) {
        parts.push("loading".to_string());
    }
    if browser.browser_ready == Some(false) {
        parts.push("not ready".to_string());
    }
    if parts.is_empty() {
        "* browser idle".to_string()
    } else {
        format!("* browser {}", parts.join(" | "))
    }
}

fn format_research(research: &ResearchView) -> String {
    let summary = &research.summary;
    format!(
        "* research {}% ({} done, {} failed, {} running, {} pending)",
        research.percent, summary.completed, summary.failed, summary.in_progress, summary.pending
    )
}

fn format_export(export: &DataExport) -> String {
    let name = export.filename.as_deref().unwrap_or("export");
    match export.item_count {
        Some(count) => format!("* export ready: {name} ({count} items)"),
        None => format!("* export ready: {name}"),
    }
}

fn level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "DEBUG",
        LogLevel::Info => "INFO ",
        LogLevel::Warn => "WARN ",
        LogLevel::Error => "ERROR",
    }
}
