//! Notification texts. Markdown: `*bold*` and `` `code` ``.

use chrono::{DateTime, TimeZone};
use common::{PlaytimeTable, Roster, Timestamp, format_roster};

use crate::status_provider::QueryMethod;

pub fn join_message(player: &str, roster: &Roster) -> String {
    format!(
        "👤 Player {} *joined the server.*\n{}",
        escape_markdown(player),
        online_line(roster)
    )
}

pub fn leave_message(player: &str, roster: &Roster) -> String {
    format!(
        "🚪 Player {} *left the server.*\n{}",
        escape_markdown(player),
        online_line(roster)
    )
}

fn online_line(roster: &Roster) -> String {
    format!("📊 Online now: {}: {}", roster.len(), markdown_roster(roster))
}

/// Backslash-escapes the legacy Markdown markers. Escapes are only valid
/// outside entities, so names are never placed inside bold or code.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn markdown_roster(roster: &Roster) -> String {
    if roster.is_empty() {
        return format_roster(roster);
    }
    roster
        .iter()
        .map(|name| escape_markdown(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Server, method and roster, then the running playtime of everyone online.
pub fn summary_message(
    address: &str,
    method: QueryMethod,
    roster: &Roster,
    playtime: &PlaytimeTable,
    now: Timestamp,
) -> String {
    let mut text = format!(
        "*Server:* `{address}`\n*Method:* {method}\n*Players now:* {}",
        markdown_roster(roster)
    );
    for name in roster {
        if let Some(record) = playtime.get(name) {
            text.push_str(&format!(
                "\n⏱ {}: {}",
                escape_markdown(name),
                format_duration(record.live_seconds(now))
            ));
        }
    }
    text
}

pub fn session_footer<Tz>(finished_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "--------------\n🕒 Check finished: {}\n--------------",
        finished_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// `{h}h {mm}m`, or `{m}m` under an hour.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}
