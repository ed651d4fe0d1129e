//! Formatting utilities (Telegram HTML report strings).

use std::time::Duration;

use crate::events::JoinEvent;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn escaped_width(c: char) -> usize {
    match c {
        '&' => 5,
        '<' | '>' => 4,
        '"' => 6,
        _ => 1,
    }
}

/// Longest prefix of `text` (plus `...` when cut) whose escaped form fits in
/// `budget` characters. Clip before escaping so no entity or tag is split.
pub fn clip_for_html(text: &str, budget: usize) -> String {
    if text.chars().map(escaped_width).sum::<usize>() <= budget {
        return text.to_string();
    }
    let budget = budget.saturating_sub(3);
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        used += escaped_width(c);
        if used > budget {
            break;
        }
        out.push(c);
    }
    out.push_str("...");
    out
}

/// Human readable duration: `45s`, `2m 5s`, `1h 0m 3s`.
pub fn format_duration(d: Duration) -> String {
    let seconds = d.as_secs();
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

/// Render an event within `max_chars`, shortening its free text (raw lines,
/// error descriptions, paths) instead of cutting the finished markup.
pub fn render_event_within(event: &JoinEvent, max_chars: usize) -> String {
    let html = render_event(event);
    if html.chars().count() <= max_chars {
        return html;
    }
    let overhead = render_event(&event.map_free_text(|_| String::new()))
        .chars()
        .count();
    let budget = max_chars.saturating_sub(overhead);
    render_event(&event.map_free_text(|text| clip_for_html(text, budget)))
}

/// Render one join event as a Telegram HTML message.
pub fn render_event(event: &JoinEvent) -> String {
    match event {
        JoinEvent::Started {
            session,
            total,
            limit,
            min_interval,
            max_interval,
        } => {
            let pacing = if min_interval == max_interval {
                format_duration(*min_interval)
            } else {
                format!(
                    "{}–{}",
                    format_duration(*min_interval),
                    format_duration(*max_interval)
                )
            };
            format!(
                "🚀 <b>Joining chats...</b>\nSession {session}: {total} lines, limit {limit}, interval {pacing}"
            )
        }
        JoinEvent::Joined { handle } => {
            format!("✅ <b>Joined:</b> <code>{}</code>", escape_html(handle.as_str()))
        }
        JoinEvent::Progress {
            index,
            total,
            percent,
        } => format!("📊 Progress: {index}/{total} ({percent}%)"),
        JoinEvent::Already { handle } => format!(
            "☑️ <b>Already a member:</b> <code>{}</code>",
            escape_html(handle.as_str())
        ),
        JoinEvent::NoPublicHandle { raw } => format!(
            "⚪ <b>No public handle, skipped:</b> <code>{}</code>",
            escape_html(raw)
        ),
        JoinEvent::Failed {
            handle,
            description,
        } => format!(
            "❌ <b>Failed to join</b> <code>{}</code>: {}",
            escape_html(handle.as_str()),
            escape_html(description)
        ),
        JoinEvent::FloodWait { handle, wait } => format!(
            "⏳ <b>Rate limited</b> on <code>{}</code>, waiting {}",
            escape_html(handle.as_str()),
            format_duration(*wait)
        ),
        JoinEvent::LimitReached { limit } => {
            format!("🛑 Join limit reached ({limit}).")
        }
        JoinEvent::Done { joined } => {
            format!("🏁 <b>Joining finished.</b> Joined {joined} chat(s).")
        }
        JoinEvent::Stopped { joined } => {
            format!("⏹ <b>Joining stopped.</b> Joined {joined} chat(s).")
        }
        JoinEvent::StopRequested => "⏹ Stop requested, finishing current step...".to_string(),
        JoinEvent::NotRunning => "⚪ Joining is not running.".to_string(),
        JoinEvent::AlreadyRunning => {
            "⏳ Joining is already running. Use /stopjoin first.".to_string()
        }
        JoinEvent::FileNotFound { path } => format!(
            "❌ <b>File not found:</b> <code>{}</code>",
            escape_html(&path.display().to_string())
        ),
        JoinEvent::Aborted {
            joined,
            description,
        } => format!(
            "❌ <b>Joining aborted:</b> {}\nJoined {joined} chat(s).",
            escape_html(description)
        ),
        JoinEvent::MembershipUnavailable { description } => format!(
            "❌ <b>Could not list current chats:</b> {}",
            escape_html(description)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatHandle, SessionId};

    #[test]
    fn escapes_raw_lines() {
        let html = render_event(&JoinEvent::NoPublicHandle {
            raw: "<b>x</b> & y".to_string(),
        });
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt; &amp; y"));
    }

    #[test]
    fn long_raw_lines_keep_markup_and_entities_intact() {
        let html = render_event_within(
            &JoinEvent::NoPublicHandle {
                raw: "a&b".repeat(2000),
            },
            4096,
        );

        assert!(html.chars().count() <= 4096);
        assert!(html.ends_with("...</code>"));
        assert!(html
            .match_indices('&')
            .all(|(i, _)| html[i..].starts_with("&amp;")));
    }

    #[test]
    fn short_reports_are_rendered_unchanged() {
        let event = JoinEvent::NoPublicHandle {
            raw: "plain line".to_string(),
        };
        assert_eq!(render_event_within(&event, 4096), render_event(&event));
    }

    #[test]
    fn clipping_counts_escaped_width() {
        assert_eq!(clip_for_html("abc", 3), "abc");
        assert_eq!(clip_for_html("<<<<<<", 12), "<<...");
        assert_eq!(clip_for_html("ééééé", 4), "é...");
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3603)), "1h 0m 3s");
    }

    #[test]
    fn start_report_collapses_fixed_interval() {
        let fixed = render_event(&JoinEvent::Started {
            session: SessionId(1),
            total: 3,
            limit: 10,
            min_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(30),
        });
        assert!(fixed.contains("interval 30s"));

        let ranged = render_event(&JoinEvent::Started {
            session: SessionId(1),
            total: 3,
            limit: 10,
            min_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(60),
        });
        assert!(ranged.contains("30s–1m 0s"));
    }

    #[test]
    fn flood_wait_mentions_handle_and_wait() {
        let html = render_event(&JoinEvent::FloodWait {
            handle: ChatHandle::from_username("some_chat"),
            wait: Duration::from_secs(90),
        });
        assert!(html.contains("@some_chat"));
        assert!(html.contains("1m 30s"));
    }
}
