use std::sync::Arc;

use chrono::Utc;
use teloxide::prelude::*;

use chatjoin_core::{
    command::{parse_join_args, JOIN_USAGE},
    domain::ChatId,
    events::{MessengerSink, ReplySink},
    formatting::{clip_for_html, escape_html, format_duration},
    orchestrator::{SessionPhase, SessionSnapshot},
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Characters reserved for the fixed markup around user supplied text.
const REPLY_MARKUP_HEADROOM: usize = 600;

/// Escape user supplied text for a reply, clipped so the whole reply stays
/// within `safe_limit` characters.
fn escape_clipped(text: &str, safe_limit: usize) -> String {
    escape_html(&clip_for_html(
        text,
        safe_limit.saturating_sub(REPLY_MARKUP_HEADROOM),
    ))
}

fn unknown_command_html(cmd: &str, safe_limit: usize) -> String {
    format!("Unknown command: /{}", escape_clipped(cmd, safe_limit))
}

fn help_html(state: &AppState) -> String {
    let d = state.cfg.join_defaults;
    let file = escape_clipped(
        &state.orchestrator.chats_file().display().to_string(),
        state.cfg.telegram_safe_limit,
    );
    format!(
        "🤖 <b>Chat Join Bot</b>\n\n\
Chats file: <code>{file}</code>\n\n\
<b>📋 Commands:</b>\n\
/joinchats [min] [max] [limit] - Join chats from the file\n\
/joinchats [interval] [limit] - Same, fixed interval\n\
/stopjoin - Stop the running session\n\
/joinstatus - Show session progress\n\
/help - Show this message\n\n\
Defaults: {}–{} between joins, {} joins per run.",
        format_duration(d.min_interval),
        format_duration(d.max_interval),
        d.limit
    )
}

fn status_html(snapshot: Option<&SessionSnapshot>) -> String {
    let Some(s) = snapshot else {
        return "⚪ Joining is not running.".to_string();
    };

    let phase = match s.phase {
        SessionPhase::Running => "🔄 Running",
        SessionPhase::Stopping => "⏹ Stopping",
    };
    let elapsed = (Utc::now() - s.started_at).to_std().unwrap_or_default();
    let p = s.progress;

    [
        format!("📊 <b>Join session {}</b>", s.id),
        format!("{phase} for {}", format_duration(elapsed)),
        format!("Line: {}/{}", p.index, p.total),
        format!("Joined: {}/{}", p.joined, p.limit),
    ]
    .join("\n")
}

pub async fn handle_command(
    chat_id: i64,
    text: &str,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let (cmd, arg) = parse_command(text);
    let sink: Arc<dyn ReplySink> =
        Arc::new(MessengerSink::new(state.messenger.clone(), ChatId(chat_id)));

    match cmd.as_str() {
        "start" | "help" => {
            send_html(&state, chat_id, &help_html(&state)).await;
            Ok(())
        }

        "joinchats" => {
            let settings = match parse_join_args(&arg, &state.cfg.join_defaults) {
                Ok(s) => s,
                Err(e) => {
                    let body = format!(
                        "❌ {}\nUsage: <code>{}</code>",
                        escape_clipped(&e.to_string(), state.cfg.telegram_safe_limit),
                        escape_html(JOIN_USAGE)
                    );
                    send_html(&state, chat_id, &body).await;
                    return Ok(());
                }
            };
            let outcome = state.orchestrator.start(settings, sink).await;
            tracing::debug!(chat_id, ?outcome, "joinchats handled");
            Ok(())
        }

        "stopjoin" => {
            state.orchestrator.stop(sink.as_ref()).await;
            Ok(())
        }

        "joinstatus" => {
            let snapshot = state.orchestrator.status().await;
            send_html(&state, chat_id, &status_html(snapshot.as_ref())).await;
            Ok(())
        }

        _ => {
            let msg = unknown_command_html(&cmd, state.cfg.telegram_safe_limit);
            send_html(&state, chat_id, &msg).await;
            Ok(())
        }
    }
}

async fn send_html(state: &AppState, chat_id: i64, html: &str) {
    if let Err(e) = state.messenger.send_html(ChatId(chat_id), html).await {
        tracing::warn!(chat_id, error = %e, "failed to send reply");
    }
}
