//! Telegram update handlers.
//!
//! Every message is checked against the allow-list; commands are routed to the
//! join orchestrator, anything else gets a short hint.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use chatjoin_core::domain::UserId;
use chatjoin_core::security::is_authorized;

use crate::router::AppState;

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| u.id.0);

    if !is_authorized(
        user_id.map(|id| UserId(id as i64)),
        &state.cfg.telegram_allowed_users,
    ) {
        tracing::warn!(user_id = ?user_id, chat_id = msg.chat.id.0, "unauthorized message");
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(msg.chat.id.0, text, state).await;
        }
    }

    let _ = bot
        .send_message(msg.chat.id, "Send /help to see the available commands.")
        .await;

    Ok(())
}
