use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use chatjoin_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use chatjoin_core::{
    config::Config, messaging::port::MessagingPort, orchestrator::JoinOrchestrator,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub orchestrator: JoinOrchestrator,
    pub messenger: Arc<dyn MessagingPort>,
}

pub async fn run_polling(cfg: Arc<Config>, orchestrator: JoinOrchestrator) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(bot = %me.username(), "chatjoin started");
    }
    info!(
        chats_file = %orchestrator.chats_file().display(),
        allowed_users = cfg.telegram_allowed_users.len(),
        "ready"
    );

    // Progress reports can burst (joined + progress per candidate); keep them under
    // Telegram's per-chat limits. The adapter still retries once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState {
        cfg,
        orchestrator,
        messenger,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
