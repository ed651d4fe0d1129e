use std::sync::Arc;

use chatjoin_bridge::BridgeClient;
use chatjoin_core::{config::Config, orchestrator::JoinOrchestrator};

#[tokio::main]
async fn main() -> Result<(), chatjoin_core::Error> {
    chatjoin_core::logging::init("chatjoin")?;

    let cfg = Arc::new(Config::load()?);

    let bridge = BridgeClient::new(
        cfg.bridge_url.clone(),
        cfg.bridge_token.clone(),
        cfg.bridge_timeout,
    )?;
    let orchestrator = JoinOrchestrator::new(Arc::new(bridge), cfg.chats_file.clone());

    chatjoin_telegram::router::run_polling(cfg, orchestrator)
        .await
        .map_err(|e| chatjoin_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
