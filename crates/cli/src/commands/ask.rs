//! `recallchat ask` — Run one turn through the same pipeline the gateway uses.

use recallchat_agent::ReplyKind;
use recallchat_config::AppConfig;
use recallchat_memory::SessionStore;

pub async fn run(message: &str, session: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let orchestrator = recallchat_gateway::build_orchestrator(&config)
        .await
        .map_err(|e| format!("Failed to start pipeline: {e}"))?;
    let sessions = SessionStore::new(config.memory.max_sessions, config.memory.max_log_turns);
    let log = sessions.get_or_create(session).await;

    let reply = orchestrator.handle(&log, message).await?;

    println!("{}", reply.reply);
    if reply.kind == ReplyKind::Answered {
        tracing::debug!(
            passages = reply.passages.len(),
            history_turns = reply.history_turns,
            "Answered"
        );
    }

    Ok(())
}
