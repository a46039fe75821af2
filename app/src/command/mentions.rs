use templar_config::{Config, Purpose};
use templar_conversation::ConversationRegistry;
use templar_webhook::x::process_mentions;

use super::{build_provider, build_x_client};

/// Input for the mentions command.
#[derive(Debug, Clone)]
pub struct MentionsInput {
    /// Only mentions newer than this post id
    pub since_id: Option<String>,
}

/// Strategy for answering X mentions once from the terminal.
///
/// Prints the cursor to pass as `--since-id` next time.
#[derive(Debug, Clone, Copy)]
pub struct MentionsStrategy;

impl super::CommandStrategy for MentionsStrategy {
    type Input = MentionsInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        config.validate(Purpose::Chat)?;

        let provider = build_provider(&config)?;
        let x = build_x_client(&config)?;

        let defaults = &config.agents.defaults;
        let registry = ConversationRegistry::new(
            provider,
            defaults.responder_config(),
            defaults.history_scope,
        )?;

        let run = process_mentions(&registry, &x, input.since_id.as_deref()).await?;

        println!(
            "✓ Answered {} of {} mentions",
            run.answered, run.fetched
        );
        if let Some(since_id) = run.since_id {
            println!("  Next cursor: --since-id {since_id}");
        }
        Ok(())
    }
}
