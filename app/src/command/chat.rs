//! Talk to the knight from the terminal.

use std::io::Write;

use templar_config::{Config, Purpose};
use templar_conversation::KnightResponder;
use tracing::info;

use super::build_provider;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Optional model override
    pub model: Option<String>,
}

/// Strategy for executing the Chat command.
///
/// Runs one reply, or an interactive loop over one conversation history.
/// The terminal user is the operator, so failure details are shown.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        config.validate(Purpose::Chat)?;
        let provider = build_provider(&config)?;

        let mut responder_config = config.agents.defaults.responder_config().with_error_detail(true);
        if let Some(model) = input.model {
            responder_config = responder_config.with_model(model);
        }

        let knight = KnightResponder::new(provider, responder_config)?;

        if let Some(msg) = input.message {
            println!("{}", knight.reply(&msg).await);
            return Ok(());
        }

        run_interactive(&knight).await
    }
}

async fn run_interactive(knight: &KnightResponder) -> anyhow::Result<()> {
    println!("⚔ The Templar Grand Master awakens (type 'exit' to leave) ⚔");
    println!("Commands: /reset clears the conversation, /history shows its size.\n");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input.to_lowercase().as_str() {
            "exit" | "quit" => break,
            "/reset" => {
                knight.reset().await;
                println!("The slate is wiped clean.\n");
                continue;
            }
            "/history" => {
                let stats = knight.stats().await;
                println!(
                    "{} turns ({} user, {} knight), ~{} tokens\n",
                    stats.dialogue_turns,
                    stats.user_turns,
                    stats.assistant_turns,
                    stats.estimated_tokens
                );
                continue;
            }
            _ => {}
        }

        println!("\n{}\n", knight.reply(input).await);
    }

    let stats = knight.stats().await;
    info!(turns = stats.dialogue_turns, "Conversation ended");
    println!("⚔ The holy conversation comes to an end. ⚔");
    Ok(())
}
