use std::sync::Arc;

use templar_config::{Config, Purpose};
use templar_conversation::ConversationRegistry;
use templar_webhook::{WebhookState, serve, socket_addr};
use tracing::info;

use super::{build_graph_client, build_provider, build_x_client};

/// Input for the serve command.
pub struct ServeInput {
    /// Optional port (overrides config)
    pub port: Option<u16>,
}

/// Strategy for running the Instagram (and optionally X) webhook server.
pub struct ServeStrategy;

impl super::CommandStrategy for ServeStrategy {
    type Input = ServeInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        config.validate(Purpose::Serve)?;

        let provider = build_provider(&config)?;
        let graph = build_graph_client(&config)?;

        let defaults = &config.agents.defaults;
        let registry = ConversationRegistry::new(
            provider,
            defaults.responder_config(),
            defaults.history_scope,
        )?
        .with_sender_limits(defaults.sender_limits());

        let mut state = WebhookState::new(
            Arc::new(registry),
            Arc::new(graph),
            config.instagram.verify_token.clone(),
            config.instagram.account_id.clone(),
        )
        .with_api_token(config.server.api_token.clone())
        .with_rate_limit(config.server.rate_limit_per_minute);

        if config.x.enabled {
            let x = build_x_client(&config)?;
            let consumer_secret = x.consumer_secret().to_string();
            info!("X mentions enabled at /process_x_mentions");
            state = state.with_x(Arc::new(x), consumer_secret);
        }

        let port = input.port.unwrap_or(config.server.port);
        let addr = socket_addr(&config.server.host, port)?;

        info!("Starting Templar webhook server. Press Ctrl+C to stop.");
        serve(addr, state).await?;

        Ok(())
    }
}
