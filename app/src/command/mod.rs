//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;

use templar_config::Config;
use templar_core::LLMProvider;
use templar_providers::OpenAiProvider;
use templar_webhook::{GraphClient, XClient, XCredentials};
use tracing::info;

mod chat;
mod convert;
mod info;
mod init;
mod mentions;
mod post;
mod serve;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use convert::{ConvertInput, ConvertStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use mentions::{MentionsInput, MentionsStrategy};
pub use post::{PostInput, PostStrategy};
pub use serve::{ServeInput, ServeStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// Each strategy defines its own input type via the associated type, so
/// adding a command only requires implementing this trait.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Build the chat-completion provider described by the config.
fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn LLMProvider>> {
    let api_key = config.require_openai_key()?.to_string();
    let defaults = &config.agents.defaults;

    let mut provider = OpenAiProvider::new(api_key, defaults.request_timeout())?
        .with_default_model(defaults.model.clone());
    if let Some(base_url) = &config.providers.openai.base_url {
        info!("Using chat completion endpoint {base_url}");
        provider = provider.with_base_url(base_url.clone());
    }

    Ok(Arc::new(provider))
}

/// Build the Graph API client for the configured Instagram account.
fn build_graph_client(config: &Config) -> anyhow::Result<GraphClient> {
    let instagram = config.require_instagram()?;
    Ok(GraphClient::new(
        instagram.access_token.clone(),
        instagram.account_id.clone(),
        &instagram.graph_version,
    )?)
}

/// Build the X client for the configured account.
fn build_x_client(config: &Config) -> anyhow::Result<XClient> {
    let x = config.require_x()?;
    let credentials = XCredentials {
        consumer_key: x.api_key.clone(),
        consumer_secret: x.api_key_secret.clone(),
        access_token: x.access_token.clone(),
        access_token_secret: x.access_token_secret.clone(),
    };
    Ok(XClient::new(credentials, &x.base_url)?.with_user_id(x.user_id.clone()))
}
