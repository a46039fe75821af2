use templar_config::{Config, Purpose};
use tracing::info;

use super::build_graph_client;

/// Input for the post command.
#[derive(Debug, Clone)]
pub struct PostInput {
    /// Publicly reachable image URL
    pub image_url: String,
    /// Caption published with the photo
    pub caption: String,
}

/// Strategy for publishing a photo to the configured Instagram account.
#[derive(Debug, Clone, Copy)]
pub struct PostStrategy;

impl super::CommandStrategy for PostStrategy {
    type Input = PostInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        if input.image_url.trim().is_empty() {
            anyhow::bail!("An image URL is required");
        }

        let config = Config::load()?;
        config.validate(Purpose::Post)?;
        let graph = build_graph_client(&config)?;

        info!("Publishing photo to account {}", graph.account_id());
        let media_id = graph.post_photo(&input.image_url, &input.caption).await?;
        println!("✓ Published media {media_id}");

        Ok(())
    }
}
