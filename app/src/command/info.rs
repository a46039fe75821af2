use templar_config::Config;

/// Strategy for displaying configuration information.
///
/// Secrets are masked; everything else is printed as loaded, after
/// environment overrides.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== templar Configuration ===\n");

        println!("OpenAI:");
        println!("  API Key: {}", mask_secret(&config.providers.openai.api_key));
        if let Some(ref base_url) = config.providers.openai.base_url {
            println!("  Base URL: {base_url}");
        }
        println!();

        let defaults = &config.agents.defaults;
        println!("Agent Defaults:");
        println!("  Model: {}", defaults.model);
        println!("  Temperature: {}", defaults.temperature);
        println!("  Top P: {}", defaults.top_p);
        println!("  Max Tokens: {}", defaults.max_tokens);
        println!("  History Limit: {}", defaults.history_limit);
        println!("  History Scope: {:?}", defaults.history_scope);
        println!("  Request Timeout: {}s", defaults.request_timeout_secs);
        println!("  Max Senders: {}", defaults.max_senders);
        println!("  Sender Idle Timeout: {}s", defaults.sender_idle_secs);
        println!("  Persona: {}", truncate(defaults.persona(), 60));
        println!();

        let instagram = &config.instagram;
        println!("Instagram:");
        println!("  Enabled: {}", instagram.enabled);
        println!("  Access Token: {}", mask_secret(&instagram.access_token));
        println!("  Account ID: {}", or_unset(&instagram.account_id));
        println!("  Verify Token: {}", mask_secret(&instagram.verify_token));
        println!("  Graph Version: {}", instagram.graph_version);
        println!();

        let x = &config.x;
        println!("X:");
        println!("  Enabled: {}", x.enabled);
        println!("  API Key: {}", mask_secret(&x.api_key));
        println!("  Access Token: {}", mask_secret(&x.access_token));
        println!("  User ID: {}", or_unset(&x.user_id));
        println!("  Base URL: {}", x.base_url);
        println!();

        let server = &config.server;
        println!("Server:");
        println!("  Listen: {}:{}", server.host, server.port);
        println!(
            "  API Token: {}",
            server.api_token.as_deref().map_or_else(|| "(not set)".to_string(), mask_secret)
        );
        println!("  Rate Limit: {}/min", server.rate_limit_per_minute);

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n > 8 => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{head}...{tail}")
        }
        _ => "***".to_string(),
    }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let first_line = s.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars && first_line.len() == s.len() {
        first_line.to_string()
    } else {
        let kept: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
