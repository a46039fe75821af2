use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use templar_conversation::{DEFAULT_MAX_HISTORY, HistoryScope, ResponderConfig, SenderLimits};
use templar_core::{DEFAULT_MODEL, DEFAULT_PERSONA, SamplingParams};

const CONFIG_DIR_NAME: &str = "templar";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub instagram: InstagramConfig,
    #[serde(default)]
    pub x: XConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// What a command is about to do with the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Talk to the model from the terminal
    Chat,
    /// Run the webhook server
    Serve,
    /// Publish to Instagram
    Post,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct AgentsConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDefaults {
    #[serde(default = "AgentDefaults::default_model")]
    pub model: String,
    #[serde(default = "AgentDefaults::default_temperature")]
    pub temperature: f32,
    #[serde(default = "AgentDefaults::default_top_p")]
    pub top_p: f32,
    #[serde(default = "AgentDefaults::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "AgentDefaults::default_history_limit")]
    pub history_limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default = "AgentDefaults::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub history_scope: HistoryScope,
    #[serde(default)]
    pub expose_error_detail: bool,
    #[serde(default = "AgentDefaults::default_max_senders")]
    pub max_senders: usize,
    #[serde(default = "AgentDefaults::default_sender_idle_secs")]
    pub sender_idle_secs: u64,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            temperature: Self::default_temperature(),
            top_p: Self::default_top_p(),
            max_tokens: Self::default_max_tokens(),
            history_limit: Self::default_history_limit(),
            persona: None,
            request_timeout_secs: Self::default_request_timeout_secs(),
            history_scope: HistoryScope::default(),
            expose_error_detail: false,
            max_senders: Self::default_max_senders(),
            sender_idle_secs: Self::default_sender_idle_secs(),
        }
    }
}

impl AgentDefaults {
    fn default_model() -> String {
        DEFAULT_MODEL.to_string()
    }

    const fn default_temperature() -> f32 {
        0.7
    }

    const fn default_top_p() -> f32 {
        0.9
    }

    const fn default_max_tokens() -> u32 {
        300
    }

    const fn default_history_limit() -> usize {
        DEFAULT_MAX_HISTORY
    }

    const fn default_request_timeout_secs() -> u64 {
        60
    }

    const fn default_max_senders() -> usize {
        1000
    }

    const fn default_sender_idle_secs() -> u64 {
        60 * 60
    }

    /// Persona from config, or the built-in knight.
    #[must_use]
    pub fn persona(&self) -> &str {
        self.persona.as_deref().unwrap_or(DEFAULT_PERSONA)
    }

    #[must_use]
    pub const fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Responder settings described by these defaults.
    #[must_use]
    pub fn responder_config(&self) -> ResponderConfig {
        ResponderConfig::default()
            .with_model(self.model.clone())
            .with_persona(self.persona().to_string())
            .with_max_history(self.history_limit)
            .with_sampling(self.sampling())
            .with_request_timeout(self.request_timeout())
            .with_error_detail(self.expose_error_detail)
    }

    /// Bounds for `per_sender` conversation state.
    #[must_use]
    pub const fn sender_limits(&self) -> SenderLimits {
        SenderLimits {
            max_senders: self.max_senders,
            idle_timeout: Duration::from_secs(self.sender_idle_secs),
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.history_limit == 0 {
            problems.push("agents.defaults.history_limit must be at least 1".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            problems.push("agents.defaults.temperature must be between 0 and 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            problems.push("agents.defaults.top_p must be between 0 and 1".to_string());
        }
        if self.max_tokens == 0 {
            problems.push("agents.defaults.max_tokens must be at least 1".to_string());
        }
        if self.request_timeout_secs == 0 {
            problems.push("agents.defaults.request_timeout_secs must be at least 1".to_string());
        }
        if self.persona.as_deref().is_some_and(|p| p.trim().is_empty()) {
            problems.push("agents.defaults.persona must not be blank".to_string());
        }
        problems
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstagramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub verify_token: String,
    #[serde(default = "InstagramConfig::default_graph_version")]
    pub graph_version: String,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            account_id: String::new(),
            verify_token: String::new(),
            graph_version: Self::default_graph_version(),
        }
    }
}

impl InstagramConfig {
    fn default_graph_version() -> String {
        "v19.0".to_string()
    }
}

/// X (Twitter) API v2 credentials, signed with OAuth 1.0a user context.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_key_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_token_secret: String,
    /// Account whose mentions are answered; looked up when empty
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "XConfig::default_base_url")]
    pub base_url: String,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            api_key_secret: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            user_id: String::new(),
            base_url: Self::default_base_url(),
        }
    }
}

impl XConfig {
    fn default_base_url() -> String {
        "https://api.twitter.com/2".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "ServerConfig::default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            api_token: None,
            rate_limit_per_minute: Self::default_rate_limit(),
        }
    }
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    const fn default_port() -> u16 {
        8080
    }

    const fn default_rate_limit() -> u32 {
        20
    }
}

impl Config {
    /// Directory holding the config file (`~/templar`).
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR_NAME))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load `~/templar/config.json` and apply environment overrides.
    ///
    /// Without a config file, an `OPENAI_API_KEY` in the environment is
    /// enough to start with defaults.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else if std::env::var_os("OPENAI_API_KEY").is_some() {
            debug!("No config file, using defaults and environment");
            Self::default()
        } else {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'templar init' to create config.",
                config_path.display()
            );
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override file values with environment variables, when set.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.providers.openai.api_key = key;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.providers.openai.base_url = Some(url);
        }
        if let Some(token) = lookup("IG_ACCESS_TOKEN") {
            self.instagram.access_token = token;
        }
        if let Some(id) = lookup("INSTAGRAM_ACCOUNT_ID") {
            self.instagram.account_id = id;
        }
        if let Some(token) = lookup("IG_VERIFY_TOKEN") {
            self.instagram.verify_token = token;
        }
        if let Some(key) = lookup("X_API_KEY") {
            self.x.api_key = key;
        }
        if let Some(secret) = lookup("X_API_KEY_SECRET") {
            self.x.api_key_secret = secret;
        }
        if let Some(token) = lookup("X_ACCESS_TOKEN") {
            self.x.access_token = token;
        }
        if let Some(secret) = lookup("X_ACCESS_TOKEN_SECRET") {
            self.x.access_token_secret = secret;
        }
        if let Some(token) = lookup("TEMPLAR_API_TOKEN") {
            self.server.api_token = Some(token);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    pub fn require_openai_key(&self) -> anyhow::Result<&str> {
        let key = self.providers.openai.api_key.trim();
        if key.is_empty() || key == "your-openai-api-key-here" {
            anyhow::bail!(
                "OpenAI API key not configured. Set \"providers.openai.api_key\" or OPENAI_API_KEY"
            );
        }
        Ok(key)
    }

    pub fn require_instagram(&self) -> anyhow::Result<&InstagramConfig> {
        let ig = &self.instagram;
        let missing = missing_fields(&[
            ("access_token", &ig.access_token),
            ("account_id", &ig.account_id),
            ("verify_token", &ig.verify_token),
        ]);

        if !missing.is_empty() {
            anyhow::bail!("Instagram config incomplete, missing: {}", missing.join(", "));
        }
        Ok(ig)
    }

    pub fn require_x(&self) -> anyhow::Result<&XConfig> {
        let x = &self.x;
        let missing = missing_fields(&[
            ("api_key", &x.api_key),
            ("api_key_secret", &x.api_key_secret),
            ("access_token", &x.access_token),
            ("access_token_secret", &x.access_token_secret),
        ]);

        if !missing.is_empty() {
            anyhow::bail!("X config incomplete, missing: {}", missing.join(", "));
        }
        Ok(x)
    }

    /// Check that everything `purpose` needs is present and sane.
    ///
    /// All problems are reported together.
    pub fn validate(&self, purpose: Purpose) -> anyhow::Result<()> {
        let mut problems = self.agents.defaults.problems();
        let mut check = |result: anyhow::Result<()>| {
            if let Err(e) = result {
                problems.push(e.to_string());
            }
        };

        match purpose {
            Purpose::Chat => check(self.require_openai_key().map(drop)),
            Purpose::Serve => {
                check(self.require_openai_key().map(drop));
                if self.instagram.enabled {
                    check(self.require_instagram().map(drop));
                } else {
                    check(Err(anyhow::anyhow!(
                        "Instagram is not enabled in config. Set \"instagram.enabled\": true"
                    )));
                }
                if self.x.enabled {
                    check(self.require_x().map(drop));
                }
            }
            Purpose::Post => check(self.require_instagram().map(drop)),
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration:\n  - {}", problems.join("\n  - "))
        }
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = Self::write_template(&config_dir)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your OpenAI API key");
        println!("   2. Fill in the instagram section to answer Instagram messages");
        println!("   3. Run 'templar chat' to speak with the knight");
        println!();
        println!("🔧 Configuration options:");
        println!("   - history_limit: Dialogue turns kept behind the persona");
        println!("   - history_scope: \"shared\" (one conversation) or \"per_sender\"");
        println!("   - persona: Replace the built-in knight persona");
        println!();
        Ok(())
    }

    /// Write the config template into `dir`, refusing to overwrite.
    pub fn write_template(dir: &Path) -> anyhow::Result<PathBuf> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        let config_template = r#"{
  "agents": {
    "defaults": {
      "model": "gpt-4o-mini-2024-07-18",
      "temperature": 0.7,
      "top_p": 0.9,
      "max_tokens": 300,
      "history_limit": 10,
      "request_timeout_secs": 60,
      "history_scope": "shared",
      "expose_error_detail": false,
      "max_senders": 1000,
      "sender_idle_secs": 3600
    }
  },
  "providers": {
    "openai": {
      "api_key": "your-openai-api-key-here"
    }
  },
  "instagram": {
    "enabled": false,
    "access_token": "",
    "account_id": "",
    "verify_token": "",
    "graph_version": "v19.0"
  },
  "x": {
    "enabled": false,
    "api_key": "",
    "api_key_secret": "",
    "access_token": "",
    "access_token_secret": ""
  },
  "server": {
    "host": "0.0.0.0",
    "port": 8080,
    "rate_limit_per_minute": 20
  }
}"#;

        std::fs::write(&config_path, config_template)?;
        Ok(config_path)
    }
}

fn missing_fields<'a>(fields: &[(&'a str, &String)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn template_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::write_template(dir.path()).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.agents.defaults.model, DEFAULT_MODEL);
        assert_eq!(config.agents.defaults.history_limit, 10);
        assert_eq!(config.agents.defaults.history_scope, HistoryScope::Shared);
        assert_eq!(config.server.port, 8080);
        assert!(config.require_openai_key().is_err());
    }

    #[test]
    fn template_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        Config::write_template(dir.path()).unwrap();
        assert!(Config::write_template(dir.path()).is_err());
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"providers": {"openai": {"api_key": "sk-test"}}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        let defaults = &config.agents.defaults;
        assert_eq!(defaults.persona(), DEFAULT_PERSONA);
        assert_eq!(defaults.max_tokens, 300);
        assert_eq!(defaults.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.instagram.graph_version, "v19.0");
        assert_eq!(config.require_openai_key().unwrap(), "sk-test");
    }

    #[test]
    fn malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("IG_ACCESS_TOKEN", "ig-token"),
            ("INSTAGRAM_ACCOUNT_ID", "1784"),
            ("IG_VERIFY_TOKEN", "verify"),
            ("PORT", "3000"),
            ("TEMPLAR_API_TOKEN", "   "),
        ]);

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.providers.openai.api_key, "sk-env");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.api_token, None);
        assert!(config.require_instagram().is_ok());
    }

    #[test]
    fn incomplete_instagram_lists_missing_fields() {
        let mut config = Config::default();
        config.instagram.access_token = "token".to_string();

        let err = config.require_instagram().unwrap_err().to_string();
        assert!(err.contains("account_id"));
        assert!(err.contains("verify_token"));
        assert!(!err.contains("access_token"));
    }

    #[test]
    fn responder_config_follows_defaults() {
        let mut defaults = AgentDefaults {
            persona: Some("P".to_string()),
            history_limit: 4,
            ..AgentDefaults::default()
        };
        defaults.expose_error_detail = true;

        let responder = defaults.responder_config();
        assert_eq!(responder.persona, "P");
        assert_eq!(responder.max_history, 4);
        assert_eq!(responder.sampling, SamplingParams::default());
        assert!(responder.expose_error_detail);
    }

    fn ready_config() -> Config {
        let mut config = Config::default();
        config.providers.openai.api_key = "sk-test".to_string();
        config.instagram.enabled = true;
        config.instagram.access_token = "ig-token".to_string();
        config.instagram.account_id = "1784".to_string();
        config.instagram.verify_token = "verify".to_string();
        config
    }

    #[test]
    fn validate_accepts_complete_config() {
        let config = ready_config();
        assert!(config.validate(Purpose::Chat).is_ok());
        assert!(config.validate(Purpose::Serve).is_ok());
        assert!(config.validate(Purpose::Post).is_ok());
    }

    #[test]
    fn validate_rejects_zero_history_limit() {
        let mut config = ready_config();
        config.agents.defaults.history_limit = 0;

        let err = config.validate(Purpose::Chat).unwrap_err().to_string();
        assert!(err.contains("history_limit"));
    }

    #[test]
    fn validate_reports_every_problem_for_serve() {
        let mut config = ready_config();
        config.providers.openai.api_key = String::new();
        config.agents.defaults.top_p = 1.5;
        config.x.enabled = true;
        config.x.api_key = "key".to_string();

        let err = config.validate(Purpose::Serve).unwrap_err().to_string();
        assert!(err.contains("OpenAI API key"));
        assert!(err.contains("top_p"));
        assert!(err.contains("X config incomplete"));
        assert!(err.contains("access_token_secret"));
    }

    #[test]
    fn validate_serve_requires_instagram_enabled() {
        let mut config = ready_config();
        config.instagram.enabled = false;

        assert!(config.validate(Purpose::Chat).is_ok());
        let err = config.validate(Purpose::Serve).unwrap_err().to_string();
        assert!(err.contains("not enabled"));
    }

    #[test]
    fn x_credentials_come_from_env() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("X_API_KEY", "ck"),
            ("X_API_KEY_SECRET", "cs"),
            ("X_ACCESS_TOKEN", "at"),
            ("X_ACCESS_TOKEN_SECRET", "ats"),
        ]);

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        let x = config.require_x().unwrap();
        assert_eq!(x.api_key_secret, "cs");
        assert_eq!(x.base_url, "https://api.twitter.com/2");
    }

    #[test]
    fn sender_limits_follow_defaults() {
        let limits = AgentDefaults::default().sender_limits();
        assert_eq!(limits.max_senders, 1000);
        assert_eq!(limits.idle_timeout, Duration::from_secs(3600));
    }
}
