use crate::error::{AppError, AppResult};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Discord bot configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    /// Bot token, usually supplied via PROXYGATE_DISCORD__TOKEN
    #[serde(default)]
    pub token: String,
}

/// Which membership check gates issuance
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipProvider {
    /// Membership in a Discord guild, optionally with a role
    #[default]
    Discord,
    /// External membership API over HTTP
    Http,
}

/// Membership oracle configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MembershipConfig {
    #[serde(default)]
    pub provider: MembershipProvider,
    /// Guild whose members are eligible (discord provider)
    #[serde(default)]
    pub guild_id: Option<u64>,
    /// Role a member must hold to be eligible (discord provider)
    #[serde(default)]
    pub required_role_id: Option<u64>,
    /// Base URL of the membership API (http provider)
    #[serde(default)]
    pub url: Option<String>,
    /// Upper bound on a single membership check
    #[serde(default = "default_membership_timeout")]
    pub timeout_secs: u64,
}

fn default_membership_timeout() -> u64 {
    10
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            provider: MembershipProvider::default(),
            guild_id: None,
            required_role_id: None,
            url: None,
            timeout_secs: default_membership_timeout(),
        }
    }
}

/// Storage backend for issued secrets
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Single JSON document, replaced atomically on every write
    #[default]
    File,
    /// SQLite database
    Sqlite,
}

/// Credential store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// JSON file path (file backend)
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Database URL (sqlite backend)
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/allowed_users.json")
}

fn default_database_url() -> String {
    "sqlite://data/proxygate.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Public address of the MTProxy relay handed out to users
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub server: String,
    #[serde(default = "default_relay_port")]
    pub port: u16,
}

fn default_relay_port() -> u16 {
    443
}

/// Administrator settings
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    /// Identities allowed to run `/stats`
    #[serde(default)]
    pub ids: Vec<String>,
    /// How many recent records `/stats` shows
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,
}

fn default_recent_count() -> usize {
    5
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            recent_count: default_recent_count(),
        }
    }
}

/// Root application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub membership: MembershipConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub relay: RelayConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        sources()?.try_deserialize()
    }

    /// Initialize the global config singleton
    pub fn init() -> AppResult<&'static Self> {
        let config = Self::load()?;
        config.validate()?;
        Ok(CONFIG.get_or_init(|| config))
    }

    /// Reject combinations the bot cannot start with
    pub fn validate(&self) -> AppResult<()> {
        if self.relay.server.trim().is_empty() {
            return Err(AppError::invalid_config("relay.server must not be empty"));
        }
        match self.membership.provider {
            MembershipProvider::Discord if self.membership.guild_id.is_none() => {
                return Err(AppError::invalid_config(
                    "membership.guild_id is required for the discord provider",
                ));
            }
            MembershipProvider::Http if self.membership.url.is_none() => {
                return Err(AppError::invalid_config(
                    "membership.url is required for the http provider",
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Validation for the bot binary, which also needs a token
    pub fn validate_for_bot(&self) -> AppResult<()> {
        self.validate()?;
        if self.discord.token.trim().is_empty() {
            return Err(AppError::invalid_config(
                "discord.token is empty; set PROXYGATE_DISCORD__TOKEN",
            ));
        }
        Ok(())
    }
}

/// Layered sources shared by the bot and the admin CLI
fn sources() -> Result<Config, ConfigError> {
    Config::builder()
        // Start with default config file
        .add_source(File::with_name("config/default").required(false))
        // Override with local config if present
        .add_source(File::with_name("config/local").required(false))
        // Override with environment variables (prefix: PROXYGATE_)
        // e.g., PROXYGATE_DISCORD__TOKEN, PROXYGATE_ADMIN__IDS=1,2,3
        .add_source(
            Environment::with_prefix("PROXYGATE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("admin.ids")
                .try_parsing(true),
        )
        .build()
}

impl StoreConfig {
    /// Load only the `store` section, for tools that never talk to Discord
    pub fn load() -> Result<Self, ConfigError> {
        match sources()?.get::<StoreConfig>("store") {
            Ok(store) => Ok(store),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }
}

impl MembershipConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}
