use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI interface for the daemon.
#[derive(Parser)]
#[command(name = "wabot", about = "Messaging session daemon")]
#[command(version)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a custom configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Gateway WebSocket URL override.
    #[arg(long, global = true)]
    pub gateway: Option<String>,

    /// HTTP health endpoint port override.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Increase log verbosity (repeat for more detail).
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap credentials and run the session.
    Start,
    /// Validate configuration and credentials without connecting.
    Check,
    /// Print the current greeting and time of day.
    Greet,
}

/// Who may trigger commands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    /// Anyone.
    #[default]
    Public,
    /// Only the session owner.
    Private,
}

impl BotMode {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Runtime configuration loaded from defaults, file and environment.
///
/// Read-only for the lifetime of the process.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Command visibility.
    pub mode: BotMode,
    /// Command prefix.
    pub prefix: String,
    /// Mark ordinary inbound messages as read.
    pub auto_read: bool,
    /// React to ordinary inbound messages.
    pub auto_react: bool,
    /// React to status updates (requires `auto_status_seen`).
    pub auto_like: bool,
    /// View status updates; gates every status interaction.
    pub auto_status_seen: bool,
    /// Reply to status updates (requires `auto_status_seen`).
    pub auto_status_reply: bool,
    /// HTTP health endpoint port.
    pub port: u16,
    /// Directory holding decoded credentials.
    pub session_dir: PathBuf,
    /// JSON file holding the encoded `SESSION_ID`.
    pub session_file: PathBuf,
    /// Gateway WebSocket URL.
    pub gateway: String,
    /// Where to fetch the latest client protocol version.
    pub version_url: String,
    /// Name shown in the startup announcement.
    pub bot_name: String,
    /// Link attached to the startup announcement.
    pub source_url: String,
    /// Group invite code joined after every successful open.
    #[serde(default)]
    pub group_invite: Option<String>,
    /// Reconnect policy.
    pub reconnect: ReconnectConfig,
}

/// Reconnect policy parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct ReconnectConfig {
    /// Delay reopen attempts with exponential backoff; `false` reopens immediately.
    pub backoff: bool,
    /// Initial delay before the first reopen attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between reopen attempts, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Consecutive reopens without reaching `open` before giving up (0 = unlimited).
    pub max_retries: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff: true,
            initial_delay_ms: 500,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
            max_retries: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: BotMode::Public,
            prefix: "!".to_string(),
            auto_read: false,
            auto_react: false,
            auto_like: true,
            auto_status_seen: true,
            auto_status_reply: false,
            port: 3000,
            session_dir: PathBuf::from("session"),
            session_file: PathBuf::from("session.json"),
            gateway: "ws://127.0.0.1:8787".to_string(),
            version_url: "https://raw.githubusercontent.com/WhiskeySockets/Baileys/master/src/Defaults/baileys-version.json".to_string(),
            bot_name: "wabot".to_string(),
            source_url: "https://github.com/wabot-rs/wabot".to_string(),
            group_invite: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Config {
    /// Validates the configuration values are within acceptable bounds.
    /// Returns Ok(()) if valid, Err with description otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err("prefix must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        if !(self.gateway.starts_with("ws://") || self.gateway.starts_with("wss://")) {
            return Err(format!(
                "gateway URL must start with ws:// or wss://, got: {}",
                self.gateway
            ));
        }
        if !(self.version_url.starts_with("http://") || self.version_url.starts_with("https://"))
        {
            return Err(format!(
                "version_url must start with http:// or https://, got: {}",
                self.version_url
            ));
        }
        if self.bot_name.trim().is_empty() {
            return Err("bot_name must not be empty".to_string());
        }
        if self
            .group_invite
            .as_deref()
            .is_some_and(|code| code.trim().is_empty())
        {
            return Err("group_invite must not be blank when set".to_string());
        }

        if self.reconnect.initial_delay_ms == 0 {
            return Err("reconnect.initial_delay_ms must be greater than 0".to_string());
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err("reconnect.max_delay_ms must be >= initial_delay_ms".to_string());
        }
        if !self.reconnect.backoff_factor.is_finite() || self.reconnect.backoff_factor <= 0.0 {
            return Err(
                "reconnect.backoff_factor must be a finite number greater than 0".to_string(),
            );
        }

        Ok(())
    }
}

/// Environment variables recognised as configuration overrides.
/// Nested keys use `__`, e.g. `RECONNECT__MAX_RETRIES`.
const ENV_KEYS: &[&str] = &[
    "MODE",
    "PREFIX",
    "AUTO_READ",
    "AUTO_REACT",
    "AUTO_LIKE",
    "AUTO_STATUS_SEEN",
    "AUTO_STATUS_REPLY",
    "PORT",
    "SESSION_DIR",
    "SESSION_FILE",
    "GATEWAY",
    "VERSION_URL",
    "BOT_NAME",
    "SOURCE_URL",
    "GROUP_INVITE",
    "RECONNECT__BACKOFF",
    "RECONNECT__INITIAL_DELAY_MS",
    "RECONNECT__MAX_DELAY_MS",
    "RECONNECT__BACKOFF_FACTOR",
    "RECONNECT__MAX_RETRIES",
];

/// Collects the recognised overrides from the process environment.
#[must_use]
pub fn env_overrides() -> config::Map<String, String> {
    ENV_KEYS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| ((*key).to_string(), v)))
        .collect()
}

/// # Errors
///
/// Returns an error if the configuration file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    load_config_with_env(path, env_overrides())
}

/// Like [`load_config`], with an explicit set of environment overrides.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be read or parsed.
#[allow(clippy::cast_possible_wrap)]
pub fn load_config_with_env(
    path: Option<&Path>,
    env: config::Map<String, String>,
) -> anyhow::Result<Config> {
    let d = Config::default();
    let mut builder = config::Config::builder()
        .set_default("mode", d.mode.as_str())?
        .set_default("prefix", d.prefix.as_str())?
        .set_default("auto_read", d.auto_read)?
        .set_default("auto_react", d.auto_react)?
        .set_default("auto_like", d.auto_like)?
        .set_default("auto_status_seen", d.auto_status_seen)?
        .set_default("auto_status_reply", d.auto_status_reply)?
        .set_default("port", i64::from(d.port))?
        .set_default("session_dir", d.session_dir.to_string_lossy().as_ref())?
        .set_default("session_file", d.session_file.to_string_lossy().as_ref())?
        .set_default("gateway", d.gateway.as_str())?
        .set_default("version_url", d.version_url.as_str())?
        .set_default("bot_name", d.bot_name.as_str())?
        .set_default("source_url", d.source_url.as_str())?
        .set_default("reconnect.backoff", d.reconnect.backoff)?
        .set_default(
            "reconnect.initial_delay_ms",
            d.reconnect.initial_delay_ms as i64,
        )?
        .set_default("reconnect.max_delay_ms", d.reconnect.max_delay_ms as i64)?
        .set_default("reconnect.backoff_factor", d.reconnect.backoff_factor)?
        .set_default("reconnect.max_retries", i64::from(d.reconnect.max_retries))?;

    if let Some(config_path) = path {
        if config_path.exists() {
            builder = builder.add_source(config::File::from(config_path));
        }
    } else {
        // Platform-native config dir first, then ~/.config/wabot/
        let native_path = dirs::config_dir().map(|d| d.join("wabot").join("config.toml"));
        let xdg_path = dirs::home_dir().map(|d| d.join(".config").join("wabot").join("config.toml"));

        let resolved = native_path
            .filter(|p| p.exists())
            .or_else(|| xdg_path.filter(|p| p.exists()));

        if let Some(config_path) = resolved {
            builder = builder.add_source(config::File::from(config_path));
        }
    }

    // Deployments set AUTO_STATUS_SEEN=false etc. directly, so no prefix.
    builder = builder.add_source(
        config::Environment::default()
            .separator("__")
            .try_parsing(true)
            .source(Some(env)),
    );

    let settings = builder.build()?;
    let config: Config = settings.try_deserialize()?;

    Ok(config)
}
