use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

pub const DEFAULT_SERVER_ADDRESS: &str = "yaneznau.peniscraft.pro";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 5.0;
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ROSTER_PATH: &str = "scripts/last_players.txt";
pub const DEFAULT_PLAYTIME_PATH: &str = "scripts/playtime.json";
pub const DEFAULT_QUERY_URL: &str = "https://api.mcsrvstat.us/3";
pub const DEFAULT_STATUS_URL: &str = "https://api.mcstatus.io/v2/status/java";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set in the environment or .env file")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// What to do with the previous roster when no status method answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Diff against an empty roster, so everyone online is reported as left.
    #[default]
    #[value(name = "empty")]
    TreatAsEmpty,
    /// Keep the previous roster and report nothing for this cycle.
    #[value(name = "skip")]
    SkipCycle,
}

#[derive(Debug, Parser, Default)]
#[command(
    name = "roster-watch",
    about = "Check a game server once and report players joining and leaving"
)]
pub struct Cli {
    /// Server address, host or host:port (overrides MC_HOST)
    #[arg(long)]
    pub server: Option<String>,

    /// Status query timeout in seconds (overrides MC_TIMEOUT)
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Persisted roster file (overrides STATE_PATH)
    #[arg(long)]
    pub roster_file: Option<PathBuf>,

    /// Persisted playtime file (overrides PLAYTIME_PATH)
    #[arg(long)]
    pub playtime_file: Option<PathBuf>,

    /// Behaviour when the server cannot be queried (overrides MC_ON_FAILURE)
    #[arg(long, value_enum)]
    pub on_failure: Option<FailurePolicy>,

    /// Log messages instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

/// Run configuration, resolved once before any state is read.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub server_address: String,
    /// `None` only in dry-run mode.
    pub telegram: Option<TelegramCredentials>,
    pub request_timeout: Duration,
    pub notify_timeout: Duration,
    pub roster_path: PathBuf,
    pub playtime_path: PathBuf,
    pub failure_policy: FailurePolicy,
    pub query_base_url: String,
    pub status_base_url: String,
    pub dry_run: bool,
}

impl WatcherConfig {
    /// Builds the configuration from CLI flags, falling back to `lookup`
    /// (normally the process environment) and then to defaults.
    pub fn resolve<F>(cli: &Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramCredentials { bot_token, chat_id }),
            _ if cli.dry_run => None,
            (None, _) => return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN")),
            (_, None) => return Err(ConfigError::Missing("TELEGRAM_CHAT_ID")),
        };

        let server_address = cli
            .server
            .clone()
            .or_else(|| get("MC_HOST"))
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());

        let timeout_secs = match (cli.timeout, get("MC_TIMEOUT")) {
            (Some(secs), _) => secs,
            (None, Some(raw)) => raw.parse::<f64>().map_err(|e| ConfigError::Invalid {
                key: "MC_TIMEOUT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            (None, None) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "MC_TIMEOUT",
                value: timeout_secs.to_string(),
                reason: "must be a positive number of seconds".to_string(),
            });
        }
        let request_timeout =
            Duration::try_from_secs_f64(timeout_secs).map_err(|e| ConfigError::Invalid {
                key: "MC_TIMEOUT",
                value: timeout_secs.to_string(),
                reason: e.to_string(),
            })?;

        let failure_policy = match (cli.on_failure, get("MC_ON_FAILURE")) {
            (Some(policy), _) => policy,
            (None, Some(raw)) => FailurePolicy::from_str(&raw, true).map_err(|reason| {
                ConfigError::Invalid {
                    key: "MC_ON_FAILURE",
                    value: raw.clone(),
                    reason,
                }
            })?,
            (None, None) => FailurePolicy::default(),
        };

        let roster_path = cli
            .roster_file
            .clone()
            .or_else(|| get("STATE_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROSTER_PATH));
        let playtime_path = cli
            .playtime_file
            .clone()
            .or_else(|| get("PLAYTIME_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PLAYTIME_PATH));

        Ok(Self {
            server_address,
            telegram,
            request_timeout,
            notify_timeout: NOTIFY_TIMEOUT,
            roster_path,
            playtime_path,
            failure_policy,
            query_base_url: get("MC_QUERY_URL").unwrap_or_else(|| DEFAULT_QUERY_URL.to_string()),
            status_base_url: get("MC_STATUS_URL")
                .unwrap_or_else(|| DEFAULT_STATUS_URL.to_string()),
            dry_run: cli.dry_run,
        })
    }
}
