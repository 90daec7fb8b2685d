use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use crate::config::TelegramCredentials;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Result of one best-effort delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Delivers a text message to the configured channel. Text may carry
/// Markdown bold and inline code.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<()>;
}

/// Attempts delivery once. Failures are logged and returned as a value.
pub async fn notify(notifier: &dyn Notifier, text: &str) -> DeliveryOutcome {
    match notifier.deliver(text).await {
        Ok(()) => DeliveryOutcome::Delivered,
        Err(e) => {
            error!("Failed to deliver notification: {:#}", e);
            DeliveryOutcome::Failed(format!("{e:#}"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API `sendMessage` with Markdown parse mode.
pub struct TelegramNotifier {
    client: Client,
    send_url: Url,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, credentials: &TelegramCredentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let send_url = Url::parse(&format!(
            "{}/bot{}/sendMessage",
            api_base.trim_end_matches('/'),
            credentials.bot_token
        ))
        .map_err(|e| anyhow!("Invalid Telegram API base {api_base}: {e}"))?;
        Ok(Self {
            client,
            send_url,
            chat_id: credentials.chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, text: &str) -> Result<()> {
        let params = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
            ("parse_mode", "Markdown"),
        ];
        // Strip the URL from errors, it contains the bot token
        let response = self
            .client
            .post(self.send_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Telegram request failed")?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("Unreadable Telegram response (HTTP {status})"))?;
        if !status.is_success() || !body.ok {
            bail!(
                "Telegram rejected the message (HTTP {status}): {}",
                body.description.unwrap_or_else(|| "no description".to_string())
            );
        }
        Ok(())
    }
}

/// Logs messages instead of sending them. Used for dry runs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, text: &str) -> Result<()> {
        info!("[dry run] would send:\n{}", text);
        Ok(())
    }
}
