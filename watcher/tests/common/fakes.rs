use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use ::common::{Roster, roster_from};
use watcher::notifier::Notifier;
use watcher::status_provider::{PlayerSample, StatusProvider};
use watcher::{Cli, FailurePolicy, WatcherConfig};

/// Status provider with canned answers. `None` makes the method fail.
pub struct FakeStatusProvider {
    query: Option<Vec<String>>,
    status: Option<Vec<String>>,
}

impl FakeStatusProvider {
    pub fn answering_query(names: &[&str]) -> Self {
        Self {
            query: Some(names.iter().map(|n| n.to_string()).collect()),
            status: Some(Vec::new()),
        }
    }

    pub fn answering_status(names: &[&str]) -> Self {
        Self {
            query: None,
            status: Some(names.iter().map(|n| n.to_string()).collect()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            query: None,
            status: None,
        }
    }
}

#[async_trait]
impl StatusProvider for FakeStatusProvider {
    async fn query(&self, address: &str) -> Result<Roster> {
        self.query
            .clone()
            .map(roster_from)
            .ok_or_else(|| anyhow!("query to {} timed out", address))
    }

    async fn status(&self, address: &str) -> Result<Vec<PlayerSample>> {
        self.status
            .clone()
            .map(|names| names.into_iter().map(|name| PlayerSample { name }).collect())
            .ok_or_else(|| anyhow!("status ping to {} refused", address))
    }
}

/// Keeps every message it was asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(anyhow!("telegram is down"));
        }
        Ok(())
    }
}

pub fn test_config(dir: &Path, policy: FailurePolicy) -> WatcherConfig {
    let cli = Cli {
        roster_file: Some(dir.join("last_players.txt")),
        playtime_file: Some(dir.join("playtime.json")),
        on_failure: Some(policy),
        ..Cli::default()
    };
    WatcherConfig::resolve(&cli, |key: &str| match key {
        "MC_HOST" => Some("mc.test:25565".to_string()),
        "TELEGRAM_BOT_TOKEN" => Some("token".to_string()),
        "TELEGRAM_CHAT_ID" => Some("42".to_string()),
        _ => None,
    })
    .expect("test config should resolve")
}
