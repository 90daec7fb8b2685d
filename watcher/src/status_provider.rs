use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use common::{PlayerName, Roster, format_roster};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use crate::config::WatcherConfig;

/// One entry of the player sample returned by a status ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSample {
    pub name: PlayerName,
}

/// Source of "who is online". The wire protocol lives behind this trait.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Full player list. Preferred, but often disabled on servers.
    async fn query(&self, address: &str) -> Result<Roster>;

    /// Status ping. The sample may be partial or empty.
    async fn status(&self, address: &str) -> Result<Vec<PlayerSample>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Query,
    Status,
    Error,
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryMethod::Query => "query",
            QueryMethod::Status => "status",
            QueryMethod::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterObservation {
    pub roster: Roster,
    pub method: QueryMethod,
}

impl RosterObservation {
    pub fn failed(&self) -> bool {
        self.method == QueryMethod::Error
    }
}

/// Asks `query` first and falls back to `status` when it fails or comes back
/// empty. Never fails: if neither answers, the roster is empty and the method
/// is [`QueryMethod::Error`].
pub async fn fetch_roster(provider: &dyn StatusProvider, address: &str) -> RosterObservation {
    match provider.query(address).await {
        Ok(roster) if !roster.is_empty() => {
            info!("Got players via query: {}", format_roster(&roster));
            return RosterObservation {
                roster,
                method: QueryMethod::Query,
            };
        }
        Ok(_) => info!("Query returned no players, trying status"),
        Err(e) => info!("Query unavailable ({:#}), trying status", e),
    }

    match provider.status(address).await {
        Ok(sample) => {
            let roster: Roster = sample
                .into_iter()
                .map(|p| p.name)
                .filter(|name| !name.trim().is_empty())
                .collect();
            if roster.is_empty() {
                info!("Status sample is empty, no players found");
            } else {
                info!("Got players via status: {}", format_roster(&roster));
            }
            RosterObservation {
                roster,
                method: QueryMethod::Status,
            }
        }
        Err(e) => {
            error!("Failed to get server status for {}: {:#}", address, e);
            RosterObservation {
                roster: Roster::new(),
                method: QueryMethod::Error,
            }
        }
    }
}

// Response shapes of the public status services

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    online: bool,
    #[serde(default)]
    players: Option<QueryPlayers>,
}

#[derive(Debug, Deserialize)]
struct QueryPlayers {
    #[serde(default)]
    list: Vec<QueryPlayer>,
}

#[derive(Debug, Deserialize)]
struct QueryPlayer {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    online: bool,
    #[serde(default)]
    players: Option<StatusPlayers>,
}

#[derive(Debug, Deserialize)]
struct StatusPlayers {
    #[serde(default)]
    list: Option<Vec<StatusPlayer>>,
}

#[derive(Debug, Deserialize)]
struct StatusPlayer {
    #[serde(default)]
    name_clean: Option<String>,
}

/// Talks to two HTTP status services: a full-list one for `query` and a
/// ping-sample one for `status`.
pub struct HttpStatusProvider {
    client: Client,
    query_base: Url,
    status_base: Url,
}

impl HttpStatusProvider {
    pub fn new(query_base: &str, status_base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("roster-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            query_base: Url::parse(query_base)
                .with_context(|| format!("Invalid query service URL {query_base}"))?,
            status_base: Url::parse(status_base)
                .with_context(|| format!("Invalid status service URL {status_base}"))?,
        })
    }

    pub fn from_config(config: &WatcherConfig) -> Result<Self> {
        Self::new(
            &config.query_base_url,
            &config.status_base_url,
            config.request_timeout,
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, base: &Url, address: &str) -> Result<T> {
        let url = endpoint(base, address)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {url}"))
    }
}

/// `{base}/{address}`, tolerating a trailing slash on the base.
fn endpoint(base: &Url, address: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("{base} cannot be used as a base URL"))?
        .pop_if_empty()
        .push(address);
    Ok(url)
}

#[async_trait]
impl StatusProvider for HttpStatusProvider {
    async fn query(&self, address: &str) -> Result<Roster> {
        let response: QueryResponse = self.get_json(&self.query_base, address).await?;
        if !response.online {
            bail!("{address} is reported offline");
        }
        Ok(response
            .players
            .map(|p| p.list.into_iter().map(|player| player.name).collect())
            .unwrap_or_default())
    }

    async fn status(&self, address: &str) -> Result<Vec<PlayerSample>> {
        let response: StatusResponse = self.get_json(&self.status_base, address).await?;
        if !response.online {
            bail!("{address} is reported offline");
        }
        Ok(response
            .players
            .and_then(|p| p.list)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|player| player.name_clean)
            .map(|name| PlayerSample { name })
            .collect())
    }
}
