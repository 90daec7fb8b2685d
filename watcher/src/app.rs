use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{Cli, WatcherConfig};
use crate::notifier::{LogNotifier, Notifier, TELEGRAM_API_BASE, TelegramNotifier};
use crate::orchestrator::{RunReport, run_check};
use crate::state_store::StateStore;
use crate::status_provider::HttpStatusProvider;

/// Resolves the configuration, wires the HTTP provider and the notifier,
/// then runs one check. Configuration errors return before the state store
/// exists, so no state file is read or written.
pub async fn run<F>(cli: &Cli, lookup: F, now: DateTime<Utc>) -> Result<RunReport>
where
    F: Fn(&str) -> Option<String>,
{
    let config = WatcherConfig::resolve(cli, lookup).context("Invalid configuration")?;

    let provider = HttpStatusProvider::from_config(&config)?;
    let notifier = build_notifier(&config)?;
    let store = StateStore::from_config(&config);

    Ok(run_check(&config, &store, &provider, notifier.as_ref(), now).await)
}

fn build_notifier(config: &WatcherConfig) -> Result<Box<dyn Notifier>> {
    match (&config.telegram, config.dry_run) {
        (Some(credentials), false) => Ok(Box::new(TelegramNotifier::new(
            TELEGRAM_API_BASE,
            credentials,
            config.notify_timeout,
        )?)),
        _ => {
            info!("Dry run: messages will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}
