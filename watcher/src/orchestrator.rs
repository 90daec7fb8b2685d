use chrono::{DateTime, Local, Utc};
use common::{PlaytimeTable, Roster, RosterDiff, Timestamp, diff, format_roster};
use tracing::{error, info, warn};

use crate::config::{FailurePolicy, WatcherConfig};
use crate::messages;
use crate::notifier::{DeliveryOutcome, Notifier, notify};
use crate::state_store::{Loaded, StateStore};
use crate::status_provider::{RosterObservation, StatusProvider, fetch_roster};

/// What one check did. Every failure it records was recovered from.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub observation: RosterObservation,
    /// Roster that was diffed against and persisted.
    pub roster: Roster,
    pub diff: RosterDiff,
    /// The provider failed and [`FailurePolicy::SkipCycle`] kept the
    /// previous roster.
    pub skipped: bool,
    pub playtime: PlaytimeTable,
    pub roster_saved: bool,
    pub playtime_saved: bool,
    pub delivered: usize,
    pub failed_deliveries: usize,
    /// Wall-clock time stamped on the footer, taken after the summary.
    pub finished_at: DateTime<Utc>,
}

struct Outbox<'a> {
    notifier: &'a dyn Notifier,
    delivered: usize,
    failed: usize,
}

impl<'a> Outbox<'a> {
    fn new(notifier: &'a dyn Notifier) -> Self {
        Self {
            notifier,
            delivered: 0,
            failed: 0,
        }
    }

    async fn send(&mut self, text: &str) {
        match notify(self.notifier, text).await {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Failed(_) => self.failed += 1,
        }
    }
}

pub fn to_timestamp(at: &DateTime<Utc>) -> Timestamp {
    at.timestamp_millis() as f64 / 1000.0
}

fn take_logged<T>(loaded: Loaded<T>, what: &str) -> T {
    if let Some(anomaly) = loaded.anomaly {
        warn!("Ignoring stored {}: {}", what, anomaly);
    }
    loaded.value
}

/// One full check: load state, observe, diff, notify, account, persist,
/// summarize. Never fails; each step's failure degrades to an empty value or
/// a skipped message.
pub async fn run_check(
    config: &WatcherConfig,
    store: &StateStore,
    provider: &dyn StatusProvider,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> RunReport {
    info!("=== check started for {} ===", config.server_address);

    let previous = take_logged(store.load_roster(), "roster");
    let mut playtime = take_logged(store.load_playtime(), "playtime");

    let observation = fetch_roster(provider, &config.server_address).await;
    let skipped = observation.failed() && config.failure_policy == FailurePolicy::SkipCycle;
    let current = if skipped {
        warn!(
            "Server did not answer, keeping previous roster: {}",
            format_roster(&previous)
        );
        previous.clone()
    } else {
        observation.roster.clone()
    };

    let changes = diff(&previous, &current);
    let mut outbox = Outbox::new(notifier);

    if !changes.joined.is_empty() {
        info!("Joined: {}", format_roster(&changes.joined));
        for player in &changes.joined {
            outbox.send(&messages::join_message(player, &current)).await;
        }
    }
    if !changes.left.is_empty() {
        info!("Left: {}", format_roster(&changes.left));
        for player in &changes.left {
            outbox.send(&messages::leave_message(player, &current)).await;
        }
    }
    if changes.is_empty() {
        info!("No roster changes. Online: {}", format_roster(&current));
    }

    let now_ts = to_timestamp(&now);
    common::update(&mut playtime, &changes.joined, &changes.left, now_ts);

    // Re-saved even when nothing changed, in case the last save was lost
    let roster_saved = match store.save_roster(&current) {
        Ok(()) => true,
        Err(e) => {
            error!("{:#}", e);
            false
        }
    };
    let playtime_saved = match store.save_playtime(&playtime) {
        Ok(()) => true,
        Err(e) => {
            error!("{:#}", e);
            false
        }
    };

    let summary = messages::summary_message(
        &config.server_address,
        observation.method,
        &current,
        &playtime,
        now_ts,
    );
    info!("Summary: {}", summary);
    outbox.send(&summary).await;
    let finished_at = Utc::now();
    outbox
        .send(&messages::session_footer(&finished_at.with_timezone(&Local)))
        .await;

    info!(
        "=== check finished: {} delivered, {} failed ===",
        outbox.delivered, outbox.failed
    );

    RunReport {
        observation,
        roster: current,
        diff: changes,
        skipped,
        playtime,
        roster_saved,
        playtime_saved,
        delivered: outbox.delivered,
        failed_deliveries: outbox.failed,
        finished_at,
    }
}
