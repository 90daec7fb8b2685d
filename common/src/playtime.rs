use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{PlayerName, Roster};

/// Seconds since the Unix epoch. Fractional seconds are kept on disk and
/// dropped when a session is folded into the total.
pub type Timestamp = f64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaytimeRecord {
    /// Whole seconds of completed sessions.
    pub total: u64,
    /// Set while the player is in an open session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_start: Option<Timestamp>,
}

impl PlaytimeRecord {
    pub fn is_in_session(&self) -> bool {
        self.session_start.is_some()
    }

    /// Completed time plus the open session up to `now`.
    pub fn live_seconds(&self, now: Timestamp) -> u64 {
        self.total
            .saturating_add(self.session_start.map_or(0, |start| elapsed_seconds(start, now)))
    }
}

pub type PlaytimeTable = BTreeMap<PlayerName, PlaytimeRecord>;

/// Whole seconds between `start` and `end`, clamped at zero when the clock
/// went backwards.
fn elapsed_seconds(start: Timestamp, end: Timestamp) -> u64 {
    let elapsed = end - start;
    if elapsed.is_finite() && elapsed > 0.0 {
        elapsed.floor() as u64
    } else {
        0
    }
}

/// Opens a session for every joined player and folds every closed session
/// into its player's total. Entries are never removed and totals never
/// decrease.
pub fn update(table: &mut PlaytimeTable, joined: &Roster, left: &Roster, now: Timestamp) {
    for name in joined {
        // A second join without a leave restarts the session
        table.entry(name.clone()).or_default().session_start = Some(now);
    }

    for name in left {
        let Some(record) = table.get_mut(name) else {
            continue;
        };
        if let Some(start) = record.session_start.take() {
            record.total = record.total.saturating_add(elapsed_seconds(start, now));
        }
    }
}
