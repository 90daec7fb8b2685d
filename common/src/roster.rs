use std::collections::BTreeSet;

/// Player name exactly as the game server reports it. Case-sensitive.
pub type PlayerName = String;

/// Who is online at one observation. Ordered so every iteration over it
/// (notifications, summaries, persisted files) is lexicographic.
pub type Roster = BTreeSet<PlayerName>;

/// Rendering of an empty roster in messages.
pub const NOBODY: &str = "nobody";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub joined: Roster,
    pub left: Roster,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Players present in `current` but not `previous` joined; the reverse left.
pub fn diff(previous: &Roster, current: &Roster) -> RosterDiff {
    RosterDiff {
        joined: current.difference(previous).cloned().collect(),
        left: previous.difference(current).cloned().collect(),
    }
}

pub fn roster_from<I, S>(names: I) -> Roster
where
    I: IntoIterator<Item = S>,
    S: Into<PlayerName>,
{
    names.into_iter().map(Into::into).collect()
}

/// Comma-separated names, or "nobody".
pub fn format_roster(roster: &Roster) -> String {
    if roster.is_empty() {
        return NOBODY.to_string();
    }
    roster.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
