//! Durable state kept between checks: the last observed roster and the
//! per-player playtime table.
//!
//! Both files are read once at the start of a check and fully replaced at the
//! end. Nothing here locks the files; only one check may run at a time
//! against the same paths.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use common::{PlaytimeTable, Roster};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::WatcherConfig;

/// Written in place of an empty roster.
pub const EMPTY_ROSTER_SENTINEL: &str = "nobody";

/// Older deployments wrote this instead of [`EMPTY_ROSTER_SENTINEL`].
const LEGACY_EMPTY_SENTINELS: &[&str] = &["никого"];

/// A state file that could not be used. The caller gets an empty value
/// alongside it and decides how loudly to report it.
#[derive(Debug, Error)]
pub enum StateAnomaly {
    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub anomaly: Option<StateAnomaly>,
}

impl<T: Default> Loaded<T> {
    fn clean(value: T) -> Self {
        Self { value, anomaly: None }
    }

    fn recovered(anomaly: StateAnomaly) -> Self {
        Self {
            value: T::default(),
            anomaly: Some(anomaly),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    roster_path: PathBuf,
    playtime_path: PathBuf,
}

impl StateStore {
    pub fn new(roster_path: impl Into<PathBuf>, playtime_path: impl Into<PathBuf>) -> Self {
        Self {
            roster_path: roster_path.into(),
            playtime_path: playtime_path.into(),
        }
    }

    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(&config.roster_path, &config.playtime_path)
    }

    pub fn roster_path(&self) -> &Path {
        &self.roster_path
    }

    pub fn playtime_path(&self) -> &Path {
        &self.playtime_path
    }

    pub fn load_roster(&self) -> Loaded<Roster> {
        let content = match read_optional(&self.roster_path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                info!("Roster file {} not found, starting empty", self.roster_path.display());
                return Loaded::clean(Roster::new());
            }
            Err(anomaly) => return Loaded::recovered(anomaly),
        };

        match decode_roster(&content) {
            Ok(roster) => Loaded::clean(roster),
            Err(reason) => Loaded::recovered(StateAnomaly::Malformed {
                path: self.roster_path.clone(),
                reason,
            }),
        }
    }

    /// Replaces the persisted roster. An empty roster is written as the
    /// sentinel so it reads back as empty, never as malformed.
    pub fn save_roster(&self, roster: &Roster) -> Result<()> {
        write_durably(&self.roster_path, &encode_roster(roster))
            .with_context(|| format!("Failed to save roster to {}", self.roster_path.display()))?;
        info!("Roster saved: {}", common::format_roster(roster));
        Ok(())
    }

    pub fn load_playtime(&self) -> Loaded<PlaytimeTable> {
        let content = match read_optional(&self.playtime_path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                info!("Playtime file {} not found, starting empty", self.playtime_path.display());
                return Loaded::clean(PlaytimeTable::new());
            }
            Err(anomaly) => return Loaded::recovered(anomaly),
        };

        let content = strip_bom(&content).trim();
        if content.is_empty() {
            return Loaded::clean(PlaytimeTable::new());
        }

        match serde_json::from_str::<PlaytimeTable>(content) {
            Ok(table) => Loaded::clean(table),
            Err(e) => Loaded::recovered(StateAnomaly::Malformed {
                path: self.playtime_path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn save_playtime(&self, table: &PlaytimeTable) -> Result<()> {
        let json = serde_json::to_string_pretty(table).context("Failed to encode playtime")?;
        write_durably(&self.playtime_path, &json).with_context(|| {
            format!("Failed to save playtime to {}", self.playtime_path.display())
        })?;
        info!("Playtime saved for {} player(s)", table.len());
        Ok(())
    }
}

/// Reads the roster file format. Blank content, `null`, `[]` and the empty
/// sentinels all mean nobody is online.
pub fn decode_roster(content: &str) -> Result<Roster, String> {
    let content = strip_bom(content).trim();
    if content.is_empty() {
        return Ok(Roster::new());
    }

    match serde_json::from_str::<Value>(content).map_err(|e| e.to_string())? {
        Value::Null => Ok(Roster::new()),
        Value::String(s)
            if s == EMPTY_ROSTER_SENTINEL || LEGACY_EMPTY_SENTINELS.contains(&s.as_str()) =>
        {
            Ok(Roster::new())
        }
        Value::String(s) => Err(format!("unexpected string {s:?}")),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                other => Err(format!("expected a player name, found {other}")),
            })
            .collect(),
        other => Err(format!("expected a list of player names, found {other}")),
    }
}

pub fn encode_roster(roster: &Roster) -> String {
    if roster.is_empty() {
        Value::String(EMPTY_ROSTER_SENTINEL.to_string()).to_string()
    } else {
        // BTreeSet serializes in sorted order
        Value::from(roster.iter().cloned().collect::<Vec<_>>()).to_string()
    }
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

fn read_optional(path: &Path) -> Result<Option<String>, StateAnomaly> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StateAnomaly::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes to a sibling temp file, syncs it, renames it over `path` and syncs
/// the directory, so the target holds either the old or the new content
/// after a crash. The temp file is removed if any step fails.
fn write_durably(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let replaced = replace_with(&tmp_path, path, contents);
    if replaced.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    replaced?;

    sync_dir(parent)
}

fn replace_with(tmp_path: &Path, path: &Path, contents: &str) -> Result<()> {
    let mut file = File::create(tmp_path)
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    file.flush()?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", tmp_path.display()))?;
    drop(file);

    fs::rename(tmp_path, path)
        .with_context(|| format!("Failed to move {} into place", tmp_path.display()))
}

// Makes the rename itself durable
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|handle| handle.sync_all())
        .with_context(|| format!("Failed to sync directory {}", dir.display()))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{PlaytimeRecord, roster_from};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("last_players.txt"), dir.path().join("playtime.json"))
    }

    #[test]
    fn test_decode_accepts_every_empty_form() {
        for content in ["", "  \n", "null", "[]", "\"nobody\"", "\"никого\"", "\u{feff}[]"] {
            assert_eq!(decode_roster(content), Ok(Roster::new()), "content {content:?}");
        }
    }

    #[test]
    fn test_decode_deduplicates_names() {
        let roster = decode_roster(r#"["Bob", "Alice", "Bob"]"#).unwrap();
        assert_eq!(roster, roster_from(["Alice", "Bob"]));
    }

    #[test]
    fn test_decode_rejects_other_shapes() {
        for content in ["{not json", "\"somebody\"", "42", "{\"a\": 1}", "[\"Alice\", 7]"] {
            assert!(decode_roster(content).is_err(), "content {content:?}");
        }
    }

    #[test]
    fn test_encode_uses_sentinel_for_empty() {
        assert_eq!(encode_roster(&Roster::new()), "\"nobody\"");
        assert_eq!(encode_roster(&roster_from(["b", "a"])), r#"["a","b"]"#);
    }

    #[test]
    fn test_missing_files_load_empty_without_anomaly() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let roster = store.load_roster();
        assert!(roster.value.is_empty());
        assert!(roster.anomaly.is_none());

        let playtime = store.load_playtime();
        assert!(playtime.value.is_empty());
        assert!(playtime.anomaly.is_none());
    }

    #[test]
    fn test_roster_roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for roster in [roster_from(["Алиса", "Bob"]), Roster::new()] {
            store.save_roster(&roster).unwrap();
            let loaded = store.load_roster();
            assert_eq!(loaded.value, roster);
            assert!(loaded.anomaly.is_none());
        }

        let on_disk = fs::read_to_string(store.roster_path()).unwrap();
        assert_eq!(on_disk, "\"nobody\"");
    }

    #[test]
    fn test_malformed_roster_is_reported_and_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.roster_path(), "[\"Alice\"").unwrap();

        let loaded = store.load_roster();
        assert!(loaded.value.is_empty());
        assert!(matches!(loaded.anomaly, Some(StateAnomaly::Malformed { .. })));
    }

    #[test]
    fn test_unreadable_roster_is_reported_and_empty() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be cannot be read as text
        let store = StateStore::new(dir.path(), dir.path().join("playtime.json"));

        let loaded = store.load_roster();
        assert!(loaded.value.is_empty());
        assert!(matches!(loaded.anomaly, Some(StateAnomaly::Unreadable { .. })));
    }

    #[test]
    fn test_playtime_roundtrip_and_malformed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut table = PlaytimeTable::new();
        table.insert(
            "Alice".into(),
            PlaytimeRecord {
                total: 3600,
                session_start: Some(1_700_000_000.5),
            },
        );
        table.insert("Bob".into(), PlaytimeRecord::default());
        store.save_playtime(&table).unwrap();
        assert_eq!(store.load_playtime().value, table);

        fs::write(store.playtime_path(), "[1, 2]").unwrap();
        let loaded = store.load_playtime();
        assert!(loaded.value.is_empty());
        assert!(matches!(loaded.anomaly, Some(StateAnomaly::Malformed { .. })));
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("scripts");
        let store = StateStore::new(nested.join("last_players.txt"), nested.join("playtime.json"));

        store.save_roster(&roster_from(["Carol"])).unwrap();

        assert!(store.roster_path().exists());
        assert!(!nested.join("last_players.txt.tmp").exists());
    }

    #[test]
    fn test_failed_save_keeps_target_and_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a rename
        let target = dir.path().join("occupied");
        fs::create_dir_all(target.join("inner")).unwrap();
        let store = StateStore::new(target.clone(), dir.path().join("playtime.json"));

        assert!(store.save_roster(&roster_from(["Dana"])).is_err());

        assert!(target.join("inner").is_dir());
        assert!(!dir.path().join("occupied.tmp").exists());
    }
}
