//! Destination registry
//!
//! Subscribed destinations and their delivery watermarks, persisted as
//! a small JSON document:
//!
//! ```json
//! {"chats": {"-100123": {"PR": "2024-03-03T10:00:00"}}}
//! ```
//!
//! Older versions of the bot stored the last delivered listing id (an
//! integer) instead of a timestamp. Such values are dropped on load and
//! the destination falls back to the default lookback.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sgpr_common::{Category, DestinationId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use super::tracker::{Progress, Watermarks};

pub const REGISTRY_FILE: &str = "destinations.json";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid registry file {path:?}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    chats: BTreeMap<String, BTreeMap<String, StoredWatermark>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredWatermark {
    Timestamp(NaiveDateTime),
    /// Last delivered listing id, written by older versions
    LegacyId(i64),
    Other(serde_json::Value),
}

/// Watermarks handed to one delivery cycle, tagged with the registry
/// generation they were taken at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    pub progress: Progress,
}

#[derive(Debug, Clone)]
pub struct DestinationRegistry {
    path: PathBuf,
    destinations: Progress,
    /// Bumped on every subscription
    generation: u64,
    /// Generation each destination was subscribed at; 0 for loaded ones
    subscribed_at: BTreeMap<DestinationId, u64>,
}

impl DestinationRegistry {
    /// Empty registry that will be saved to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            destinations: Progress::new(),
            generation: 0,
            subscribed_at: BTreeMap::new(),
        }
    }

    /// Load the registry from `path`; a missing file is an empty registry.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            debug!("Registry file does not exist: {:?}", path);
            return Ok(Self::new(path));
        }

        let content = fs::read_to_string(&path).await.map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;
        let file: RegistryFile = serde_json::from_str(&content).map_err(|source| RegistryError::Format {
            path: path.clone(),
            source,
        })?;

        let destinations = file
            .chats
            .into_iter()
            .map(|(id, stored)| {
                let id = DestinationId::new(id);
                let marks = Self::decode_watermarks(&id, stored);
                (id, marks)
            })
            .collect::<Progress>();

        info!("Loaded {} destinations from {:?}", destinations.len(), path);
        let subscribed_at = destinations.keys().map(|id| (id.clone(), 0)).collect();
        Ok(Self {
            path,
            destinations,
            generation: 0,
            subscribed_at,
        })
    }

    fn decode_watermarks(id: &DestinationId, stored: BTreeMap<String, StoredWatermark>) -> Watermarks {
        let mut marks = Watermarks::new();
        for (key, value) in stored {
            let category = match key.parse::<Category>() {
                Ok(category) => category,
                Err(e) => {
                    warn!("Dropping watermark of {}: {}", id, e);
                    continue;
                }
            };
            match value {
                StoredWatermark::Timestamp(ts) => {
                    marks.insert(category, ts);
                }
                StoredWatermark::LegacyId(last_id) => {
                    debug!("Dropping legacy {} watermark (id {}) of {}", category, last_id, id);
                }
                StoredWatermark::Other(value) => {
                    warn!("Dropping unreadable {} watermark of {}: {}", category, id, value);
                }
            }
        }
        marks
    }

    /// Write the registry as pretty JSON, replacing the previous file.
    pub async fn save(&self) -> Result<(), RegistryError> {
        let io_err = |source| RegistryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let file = RegistryFile {
            chats: self
                .destinations
                .iter()
                .map(|(id, marks)| {
                    let stored = marks
                        .iter()
                        .map(|(category, ts)| (category.to_string(), StoredWatermark::Timestamp(*ts)))
                        .collect();
                    (id.to_string(), stored)
                })
                .collect(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| RegistryError::Format {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).await.map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).await.map_err(io_err)?;

        debug!("Saved {} destinations to {:?}", self.destinations.len(), self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe a destination with no watermarks. Returns `false` if it
    /// was already subscribed.
    pub fn add(&mut self, id: DestinationId) -> bool {
        if self.destinations.contains_key(&id) {
            return false;
        }
        self.generation += 1;
        self.subscribed_at.insert(id.clone(), self.generation);
        self.destinations.insert(id, Watermarks::new());
        true
    }

    pub fn remove(&mut self, id: &DestinationId) -> bool {
        self.subscribed_at.remove(id);
        self.destinations.remove(id).is_some()
    }

    pub fn destinations(&self) -> &Progress {
        &self.destinations
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Copy of every destination's watermarks for one delivery cycle
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.generation,
            progress: self.destinations.clone(),
        }
    }

    /// Fold a cycle's progress back in. Watermarks only move forward.
    /// Destinations removed during the cycle stay removed, and one removed
    /// then subscribed again starts over without the stale watermarks.
    pub fn merge_snapshot(&mut self, snapshot: Snapshot) {
        for (id, marks) in snapshot.progress {
            let resubscribed = self
                .subscribed_at
                .get(&id)
                .is_some_and(|&generation| generation > snapshot.generation);
            let current = match self.destinations.get_mut(&id) {
                Some(current) if !resubscribed => current,
                _ => {
                    debug!("Destination {} changed during the cycle, dropping its progress", id);
                    continue;
                }
            };
            for (category, ts) in marks {
                let mark = current.entry(category).or_insert(ts);
                if *mark < ts {
                    *mark = ts;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_registry() {
        let temp_dir = TempDir::new().unwrap();
        let registry = DestinationRegistry::load(temp_dir.path().join(REGISTRY_FILE)).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(REGISTRY_FILE);

        let mut registry = DestinationRegistry::new(&path);
        assert!(registry.add(DestinationId::from(-100123)));
        assert!(registry.add(DestinationId::new("@sgprapp")));
        assert!(!registry.add(DestinationId::from(-100123)));
        let mut snapshot = registry.snapshot();
        snapshot.progress.insert(
            DestinationId::from(-100123),
            Watermarks::from([(Category::PR, ts(3, 10))]),
        );
        registry.merge_snapshot(snapshot);
        registry.save().await.unwrap();

        let loaded = DestinationRegistry::load(&path).await.unwrap();
        assert_eq!(loaded.destinations(), registry.destinations());
        assert_eq!(
            loaded.destinations()[&DestinationId::from(-100123)][&Category::PR],
            ts(3, 10)
        );
        assert!(loaded.destinations()[&DestinationId::new("@sgprapp")].is_empty());
    }

    #[tokio::test]
    async fn test_legacy_and_unknown_watermarks_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REGISTRY_FILE);
        let legacy = r#"{"chats": {
            "1": {"PR": 1523, "Citizen": "2024-03-02T09:00:00"},
            "2": {"PR": "not a time", "Unknown": "2024-03-02T09:00:00"},
            "3": {"Citizen": 77}
        }}"#;
        tokio::fs::write(&path, legacy).await.unwrap();

        let registry = DestinationRegistry::load(&path).await.unwrap();
        let destinations = registry.destinations();
        assert_eq!(destinations.len(), 3);
        assert_eq!(
            destinations[&DestinationId::from(1)],
            Watermarks::from([(Category::Citizen, ts(2, 9))])
        );
        assert!(destinations[&DestinationId::from(2)].is_empty());
        assert!(destinations[&DestinationId::from(3)].is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REGISTRY_FILE);
        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(
            DestinationRegistry::load(&path).await,
            Err(RegistryError::Format { .. })
        ));
    }

    #[test]
    fn test_merge_is_monotonic_and_skips_removed() {
        let mut registry = DestinationRegistry::new("unused.json");
        registry.add(DestinationId::from(1));
        registry.add(DestinationId::from(2));
        registry.add(DestinationId::from(9));

        let mut first = registry.snapshot();
        first
            .progress
            .insert(DestinationId::from(1), Watermarks::from([(Category::PR, ts(3, 10))]));
        registry.merge_snapshot(first);

        let mut stale = registry.snapshot();
        stale.progress.insert(
            DestinationId::from(1),
            Watermarks::from([(Category::PR, ts(2, 9)), (Category::Citizen, ts(1, 8))]),
        );
        stale
            .progress
            .insert(DestinationId::from(9), Watermarks::from([(Category::PR, ts(2, 9))]));
        registry.remove(&DestinationId::from(9));
        registry.merge_snapshot(stale);

        let destinations = registry.destinations();
        assert_eq!(destinations.len(), 2);
        assert_eq!(destinations[&DestinationId::from(1)][&Category::PR], ts(3, 10));
        assert_eq!(destinations[&DestinationId::from(1)][&Category::Citizen], ts(1, 8));
        assert!(!destinations.contains_key(&DestinationId::from(9)));
    }

    #[test]
    fn test_resubscribed_destination_starts_over() {
        let mut registry = DestinationRegistry::new("unused.json");
        registry.add(DestinationId::from(1));
        registry.add(DestinationId::from(2));

        let mut snapshot = registry.snapshot();
        for marks in snapshot.progress.values_mut() {
            marks.insert(Category::PR, ts(3, 10));
        }

        // Removed and added back while the cycle was running.
        registry.remove(&DestinationId::from(1));
        registry.add(DestinationId::from(1));
        registry.merge_snapshot(snapshot);

        let destinations = registry.destinations();
        assert!(destinations[&DestinationId::from(1)].is_empty());
        assert_eq!(destinations[&DestinationId::from(2)][&Category::PR], ts(3, 10));
    }

    #[tokio::test]
    async fn test_loaded_destinations_accept_progress() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REGISTRY_FILE);
        tokio::fs::write(&path, r#"{"chats": {"5": {}}}"#).await.unwrap();

        let mut registry = DestinationRegistry::load(&path).await.unwrap();
        let mut snapshot = registry.snapshot();
        snapshot
            .progress
            .insert(DestinationId::from(5), Watermarks::from([(Category::PR, ts(3, 10))]));
        registry.merge_snapshot(snapshot);
        assert_eq!(registry.destinations()[&DestinationId::from(5)][&Category::PR], ts(3, 10));
    }

    #[test]
    fn test_remove() {
        let mut registry = DestinationRegistry::new("unused.json");
        registry.add(DestinationId::from(1));
        assert!(registry.remove(&DestinationId::from(1)));
        assert!(!registry.remove(&DestinationId::from(1)));
        assert!(registry.is_empty());
    }
}
