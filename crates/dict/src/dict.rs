use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, btree_map};

use crate::delta::Delta;

/// Number of archive operations performed so far. Version 0 is the empty baseline.
pub type Version = usize;

/// Errors from dictionary operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DictError {
    #[error("key {0:?} not found")]
    KeyNotFound(String),
    #[error("no version {requested}: available versions are 0..={current}")]
    InvalidVersion { requested: Version, current: Version },
    #[error("rewind impossible: no archived versions")]
    NothingToRewind,
    #[error("history does not replay at version {version}: key {key:?}")]
    InconsistentHistory { version: Version, key: String },
}

/// A string-keyed dictionary with incremental version archiving.
///
/// Reads and writes go straight to the live mapping. `archive()` diffs the
/// live mapping against the last archived state and pushes only the
/// difference onto the archive stack; `rewind()` pops records and reverts
/// them until the requested version is reached.
///
/// Archived values are owned clones taken at archive time, so mutating a live
/// value (even in place through [`get_mut`](Self::get_mut)) never reaches into
/// the history. Value types with shared interior state clone the way their own
/// `Clone` impl does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawVersionedDict<V>")]
pub struct VersionedDict<V> {
    live: BTreeMap<String, V>,
    /// Top-level copy of the state as of the latest archive.
    archived: BTreeMap<String, V>,
    /// `history[i]` reverts version `i + 1` to version `i`.
    history: Vec<Delta<V>>,
}

/// Unchecked wire form; validated into a `VersionedDict` on deserialize.
#[derive(Deserialize)]
struct RawVersionedDict<V> {
    live: BTreeMap<String, V>,
    archived: BTreeMap<String, V>,
    history: Vec<Delta<V>>,
}

impl<V> TryFrom<RawVersionedDict<V>> for VersionedDict<V> {
    type Error = DictError;

    /// Replays the key sets of `history` backwards from `archived` and
    /// requires every record to apply cleanly down to the empty baseline.
    fn try_from(raw: RawVersionedDict<V>) -> Result<Self, Self::Error> {
        let mut keys: BTreeSet<&str> = raw.archived.keys().map(String::as_str).collect();
        for (i, delta) in raw.history.iter().enumerate().rev() {
            let version = i + 1;
            let bad = |key: &str| DictError::InconsistentHistory {
                version,
                key: key.to_string(),
            };
            for key in delta.removed.keys() {
                if keys.contains(key.as_str()) {
                    return Err(bad(key.as_str()));
                }
            }
            for key in delta.modified.keys() {
                if !keys.contains(key.as_str()) || delta.added.contains(key) {
                    return Err(bad(key.as_str()));
                }
            }
            for key in &delta.added {
                if !keys.remove(key.as_str()) {
                    return Err(bad(key.as_str()));
                }
            }
            keys.extend(delta.removed.keys().map(String::as_str));
        }
        if let Some(key) = keys.first() {
            return Err(DictError::InconsistentHistory {
                version: 0,
                key: key.to_string(),
            });
        }

        Ok(Self {
            live: raw.live,
            archived: raw.archived,
            history: raw.history,
        })
    }
}

impl<V> Default for VersionedDict<V> {
    fn default() -> Self {
        Self {
            live: BTreeMap::new(),
            archived: BTreeMap::new(),
            history: Vec::new(),
        }
    }
}

impl<V> VersionedDict<V> {
    /// Create an empty dictionary at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dictionary seeded with `entries`.
    ///
    /// The seed is a pending change against the empty baseline: the first
    /// `archive()` records every seeded key as added.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        Self {
            live: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::default()
        }
    }

    /// Current version, i.e. the number of archived transitions.
    pub fn version(&self) -> Version {
        self.history.len()
    }

    /// Whether `version` can be looked up or rewound to.
    pub fn is_valid_version(&self, version: Version) -> bool {
        version <= self.version()
    }

    /// Live value for `key`.
    pub fn get(&self, key: &str) -> Result<&V, DictError> {
        self.live
            .get(key)
            .ok_or_else(|| DictError::KeyNotFound(key.to_string()))
    }

    /// Mutable access to the live value for `key`.
    pub fn get_mut(&mut self, key: &str) -> Result<&mut V, DictError> {
        self.live
            .get_mut(key)
            .ok_or_else(|| DictError::KeyNotFound(key.to_string()))
    }

    /// Insert or overwrite `key` in the live mapping. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        tracing::trace!(%key, "write");
        self.live.insert(key, value)
    }

    /// Remove `key` from the live mapping and return its value.
    pub fn remove(&mut self, key: &str) -> Result<V, DictError> {
        let value = self
            .live
            .remove(key)
            .ok_or_else(|| DictError::KeyNotFound(key.to_string()))?;
        tracing::trace!(key, "delete");
        Ok(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.live.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, V> {
        self.live.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, V> {
        self.live.keys()
    }

    /// Read-only view of the live mapping.
    pub fn as_map(&self) -> &BTreeMap<String, V> {
        &self.live
    }

    /// The archive stack, oldest first.
    pub fn history(&self) -> &[Delta<V>] {
        &self.history
    }

    /// The record produced by the archive that created `version`.
    ///
    /// `None` for version 0 and for versions not archived yet.
    pub fn delta(&self, version: Version) -> Option<&Delta<V>> {
        version.checked_sub(1).and_then(|i| self.history.get(i))
    }

    /// Keys present at `version`, without cloning any values.
    pub fn keys_at(&self, version: Version) -> Result<BTreeSet<String>, DictError> {
        self.check_version(version)?;
        let mut keys: BTreeSet<String> = self.archived.keys().cloned().collect();
        for delta in self.history[version..].iter().rev() {
            for key in &delta.added {
                keys.remove(key);
            }
            keys.extend(delta.removed.keys().cloned());
        }
        Ok(keys)
    }

    /// Value of `key` as it was at `version`.
    pub fn get_at(&self, key: &str, version: Version) -> Result<&V, DictError> {
        self.check_version(version)?;
        let mut value = self.archived.get(key);
        for delta in self.history[version..].iter().rev() {
            if delta.added.contains(key) {
                value = None;
            } else if let Some(old) = delta.removed.get(key).or_else(|| delta.modified.get(key)) {
                value = Some(old);
            }
        }
        value.ok_or_else(|| DictError::KeyNotFound(key.to_string()))
    }

    fn check_version(&self, version: Version) -> Result<(), DictError> {
        if self.is_valid_version(version) {
            Ok(())
        } else {
            Err(DictError::InvalidVersion {
                requested: version,
                current: self.version(),
            })
        }
    }
}

impl<V: Clone + PartialEq> VersionedDict<V> {
    /// Archive the live mapping as a new version and return its number.
    ///
    /// Only keys that changed since the last archive are cloned.
    pub fn archive(&mut self) -> Version {
        let delta = Delta::between(&self.archived, &self.live);
        for key in delta.added.iter().chain(delta.modified.keys()) {
            if let Some(value) = self.live.get(key) {
                self.archived.insert(key.clone(), value.clone());
            }
        }
        for key in delta.removed.keys() {
            self.archived.remove(key);
        }

        tracing::debug!(
            version = self.history.len() + 1,
            added = delta.added.len(),
            removed = delta.removed.len(),
            modified = delta.modified.len(),
            "archived version"
        );
        self.history.push(delta);
        self.history.len()
    }

    /// Restore the state right after the archive that produced `target`.
    ///
    /// Pending live changes are discarded, so `rewind(version())` resets the
    /// live mapping to the last archive. Records above `target` are
    /// dropped and cannot be re-applied. Fails without touching anything if
    /// `target` is beyond the current version.
    pub fn rewind(&mut self, target: Version) -> Result<Version, DictError> {
        self.check_version(target)?;
        let from = self.version();

        let pending = Delta::between(&self.archived, &self.live);
        if !pending.is_empty() {
            tracing::debug!(keys = pending.len(), "discarding pending changes");
        }
        pending.revert_into(&mut self.live);

        for delta in self.history.drain(target..).rev() {
            delta.revert(&mut self.live);
            delta.revert_into(&mut self.archived);
        }

        tracing::debug!(from, to = target, "rewound");
        Ok(target)
    }

    /// Rewind by exactly one version.
    pub fn step_back(&mut self) -> Result<Version, DictError> {
        match self.version().checked_sub(1) {
            Some(target) => self.rewind(target),
            None => Err(DictError::NothingToRewind),
        }
    }

    /// What the next `archive()` would record.
    pub fn pending(&self) -> Delta<V> {
        Delta::between(&self.archived, &self.live)
    }

    /// Whether the live mapping differs from the last archived state.
    pub fn has_pending_changes(&self) -> bool {
        self.live != self.archived
    }

    /// Reconstruct the state at `version` without rewinding.
    pub fn snapshot(&self, version: Version) -> Result<BTreeMap<String, V>, DictError> {
        self.check_version(version)?;
        let mut state = self.archived.clone();
        for delta in self.history[version..].iter().rev() {
            delta.revert(&mut state);
        }
        Ok(state)
    }

    /// The record that takes the state at `to` back to the state at `from`.
    pub fn diff(&self, from: Version, to: Version) -> Result<Delta<V>, DictError> {
        let prior = self.snapshot(from)?;
        let current = self.snapshot(to)?;
        Ok(Delta::between(&prior, &current))
    }
}

impl<'a, V> IntoIterator for &'a VersionedDict<V> {
    type Item = (&'a String, &'a V);
    type IntoIter = btree_map::Iter<'a, String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.live.iter()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for VersionedDict<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}
