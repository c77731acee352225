use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The undo record for one archive step.
///
/// Reverting a delta onto the state it was computed against yields the state
/// it was computed from. Only the top level of the mapping is compared; values
/// are opaque and checked with `PartialEq`.
///
/// A key appears in at most one of `added`, `removed` and `modified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta<V> {
    /// Keys introduced since the prior version. Removed on revert.
    pub added: BTreeSet<String>,
    /// Keys deleted since the prior version, with their former values.
    pub removed: BTreeMap<String, V>,
    /// Keys whose value changed since the prior version, with their prior values.
    pub modified: BTreeMap<String, V>,
}

impl<V> Default for Delta<V> {
    fn default() -> Self {
        Self {
            added: BTreeSet::new(),
            removed: BTreeMap::new(),
            modified: BTreeMap::new(),
        }
    }
}

impl<V> Delta<V> {
    /// Whether the step changed nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Number of keys touched by the step.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Whether `key` was added, removed or modified in this step.
    pub fn touches(&self, key: &str) -> bool {
        self.added.contains(key)
            || self.removed.contains_key(key)
            || self.modified.contains_key(key)
    }

    /// Undo the step on `state`, moving the recorded values into it.
    pub fn revert_into(self, state: &mut BTreeMap<String, V>) {
        for key in &self.added {
            state.remove(key);
        }
        state.extend(self.removed);
        state.extend(self.modified);
    }
}

impl<V: Clone + PartialEq> Delta<V> {
    /// Compute the record that takes `current` back to `prior`.
    pub fn between(prior: &BTreeMap<String, V>, current: &BTreeMap<String, V>) -> Self {
        let mut delta = Self::default();
        for (key, value) in current {
            match prior.get(key) {
                None => {
                    delta.added.insert(key.clone());
                }
                Some(old) if old != value => {
                    delta.modified.insert(key.clone(), old.clone());
                }
                Some(_) => {}
            }
        }
        for (key, old) in prior {
            if !current.contains_key(key) {
                delta.removed.insert(key.clone(), old.clone());
            }
        }
        delta
    }

    /// Undo the step on `state`, leaving the record intact.
    pub fn revert(&self, state: &mut BTreeMap<String, V>) {
        for key in &self.added {
            state.remove(key);
        }
        for (key, old) in self.removed.iter().chain(&self.modified) {
            state.insert(key.clone(), old.clone());
        }
    }
}
