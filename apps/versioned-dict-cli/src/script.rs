//! JSON operation scripts replayed against a `VersionedDict<Value>`.
//!
//! A script is a JSON array of objects tagged by `"op"`:
//! ```text
//! [
//!   { "op": "write", "key": "a", "value": 1 },
//!   { "op": "archive" },
//!   { "op": "delete", "key": "a" },
//!   { "op": "rewind", "version": 1 },
//!   { "op": "read", "key": "a" }
//! ]
//! ```

use serde::Deserialize;
use serde_json::Value;
use versioned_dict::{DictError, Version, VersionedDict};

/// A single scripted operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Write { key: String, value: Value },
    Delete { key: String },
    Read { key: String },
    Archive,
    Rewind { version: Version },
    StepBack,
    Snapshot { version: Version },
}

/// What a step produced, for printing.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Written { replaced: bool },
    Deleted(Value),
    Read(Value),
    Archived(Version),
    Rewound(Version),
    Snapshot(Value),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Written { replaced: true } => write!(f, "updated"),
            Self::Written { replaced: false } => write!(f, "inserted"),
            Self::Deleted(v) => write!(f, "deleted {v}"),
            Self::Read(v) => write!(f, "{v}"),
            Self::Archived(v) => write!(f, "archived as version {v}"),
            Self::Rewound(v) => write!(f, "at version {v}"),
            Self::Snapshot(v) => write!(f, "{v}"),
        }
    }
}

/// Apply one operation to `dict`.
pub fn apply(dict: &mut VersionedDict<Value>, op: &Op) -> Result<Outcome, DictError> {
    match op {
        Op::Write { key, value } => {
            let replaced = dict.insert(key.clone(), value.clone()).is_some();
            Ok(Outcome::Written { replaced })
        }
        Op::Delete { key } => dict.remove(key).map(Outcome::Deleted),
        Op::Read { key } => dict.get(key).cloned().map(Outcome::Read),
        Op::Archive => Ok(Outcome::Archived(dict.archive())),
        Op::Rewind { version } => dict.rewind(*version).map(Outcome::Rewound),
        Op::StepBack => dict.step_back().map(Outcome::Rewound),
        Op::Snapshot { version } => {
            let state = dict.snapshot(*version)?;
            Ok(Outcome::Snapshot(Value::Object(state.into_iter().collect())))
        }
    }
}

/// Build the starting dictionary from an optional JSON object.
pub fn seed(value: Option<Value>) -> anyhow::Result<VersionedDict<Value>> {
    match value {
        None => Ok(VersionedDict::new()),
        Some(Value::Object(entries)) => Ok(VersionedDict::from_entries(entries)),
        Some(other) => anyhow::bail!("seed must be a JSON object, got {other}"),
    }
}
