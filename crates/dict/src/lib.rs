//! Versioned dictionary: a string-keyed map that archives versions as
//! incremental deltas and rewinds by replaying them in reverse.
//!
//! # Invariants
//! - The live mapping always holds the most recent state.
//! - Each archived delta reverts exactly one archive step, top level only.
//! - Within a delta, added, removed and modified keys are disjoint.
//! - Version 0 is the empty baseline; the version is the archive stack length.
//! - A failed operation leaves the live mapping and the archive stack untouched.

pub mod delta;
pub mod dict;

pub use delta::Delta;
pub use dict::{DictError, Version, VersionedDict};
