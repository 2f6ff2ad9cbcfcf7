//! Hotload classification and rollback history
//!
//! A successful rebuild is applied to the running process either in place
//! ("fast hotload") or by swapping the whole module ("full reload"). Fast
//! hotloads can later be revoked by the runtime; the unit then falls back to
//! the newest surviving entry of its recent-binary history. History is only
//! meaningful as an unbroken chain of fast-hotloadable versions, so any
//! non-fast build clears it and starts a new chain.

use std::collections::BTreeMap;

use crate::classify::ChangeCompat;
use crate::frontend::BinaryHandle;
use crate::incremental::{ChangeKind, SourceChange};

/// How a successful rebuild is applied to the running process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HotloadOutcome {
    /// Changes are applied in place without reloading the module
    FastHotload,
    /// The whole module must be swapped
    FullReload,
    /// Hot reloading does not apply: the unit opted out, or this is the
    /// first build and nothing is running yet
    Unsupported,
}

/// Per-unit hotload state across builds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HotloadState {
    /// Baseline: a loaded version with no pending reload
    Stable(u64),
    /// Version applied in place on top of the current chain
    FastHotloaded(u64),
    /// Version awaiting a module swap by the reload system
    FullReloadPending(u64),
}

impl HotloadState {
    pub fn version(&self) -> u64 {
        match self {
            HotloadState::Stable(v)
            | HotloadState::FastHotloaded(v)
            | HotloadState::FullReloadPending(v) => *v,
        }
    }
}

/// Bounded version-ordered map of recent binaries
///
/// Rollback only ever needs "newest remaining version", which ordered-map
/// iteration answers directly. The cap evicts the oldest chain entries.
pub struct RecentBinaryHistory {
    capacity: usize,
    entries: BTreeMap<u64, BinaryHandle>,
}

impl RecentBinaryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: BTreeMap::new(),
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.pop_oldest();
        }
    }

    pub fn insert(&mut self, version: u64, handle: BinaryHandle) {
        self.entries.insert(version, handle);
        while self.entries.len() > self.capacity {
            self.pop_oldest();
        }
    }

    pub fn remove(&mut self, version: u64) -> Option<BinaryHandle> {
        self.entries.remove(&version)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Newest surviving entry
    pub fn newest(&self) -> Option<(u64, BinaryHandle)> {
        self.entries
            .iter()
            .next_back()
            .map(|(v, h)| (*v, h.clone()))
    }

    pub fn contains(&self, version: u64) -> bool {
        self.entries.contains_key(&version)
    }

    pub fn versions(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn pop_oldest(&mut self) {
        if let Some(oldest) = self.entries.keys().next().copied() {
            self.entries.remove(&oldest);
        }
    }
}

/// Classify how a successful rebuild should be applied
///
/// `first_build` and a unit-level opt-out short-circuit to `Unsupported`.
/// Structural changes (items added or removed) and any incompatible item
/// force a full reload, as does the group-level fast-hotload switch being
/// off.
pub fn classify_rebuild(
    summary: &[SourceChange],
    group_allows_fast: bool,
    unit_allows_hotload: bool,
    first_build: bool,
) -> HotloadOutcome {
    if !unit_allows_hotload || first_build {
        return HotloadOutcome::Unsupported;
    }
    if !group_allows_fast {
        return HotloadOutcome::FullReload;
    }

    let structural = summary
        .iter()
        .any(|c| matches!(c.kind, ChangeKind::Added | ChangeKind::Removed));
    let incompatible = summary
        .iter()
        .filter(|c| c.kind == ChangeKind::Modified)
        .any(|c| {
            c.report
                .as_ref()
                .map(|r| r.compat == ChangeCompat::Incompatible)
                // A modified entry without a verdict cannot be proven safe
                .unwrap_or(true)
        });

    if structural || incompatible {
        HotloadOutcome::FullReload
    } else {
        HotloadOutcome::FastHotload
    }
}
