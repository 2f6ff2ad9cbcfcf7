//! Incremental build state
//!
//! Each unit caches the IR snapshot and binary handle of its last successful
//! build. The cache answers two questions for the next pass: does the
//! frontend need to start from scratch, and what exactly changed since the
//! committed state. The second answer feeds the hotload decision.

use tracing::debug;

use kindling_config::UnitConfig;

use crate::classify::{ChangeClassifier, ChangeReport};
use crate::error::FrontendError;
use crate::frontend::{BinaryHandle, Frontend, IrItem};
use crate::source::SourceHash;

/// IR of every source item of one unit, keyed by path, in source order
#[derive(Clone, Default)]
pub struct Snapshot {
    items: Vec<IrItem>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: IrItem) {
        self.items.push(item);
    }

    pub fn get(&self, path: &str) -> Option<&IrItem> {
        self.items.iter().find(|item| item.path == path)
    }

    pub fn items(&self) -> &[IrItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the snapshot covers exactly the given path set
    fn covers(&self, paths: &[String]) -> bool {
        self.items.len() == paths.len() && paths.iter().all(|p| self.get(p).is_some())
    }
}

/// What happened to one source item relative to the committed snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// One entry of a change summary
#[derive(Clone, Debug)]
pub struct SourceChange {
    pub path: String,
    pub kind: ChangeKind,
    /// Classifier verdict, present on `Modified` entries
    pub report: Option<ChangeReport>,
}

/// Per-unit cache of the last successful build
///
/// Owned exclusively by its unit; mutated only by that unit's own build
/// steps. Both fields are replaced together at commit so a reader between
/// passes always sees a matching snapshot/binary pair.
#[derive(Default)]
pub struct IncrementalState {
    snapshot: Option<Snapshot>,
    binary: Option<BinaryHandle>,
}

impl IncrementalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scratch state over a cloned snapshot, for use on a worker thread while
    /// the owning unit's state stays behind its lock
    pub(crate) fn with_snapshot(snapshot: Option<Snapshot>) -> Self {
        Self {
            snapshot,
            binary: None,
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Binary handle of the last successful build
    pub fn previous_binary(&self) -> Option<&BinaryHandle> {
        self.binary.as_ref()
    }

    /// Discard everything, as a configuration change requires
    pub fn invalidate(&mut self) {
        self.snapshot = None;
        self.binary = None;
    }

    /// Whether the next frontend pass must reparse everything
    ///
    /// True when the configuration changed, no prior snapshot exists, or the
    /// source item set itself changed. A pure text edit of a known item is
    /// not a full pass; it is merged item by item.
    pub fn needs_full_pass(&self, config_changed: bool, current_paths: &[String]) -> bool {
        if config_changed {
            return true;
        }
        match &self.snapshot {
            None => true,
            Some(snapshot) => !snapshot.covers(current_paths),
        }
    }

    /// Produce the IR for one source item, reusing cached work where the
    /// content hash allows it
    pub fn merge_source_item(
        &self,
        frontend: &dyn Frontend,
        config: &UnitConfig,
        path: &str,
        text: &str,
    ) -> Result<IrItem, FrontendError> {
        let hash = SourceHash::of(text);
        let previous = self.snapshot.as_ref().and_then(|s| s.get(path));
        match previous {
            Some(item) if item.hash == hash => {
                debug!(target: "kindling::incremental", path, "reusing cached item");
                Ok(item.clone())
            }
            Some(item) => {
                debug!(target: "kindling::incremental", path, "re-texting cached item");
                let node = frontend.reparse(&item.node, path, text, config)?;
                Ok(IrItem {
                    path: path.to_string(),
                    hash,
                    node,
                })
            }
            None => {
                let node = frontend.parse(path, text, config)?;
                Ok(IrItem {
                    path: path.to_string(),
                    hash,
                    node,
                })
            }
        }
    }

    /// Diff a candidate snapshot against the committed one
    ///
    /// Entries come back in candidate order, followed by removals in
    /// committed order. On the very first build there is nothing to diff
    /// against and the summary is empty.
    pub fn change_summary(
        &self,
        candidate: &Snapshot,
        classifier: &dyn ChangeClassifier,
    ) -> Vec<SourceChange> {
        let Some(previous) = &self.snapshot else {
            return Vec::new();
        };

        let mut summary = Vec::with_capacity(candidate.len());
        for item in candidate.items() {
            match previous.get(&item.path) {
                None => summary.push(SourceChange {
                    path: item.path.clone(),
                    kind: ChangeKind::Added,
                    report: None,
                }),
                Some(old) if old.hash == item.hash => summary.push(SourceChange {
                    path: item.path.clone(),
                    kind: ChangeKind::Unchanged,
                    report: None,
                }),
                Some(old) => summary.push(SourceChange {
                    path: item.path.clone(),
                    kind: ChangeKind::Modified,
                    report: Some(classifier.classify(old, item)),
                }),
            }
        }
        for item in previous.items() {
            if candidate.get(&item.path).is_none() {
                summary.push(SourceChange {
                    path: item.path.clone(),
                    kind: ChangeKind::Removed,
                    report: None,
                });
            }
        }
        summary
    }

    /// Replace the committed pair with the result of a successful build
    ///
    /// Both fields swap together; callers hold the unit lock, so no reader
    /// can observe a snapshot from one build paired with a binary from
    /// another.
    pub fn commit(&mut self, snapshot: Snapshot, binary: BinaryHandle) {
        self.snapshot = Some(snapshot);
        self.binary = Some(binary);
    }
}
