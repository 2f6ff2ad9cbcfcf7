//! Change classification contract
//!
//! Deciding whether an edit is hotload-compatible is language-specific and
//! lives outside this crate. The orchestrator only consumes the verdict: for
//! each modified source item it asks the classifier to compare the cached IR
//! with the fresh one.

use crate::frontend::IrItem;

/// Hotload compatibility of one item change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeCompat {
    NoChange,
    /// Change can be applied to a running process in place
    Compatible,
    /// Change requires reloading the whole module
    Incompatible,
}

/// Classifier verdict for one modified item
#[derive(Clone, Debug)]
pub struct ChangeReport {
    pub compat: ChangeCompat,
    /// Human-readable summary of what changed
    pub description: String,
}

impl ChangeReport {
    pub fn new(compat: ChangeCompat, description: impl Into<String>) -> Self {
        Self {
            compat,
            description: description.into(),
        }
    }
}

/// Compares two versions of one source item's IR
pub trait ChangeClassifier: Send + Sync {
    fn classify(&self, old: &IrItem, new: &IrItem) -> ChangeReport;
}

/// Conservative classifier for frontends without language-aware diffing
///
/// Equal content hashes are no change; anything else is treated as
/// incompatible, forcing a full reload. Safe default, never a fast hotload.
pub struct TextChangeClassifier;

impl ChangeClassifier for TextChangeClassifier {
    fn classify(&self, old: &IrItem, new: &IrItem) -> ChangeReport {
        if old.hash == new.hash {
            ChangeReport::new(ChangeCompat::NoChange, "content unchanged")
        } else {
            ChangeReport::new(
                ChangeCompat::Incompatible,
                format!("'{}' text changed; no structural diff available", new.path),
            )
        }
    }
}
