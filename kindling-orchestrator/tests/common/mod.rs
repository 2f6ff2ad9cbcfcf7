//! Shared fixtures for coordinator-level tests
//!
//! The mock frontend treats source text as its own IR: references are
//! declared with `use NAME;` lines, and emission concatenates every item's
//! text. Failure points and classifier verdicts are scripted per test.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use kindling_orchestrator::{
    ChangeClassifier, ChangeCompat, ChangeReport, Diagnostic, Emission, Frontend, FrontendError,
    IrItem, IrNode, ResolvedReference, SecurityValidator, UnitConfig, Verdict,
};

/// Scriptable frontend whose IR is the source text itself
#[derive(Default)]
pub struct MockFrontend {
    pub parses: AtomicUsize,
    pub reparses: AtomicUsize,
    pub emits: AtomicUsize,
    fail_parse_paths: Mutex<HashSet<String>>,
    fail_emit_units: Mutex<HashSet<String>>,
    emitted: Mutex<HashMap<String, Vec<ResolvedReference>>>,
}

impl MockFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make parsing of one path fail until cleared
    pub fn fail_parse(&self, path: &str) {
        self.fail_parse_paths.lock().insert(path.to_string());
    }

    pub fn clear_parse_failures(&self) {
        self.fail_parse_paths.lock().clear();
    }

    /// Make emission of one unit fail
    pub fn fail_emit(&self, unit: &str) {
        self.fail_emit_units.lock().insert(unit.to_string());
    }

    /// References handed to the most recent emit of `unit`
    pub fn emitted_references(&self, unit: &str) -> Vec<ResolvedReference> {
        self.emitted.lock().get(unit).cloned().unwrap_or_default()
    }

    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn reparse_count(&self) -> usize {
        self.reparses.load(Ordering::SeqCst)
    }
}

impl Frontend for MockFrontend {
    fn parse(&self, path: &str, source: &str, _config: &UnitConfig) -> Result<IrNode, FrontendError> {
        if self.fail_parse_paths.lock().contains(path) {
            return Err(FrontendError::Parse {
                path: path.to_string(),
                message: "scripted parse failure".to_string(),
            });
        }
        self.parses.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(source.to_string()))
    }

    fn reparse(
        &self,
        _previous: &IrNode,
        path: &str,
        source: &str,
        _config: &UnitConfig,
    ) -> Result<IrNode, FrontendError> {
        if self.fail_parse_paths.lock().contains(path) {
            return Err(FrontendError::Parse {
                path: path.to_string(),
                message: "scripted parse failure".to_string(),
            });
        }
        self.reparses.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(source.to_string()))
    }

    fn references(&self, node: &IrNode) -> Vec<String> {
        let Some(text) = node.downcast_ref::<String>() else {
            return Vec::new();
        };
        text.lines()
            .filter_map(|line| {
                line.trim()
                    .strip_prefix("use ")
                    .map(|rest| rest.trim_end_matches(';').trim().to_string())
            })
            .collect()
    }

    fn emit(
        &self,
        unit: &str,
        items: &[IrItem],
        references: &[ResolvedReference],
    ) -> Result<Emission, FrontendError> {
        if self.fail_emit_units.lock().contains(unit) {
            return Err(FrontendError::Emit(format!(
                "scripted emit failure for '{unit}'"
            )));
        }
        self.emits.fetch_add(1, Ordering::SeqCst);
        self.emitted
            .lock()
            .insert(unit.to_string(), references.to_vec());

        let mut data = Vec::new();
        for item in items {
            if let Some(text) = item.node.downcast_ref::<String>() {
                data.extend_from_slice(text.as_bytes());
                data.push(b'\n');
            }
        }
        Ok(Emission {
            data,
            diagnostics: Vec::new(),
        })
    }
}

/// Classifier with a scripted verdict per source path
#[derive(Default)]
pub struct ScriptedClassifier {
    verdicts: Mutex<HashMap<String, ChangeCompat>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: &str, compat: ChangeCompat) {
        self.verdicts.lock().insert(path.to_string(), compat);
    }
}

impl ChangeClassifier for ScriptedClassifier {
    fn classify(&self, _old: &IrItem, new: &IrItem) -> ChangeReport {
        let compat = self
            .verdicts
            .lock()
            .get(&new.path)
            .copied()
            .unwrap_or(ChangeCompat::Compatible);
        ChangeReport::new(compat, format!("scripted verdict for '{}'", new.path))
    }
}

/// Validator that rejects scripted unit names
#[derive(Default)]
pub struct DenyListValidator {
    rejected: Mutex<HashSet<String>>,
}

impl DenyListValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, unit: &str) {
        self.rejected.lock().insert(unit.to_string());
    }
}

impl SecurityValidator for DenyListValidator {
    fn validate(&self, binary: &kindling_orchestrator::BinaryBlob) -> Verdict {
        if self.rejected.lock().contains(&binary.name) {
            Verdict::reject(vec![Diagnostic::error(format!(
                "binary '{}' uses a forbidden API",
                binary.name
            ))])
        } else {
            Verdict::pass()
        }
    }
}
