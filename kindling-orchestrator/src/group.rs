//! Build groups
//!
//! A `BuildGroup` owns the name-to-unit registry and runs build passes over
//! it. One pass: allocate every unit's future (so siblings can await builds
//! that have not started), fan the units out as concurrent tasks, join them,
//! compute the assembly load order over the successful binaries, classify
//! each unit's hotload outcome, and publish the aggregate result.
//!
//! The registry is read concurrently during reference resolution but only
//! mutated between passes; adding or removing units mid-pass is rejected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info};

use kindling_config::UnitConfig;

use crate::classify::{ChangeClassifier, TextChangeClassifier};
use crate::error::BuildError;
use crate::frontend::{BinaryHandle, Frontend};
use crate::ordering::resolve_load_order;
use crate::output::{BuildGroupResult, UnitResult};
use crate::resolve::{NullResolver, ReferenceResolver};
use crate::source::SourceProvider;
use crate::unit::{CompileUnit, PassContext};
use crate::validate::SecurityValidator;
use crate::version::{process_counter, VersionCounter};

/// A named collection of compile units built together
pub struct BuildGroup {
    /// Units in registration order; names unique
    units: RwLock<Vec<Arc<CompileUnit>>>,
    building: AtomicBool,
    allow_fast_hotload: AtomicBool,
    last_result: Mutex<Option<Arc<BuildGroupResult>>>,

    frontend: Arc<dyn Frontend>,
    resolver: Arc<dyn ReferenceResolver>,
    validator: Option<Arc<dyn SecurityValidator>>,
    classifier: Arc<dyn ChangeClassifier>,
    versions: Arc<dyn VersionCounter>,
}

impl BuildGroup {
    /// Create a group around a frontend, with default collaborators
    ///
    /// Defaults: no external resolver, no validator, the conservative text
    /// classifier, and the process-wide version counter.
    pub fn new(frontend: Arc<dyn Frontend>) -> Self {
        Self {
            units: RwLock::new(Vec::new()),
            building: AtomicBool::new(false),
            allow_fast_hotload: AtomicBool::new(true),
            last_result: Mutex::new(None),
            frontend,
            resolver: Arc::new(NullResolver),
            validator: None,
            classifier: Arc::new(TextChangeClassifier),
            versions: process_counter(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ReferenceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SecurityValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ChangeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Inject a version counter, for tests that assert exact versions
    pub fn with_version_counter(mut self, versions: Arc<dyn VersionCounter>) -> Self {
        self.versions = versions;
        self
    }

    /// Register a new unit
    pub fn add_unit(
        &self,
        name: impl Into<String>,
        sources: Vec<Arc<dyn SourceProvider>>,
        config: UnitConfig,
    ) -> Result<Arc<CompileUnit>, BuildError> {
        let name = name.into();
        if self.is_building() {
            return Err(BuildError::InvalidOperation(format!(
                "cannot add unit '{name}' during a build pass"
            )));
        }
        let mut units = self.units.write();
        if units.iter().any(|u| u.name() == name) {
            return Err(BuildError::InvalidOperation(format!(
                "unit '{name}' already registered"
            )));
        }
        let unit = Arc::new(CompileUnit::new(name, sources, config)?);
        units.push(unit.clone());
        Ok(unit)
    }

    /// Remove a unit, releasing its state and purging cached references to it
    pub fn remove_unit(&self, name: &str) -> Result<(), BuildError> {
        if self.is_building() {
            return Err(BuildError::InvalidOperation(format!(
                "cannot remove unit '{name}' during a build pass"
            )));
        }
        let mut units = self.units.write();
        let index = units
            .iter()
            .position(|u| u.name() == name)
            .ok_or_else(|| {
                BuildError::InvalidOperation(format!("unit '{name}' is not registered"))
            })?;
        units.remove(index);
        for unit in units.iter() {
            unit.purge_resolved_reference(name);
        }
        Ok(())
    }

    pub fn unit(&self, name: &str) -> Option<Arc<CompileUnit>> {
        self.units.read().iter().find(|u| u.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.read().iter().any(|u| u.name() == name)
    }

    pub fn unit_names(&self) -> Vec<String> {
        self.units
            .read()
            .iter()
            .map(|u| u.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst)
    }

    /// Group-wide switch for fast hotloading; off means every compatible
    /// rebuild still classifies as a full reload
    pub fn set_allow_fast_hotload(&self, allow: bool) {
        self.allow_fast_hotload.store(allow, Ordering::SeqCst);
    }

    pub fn allow_fast_hotload(&self) -> bool {
        self.allow_fast_hotload.load(Ordering::SeqCst)
    }

    /// Aggregate result of the most recent pass
    pub fn last_result(&self) -> Option<Arc<BuildGroupResult>> {
        self.last_result.lock().clone()
    }

    /// Whether any unit's inputs changed since its last successful build
    pub fn needs_build(&self) -> bool {
        self.units.read().iter().any(|u| u.inputs_changed())
    }

    /// Run one complete build pass over every unit
    ///
    /// Individual unit failures (diagnostics, missing binaries, orchestration
    /// faults) are recorded per unit and never abort the rest of the group.
    /// Only a precondition violation - a pass already running, or a broken
    /// pre-build contract - returns `Err`.
    pub async fn build_all(&self) -> Result<Arc<BuildGroupResult>, BuildError> {
        if self.building.swap(true, Ordering::SeqCst) {
            return Err(BuildError::InvalidOperation(
                "a build pass is already running".to_string(),
            ));
        }
        let result = self.run_pass().await;
        self.building.store(false, Ordering::SeqCst);
        result
    }

    async fn run_pass(&self) -> Result<Arc<BuildGroupResult>, BuildError> {
        let units: Vec<Arc<CompileUnit>> = self.units.read().clone();
        info!(target: "kindling::group", units = units.len(), "starting build pass");

        // Step 1: every future exists before any build starts, so a unit can
        // await a sibling whose real work has not begun.
        let mut futures = HashMap::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            match unit.pre_build(self.versions.next()) {
                Ok(future) => {
                    futures.insert(unit.name().to_string(), future);
                }
                Err(build_error) => {
                    for earlier in &units[..index] {
                        earlier.cancel_pre_build();
                    }
                    return Err(build_error);
                }
            }
        }

        let ctx = Arc::new(PassContext::new(
            self.frontend.clone(),
            self.resolver.clone(),
            self.validator.clone(),
            self.classifier.clone(),
            futures,
        ));

        let mut handles = Vec::with_capacity(units.len());
        for unit in &units {
            handles.push(tokio::spawn(unit.clone().execute_build(ctx.clone())));
        }

        let mut records = Vec::with_capacity(units.len());
        for (unit, handle) in units.iter().zip(handles) {
            match handle.await {
                Ok(record) => records.push(record),
                Err(join_error) => {
                    // The task died without resolving its promise; publish a
                    // failed output so no sibling waits forever.
                    error!(
                        target: "kindling::group",
                        unit = %unit.name(), error = %join_error, "build task died"
                    );
                    records.push(unit.abort_build(BuildError::FrontendFault(format!(
                        "build task died: {join_error}"
                    ))));
                }
            }
        }

        let binaries: Vec<BinaryHandle> = records
            .iter()
            .filter(|r| r.output.success)
            .filter_map(|r| r.output.binary.clone())
            .collect();
        let load_order = resolve_load_order(binaries);

        let allow_fast = self.allow_fast_hotload();
        let mut unit_results = Vec::with_capacity(units.len());
        for (unit, record) in units.iter().zip(records) {
            let hotload = record
                .output
                .success
                .then(|| unit.apply_hotload(&record, allow_fast));
            unit_results.push(UnitResult {
                name: unit.name().to_string(),
                output: record.output,
                hotload,
            });
        }

        let succeeded = unit_results.iter().filter(|u| u.output.success).count();
        info!(
            target: "kindling::group",
            succeeded,
            failed = unit_results.len() - succeeded,
            cycle_fallback = load_order.cycle_detected,
            "build pass finished"
        );

        let result = Arc::new(BuildGroupResult {
            units: unit_results,
            load_order: load_order.ordered,
            cycle_detected: load_order.cycle_detected,
        });
        *self.last_result.lock() = Some(result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrontendError;
    use crate::frontend::{Emission, IrItem, IrNode, ResolvedReference};
    use crate::source::MemorySource;

    struct EchoFrontend;

    impl Frontend for EchoFrontend {
        fn parse(
            &self,
            _path: &str,
            source: &str,
            _config: &UnitConfig,
        ) -> Result<IrNode, FrontendError> {
            Ok(Arc::new(source.to_string()))
        }

        fn emit(
            &self,
            _unit: &str,
            _items: &[IrItem],
            _references: &[ResolvedReference],
        ) -> Result<Emission, FrontendError> {
            Ok(Emission {
                data: vec![0],
                diagnostics: Vec::new(),
            })
        }
    }

    fn source(path: &str, text: &str) -> Arc<dyn SourceProvider> {
        Arc::new(MemorySource::new(path, text))
    }

    #[test]
    fn test_duplicate_unit_name_rejected() {
        let group = BuildGroup::new(Arc::new(EchoFrontend));
        group
            .add_unit("core", vec![source("a.knd", "1")], UnitConfig::default())
            .unwrap();
        let duplicate = group.add_unit("core", vec![source("b.knd", "2")], UnitConfig::default());
        assert!(matches!(duplicate, Err(BuildError::InvalidOperation(_))));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_remove_unknown_unit_rejected() {
        let group = BuildGroup::new(Arc::new(EchoFrontend));
        assert!(group.remove_unit("ghost").is_err());
    }

    #[test]
    fn test_registry_accessors() {
        let group = BuildGroup::new(Arc::new(EchoFrontend));
        assert!(group.is_empty());
        group
            .add_unit("core", vec![source("a.knd", "1")], UnitConfig::default())
            .unwrap();
        group
            .add_unit("game", vec![source("b.knd", "2")], UnitConfig::default())
            .unwrap();

        assert_eq!(group.len(), 2);
        assert!(group.contains("game"));
        assert!(group.unit("core").is_some());
        assert_eq!(group.unit_names(), vec!["core", "game"]);

        group.remove_unit("core").unwrap();
        assert!(!group.contains("core"));
    }

    #[test]
    fn test_new_group_is_idle() {
        let group = BuildGroup::new(Arc::new(EchoFrontend));
        assert!(!group.is_building());
        assert!(group.last_result().is_none());
        assert!(group.allow_fast_hotload());
    }

    #[test]
    fn test_empty_group_needs_no_build() {
        let group = BuildGroup::new(Arc::new(EchoFrontend));
        assert!(!group.needs_build());
    }
}
