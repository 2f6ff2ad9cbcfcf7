//! Compile units
//!
//! A `CompileUnit` is one named, independently buildable module: sources,
//! configuration, incremental state, and hotload history. The unit owns its
//! own build steps; sibling units interact only through the pre-allocated
//! build future and the finished `BuildOutput` behind it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use kindling_config::UnitConfig;

use crate::classify::ChangeClassifier;
use crate::error::{BuildError, HotloadError};
use crate::frontend::{BinaryBlob, BinaryHandle, Frontend, IrItem, ResolvedReference};
use crate::future::{build_channel, BuildFuture, BuildPromise};
use crate::hotload::{classify_rebuild, HotloadOutcome, HotloadState, RecentBinaryHistory};
use crate::incremental::{IncrementalState, Snapshot, SourceChange};
use crate::output::{BuildOutput, Diagnostic};
use crate::resolve::ReferenceResolver;
use crate::compute::run_compute;
use crate::source::{SourceHash, SourceProvider};
use crate::validate::{SecurityValidator, Verdict};

/// Collaborators and cross-unit wiring for one build pass
///
/// Constructed by the group after every unit's future exists, so the futures
/// map is complete before any build starts.
pub(crate) struct PassContext {
    pub frontend: Arc<dyn Frontend>,
    pub resolver: Arc<dyn ReferenceResolver>,
    pub validator: Option<Arc<dyn SecurityValidator>>,
    pub classifier: Arc<dyn ChangeClassifier>,
    /// Every unit's current build future, keyed by unit name
    pub futures: HashMap<String, BuildFuture>,
    /// Current blocking edges of the wait graph: waiter name -> awaited name
    waits: Mutex<HashMap<String, String>>,
}

impl PassContext {
    pub(crate) fn new(
        frontend: Arc<dyn Frontend>,
        resolver: Arc<dyn ReferenceResolver>,
        validator: Option<Arc<dyn SecurityValidator>>,
        classifier: Arc<dyn ChangeClassifier>,
        futures: HashMap<String, BuildFuture>,
    ) -> Self {
        Self {
            frontend,
            resolver,
            validator,
            classifier,
            futures,
            waits: Mutex::new(HashMap::new()),
        }
    }

    /// Record that `waiter` is about to await `target`'s build.
    ///
    /// Returns the offending chain if the new edge would close a cycle in the
    /// wait graph; the caller must then fail the reference instead of
    /// suspending, which is what keeps true reference cycles from
    /// deadlocking. Edges whose awaited build already resolved are ignored:
    /// they are stale entries from a waiter that has not cleaned up yet.
    fn register_wait(&self, waiter: &str, target: &str) -> Option<String> {
        let mut waits = self.waits.lock();
        let mut chain = vec![waiter.to_string(), target.to_string()];
        let mut current = target.to_string();
        loop {
            let Some(next) = waits.get(&current) else {
                break;
            };
            let resolved = self
                .futures
                .get(next)
                .map(|f| f.is_resolved())
                .unwrap_or(true);
            if resolved {
                break;
            }
            chain.push(next.clone());
            if next == waiter {
                return Some(chain.join(" -> "));
            }
            current = next.clone();
        }
        waits.insert(waiter.to_string(), target.to_string());
        None
    }

    fn clear_wait(&self, waiter: &str) {
        self.waits.lock().remove(waiter);
    }
}

/// What one unit carried out of a pass, beyond the published output
pub(crate) struct PassRecord {
    pub output: Arc<BuildOutput>,
    pub summary: Vec<SourceChange>,
    pub first_build: bool,
}

/// Pending build allocated by pre-build
struct InFlight {
    version: u64,
    promise: Option<BuildPromise>,
    future: BuildFuture,
}

/// Everything mutable about a unit, guarded by one lock
///
/// The lock is held only for short synchronous sections, never across an
/// await.
struct UnitState {
    sources: Vec<Arc<dyn SourceProvider>>,
    manifest_references: Vec<String>,
    config: UnitConfig,
    config_dirty: bool,
    incremental: IncrementalState,
    history: RecentBinaryHistory,
    hotload_state: Option<HotloadState>,
    /// Binary currently used for downstream reference resolution
    live: Option<(u64, BinaryHandle)>,
    /// Cached external resolutions; sibling units are never cached
    resolved_cache: HashMap<String, BinaryHandle>,
    last_output: Option<Arc<BuildOutput>>,
    in_flight: Option<InFlight>,
}

/// Result of the fallible portion of a build
struct StepResult {
    success: bool,
    binary: Option<BinaryHandle>,
    diagnostics: Vec<Diagnostic>,
    snapshot: Option<Snapshot>,
    summary: Vec<SourceChange>,
    first_build: bool,
}

/// Result of the parallel frontend pass
struct FrontendPass {
    snapshot: Snapshot,
    references: Vec<String>,
    summary: Vec<SourceChange>,
    first_build: bool,
}

/// One named, independently buildable module
pub struct CompileUnit {
    name: String,
    output_name: String,
    state: Mutex<UnitState>,
}

impl CompileUnit {
    pub(crate) fn new(
        name: impl Into<String>,
        sources: Vec<Arc<dyn SourceProvider>>,
        config: UnitConfig,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        let mut seen = Vec::with_capacity(sources.len());
        for provider in &sources {
            if seen.contains(&provider.path()) {
                return Err(BuildError::InvalidOperation(format!(
                    "unit '{name}' given source path '{}' twice",
                    provider.path()
                )));
            }
            seen.push(provider.path());
        }
        let history = RecentBinaryHistory::new(config.history_limit);
        Ok(Self {
            output_name: format!("{name}.kmod"),
            name,
            state: Mutex::new(UnitState {
                sources,
                manifest_references: Vec::new(),
                config,
                config_dirty: false,
                incremental: IncrementalState::new(),
                history,
                hotload_state: None,
                live: None,
                resolved_cache: HashMap::new(),
                last_output: None,
                in_flight: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Artifact name derived from the unit name
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn is_building(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// Future of the in-flight build, if one is running
    pub fn current_future(&self) -> Option<BuildFuture> {
        self.state
            .lock()
            .in_flight
            .as_ref()
            .map(|f| f.future.clone())
    }

    pub fn config(&self) -> UnitConfig {
        self.state.lock().config.clone()
    }

    /// Replace the configuration, discarding all incremental state
    pub fn set_config(&self, config: UnitConfig) -> Result<(), BuildError> {
        let mut state = self.state.lock();
        if state.in_flight.is_some() {
            return Err(BuildError::InvalidOperation(format!(
                "cannot reconfigure unit '{}' while it is building",
                self.name
            )));
        }
        if state.config != config {
            state.incremental.invalidate();
            state.config_dirty = true;
            state.history.set_capacity(config.history_limit);
            state.config = config;
        }
        Ok(())
    }

    /// Append a source provider; never legal mid-build
    pub fn add_source(&self, provider: Arc<dyn SourceProvider>) -> Result<(), BuildError> {
        let mut state = self.state.lock();
        if state.in_flight.is_some() {
            return Err(BuildError::InvalidOperation(format!(
                "cannot add sources to unit '{}' while it is building",
                self.name
            )));
        }
        if state.sources.iter().any(|s| s.path() == provider.path()) {
            return Err(BuildError::InvalidOperation(format!(
                "unit '{}' already has source path '{}'",
                self.name,
                provider.path()
            )));
        }
        state.sources.push(provider);
        Ok(())
    }

    /// Declare a manifest-level reference to another unit or binary
    pub fn add_reference(&self, name: impl Into<String>) {
        let name = name.into();
        let mut state = self.state.lock();
        if !state.manifest_references.contains(&name) {
            state.manifest_references.push(name);
        }
    }

    pub fn references(&self) -> Vec<String> {
        self.state.lock().manifest_references.clone()
    }

    /// Output of the most recent build attempt, successful or not
    pub fn last_output(&self) -> Option<Arc<BuildOutput>> {
        self.state.lock().last_output.clone()
    }

    /// Binary currently used when other code resolves against this unit
    pub fn live_binary(&self) -> Option<(u64, BinaryHandle)> {
        self.state.lock().live.clone()
    }

    pub fn hotload_state(&self) -> Option<HotloadState> {
        self.state.lock().hotload_state
    }

    /// Versions currently available for hotload rollback, oldest first
    pub fn history_versions(&self) -> Vec<u64> {
        self.state.lock().history.versions()
    }

    /// Whether this unit's inputs changed since its last successful build
    pub(crate) fn inputs_changed(&self) -> bool {
        let state = self.state.lock();
        if state.config_dirty {
            return true;
        }
        let Some(snapshot) = state.incremental.snapshot() else {
            return true;
        };
        if state.sources.len() != snapshot.len() {
            return true;
        }
        for provider in &state.sources {
            let Ok(text) = provider.read() else {
                // an unreadable source needs a build to surface the error
                return true;
            };
            match snapshot.get(provider.path()) {
                Some(item) if item.hash == SourceHash::of(&text) => {}
                _ => return true,
            }
        }
        false
    }

    /// Drop a cached external resolution, after its provider disappeared
    pub(crate) fn purge_resolved_reference(&self, name: &str) {
        self.state.lock().resolved_cache.remove(name);
    }

    /// Step 1: allocate this pass's future before any build starts
    ///
    /// A second pre-build without an intervening resolved future is a caller
    /// bug.
    pub(crate) fn pre_build(&self, version: u64) -> Result<BuildFuture, BuildError> {
        let mut state = self.state.lock();
        if state.in_flight.is_some() {
            return Err(BuildError::InvalidOperation(format!(
                "unit '{}' already has a build in flight",
                self.name
            )));
        }
        let (promise, future) = build_channel();
        state.in_flight = Some(InFlight {
            version,
            promise: Some(promise),
            future: future.clone(),
        });
        Ok(future)
    }

    /// Roll back a pre-build whose pass never started
    pub(crate) fn cancel_pre_build(&self) {
        self.state.lock().in_flight = None;
    }

    /// Steps 2-6 for this unit within one pass
    ///
    /// Never panics the pass and never leaves the future pending: orchestration
    /// faults become `BuildOutput::exception` and the promise resolves on every
    /// path.
    pub(crate) async fn execute_build(self: Arc<Self>, ctx: Arc<PassContext>) -> PassRecord {
        let version = self.state.lock().in_flight.as_ref().map(|f| f.version);
        let Some(version) = version else {
            error!(target: "kindling::unit", unit = %self.name, "build started without pre-build");
            let output = Arc::new(BuildOutput::faulted(
                &self.name,
                0,
                BuildError::InvalidOperation("build started without pre-build".to_string()),
            ));
            return PassRecord {
                output,
                summary: Vec::new(),
                first_build: false,
            };
        };

        debug!(target: "kindling::unit", unit = %self.name, version, "starting build");
        let attempt = self.try_build(&ctx).await;

        let (output, summary, first_build) = match attempt {
            Ok(step) => {
                let output = Arc::new(BuildOutput {
                    unit: self.name.clone(),
                    version,
                    success: step.success,
                    binary: step.binary.clone(),
                    diagnostics: step.diagnostics,
                    exception: None,
                });
                if let (true, Some(snapshot), Some(handle)) =
                    (step.success, step.snapshot, step.binary)
                {
                    let mut state = self.state.lock();
                    state.incremental.commit(snapshot, handle.clone());
                    state.live = Some((version, handle));
                    state.config_dirty = false;
                }
                (output, step.summary, step.first_build)
            }
            Err(build_error) => {
                warn!(
                    target: "kindling::unit",
                    unit = %self.name, version, error = %build_error,
                    "build orchestration faulted"
                );
                let output = Arc::new(BuildOutput::faulted(&self.name, version, build_error));
                (output, Vec::new(), false)
            }
        };

        self.finish(output.clone());
        debug!(
            target: "kindling::unit",
            unit = %self.name, version, success = output.success, "build finished"
        );
        PassRecord {
            output,
            summary,
            first_build,
        }
    }

    /// Publish a failed output for a build whose task died
    pub(crate) fn abort_build(&self, build_error: BuildError) -> PassRecord {
        let version = self
            .state
            .lock()
            .in_flight
            .as_ref()
            .map(|f| f.version)
            .unwrap_or(0);
        let output = Arc::new(BuildOutput::faulted(&self.name, version, build_error));
        self.finish(output.clone());
        PassRecord {
            output,
            summary: Vec::new(),
            first_build: false,
        }
    }

    /// Step 6: resolve the future exactly once, then clear the building flag
    fn finish(&self, output: Arc<BuildOutput>) {
        let mut state = self.state.lock();
        state.last_output = Some(output.clone());
        if let Some(mut in_flight) = state.in_flight.take() {
            if let Some(promise) = in_flight.promise.take() {
                promise.resolve(output);
            }
        }
    }

    async fn try_build(&self, ctx: &PassContext) -> Result<StepResult, BuildError> {
        let (sources, config, config_dirty, manifest_references, previous_snapshot) = {
            let state = self.state.lock();
            (
                state.sources.clone(),
                state.config.clone(),
                state.config_dirty,
                state.manifest_references.clone(),
                state.incremental.snapshot().cloned(),
            )
        };

        config
            .validate()
            .map_err(BuildError::Configuration)?;

        // Step 2: frontend pass on the worker pool
        let frontend = ctx.frontend.clone();
        let classifier = ctx.classifier.clone();
        let pass = run_compute(move || {
            frontend_pass(
                &*frontend,
                &*classifier,
                &sources,
                &config,
                config_dirty,
                previous_snapshot,
                manifest_references,
            )
        })
        .await??;

        // Step 3: reference resolution, the pass's only suspension point
        let mut diagnostics = Vec::new();
        let mut resolved = Vec::new();
        let mut unresolved = false;
        for reference in &pass.references {
            if reference == &self.name {
                continue;
            }
            if let Some(future) = ctx.futures.get(reference) {
                if !future.is_resolved() {
                    if let Some(chain) = ctx.register_wait(&self.name, reference) {
                        warn!(
                            target: "kindling::unit",
                            unit = %self.name, chain = %chain, "reference cycle detected"
                        );
                        diagnostics.push(Diagnostic::error(format!(
                            "cyclic unit reference chain: {chain}"
                        )));
                        unresolved = true;
                        continue;
                    }
                }
                let waited = future.wait().await;
                ctx.clear_wait(&self.name);
                match waited {
                    Ok(output) if output.success => match &output.binary {
                        Some(handle) => resolved.push(ResolvedReference {
                            name: reference.clone(),
                            handle: handle.clone(),
                        }),
                        None => {
                            diagnostics.push(Diagnostic::error(format!(
                                "referenced unit '{reference}' produced no binary"
                            )));
                            unresolved = true;
                        }
                    },
                    Ok(_) => {
                        diagnostics.push(Diagnostic::error(format!(
                            "referenced unit '{reference}' failed to build"
                        )));
                        unresolved = true;
                    }
                    Err(_) => {
                        diagnostics.push(Diagnostic::error(format!(
                            "referenced unit '{reference}' abandoned its build"
                        )));
                        unresolved = true;
                    }
                }
            } else {
                let cached = self.state.lock().resolved_cache.get(reference).cloned();
                if let Some(handle) = cached {
                    resolved.push(ResolvedReference {
                        name: reference.clone(),
                        handle,
                    });
                    continue;
                }
                match ctx.resolver.resolve(reference).await {
                    Ok(handle) => {
                        self.state
                            .lock()
                            .resolved_cache
                            .insert(reference.clone(), handle.clone());
                        resolved.push(ResolvedReference {
                            name: reference.clone(),
                            handle,
                        });
                    }
                    Err(resolve_error) => {
                        diagnostics.push(Diagnostic::error(resolve_error.to_string()));
                        unresolved = true;
                    }
                }
            }
        }

        if unresolved {
            return Ok(StepResult {
                success: false,
                binary: None,
                diagnostics,
                snapshot: None,
                summary: pass.summary,
                first_build: pass.first_build,
            });
        }

        // Step 4: emission, back on the worker pool
        let frontend = ctx.frontend.clone();
        let unit_name = self.name.clone();
        let items = pass.snapshot.items().to_vec();
        let emit_references = resolved.clone();
        let emission = run_compute(move || frontend.emit(&unit_name, &items, &emit_references))
            .await?
            .map_err(BuildError::from)?;
        diagnostics.extend(emission.diagnostics);

        let mut success = !diagnostics
            .iter()
            .any(|d| d.severity == crate::output::Severity::Error);
        let handle: BinaryHandle = Arc::new(BinaryBlob {
            name: self.name.clone(),
            references: pass.references.clone(),
            data: emission.data.into(),
        });

        // Step 5: post-emission validation, before the future resolves
        if success && self.state.lock().config.enable_validation {
            if let Some(validator) = ctx.validator.clone() {
                let scanned = handle.clone();
                let Verdict { ok, diagnostics: mut verdict_diags } =
                    run_compute(move || validator.validate(&scanned)).await?;
                diagnostics.append(&mut verdict_diags);
                if !ok {
                    warn!(
                        target: "kindling::unit",
                        unit = %self.name, "binary rejected by validator"
                    );
                    success = false;
                }
            }
        }

        Ok(StepResult {
            success,
            binary: success.then_some(handle),
            diagnostics,
            snapshot: Some(pass.snapshot),
            summary: pass.summary,
            first_build: pass.first_build,
        })
    }

    /// Classify the finished build and update history and hotload state
    pub(crate) fn apply_hotload(
        &self,
        record: &PassRecord,
        group_allows_fast: bool,
    ) -> HotloadOutcome {
        let mut state = self.state.lock();
        let version = record.output.version;
        let outcome = classify_rebuild(
            &record.summary,
            group_allows_fast,
            state.config.hotload,
            record.first_build,
        );
        let Some(handle) = record.output.binary.clone() else {
            return outcome;
        };
        match outcome {
            HotloadOutcome::FastHotload => {
                state.history.insert(version, handle);
                state.hotload_state = Some(HotloadState::FastHotloaded(version));
            }
            HotloadOutcome::FullReload => {
                // Only contiguous fast-hotload chains roll back safely; this
                // version starts a new chain.
                state.history.clear();
                state.history.insert(version, handle);
                state.hotload_state = Some(HotloadState::FullReloadPending(version));
            }
            HotloadOutcome::Unsupported => {
                state.history.clear();
                state.history.insert(version, handle);
                state.hotload_state = Some(HotloadState::Stable(version));
            }
        }
        debug!(
            target: "kindling::hotload",
            unit = %self.name, version, outcome = ?outcome, "rebuild classified"
        );
        outcome
    }

    /// The runtime reload system revoked a fast-hotloaded version
    ///
    /// Falls back to the newest surviving history entry. Returns the new live
    /// handle when the live binary had to be swapped, `None` when the revoked
    /// version was not live. Running out of fallbacks while the live binary
    /// is the revoked one is a fatal consistency error: the unit would
    /// otherwise keep handing out a binary that no longer exists.
    pub fn notify_fast_hotload_revoked(
        &self,
        version: u64,
    ) -> Result<Option<BinaryHandle>, HotloadError> {
        let mut state = self.state.lock();
        state.history.remove(version);

        let live_is_revoked = state.live.as_ref().is_some_and(|(v, _)| *v == version);
        if !live_is_revoked {
            debug!(
                target: "kindling::hotload",
                unit = %self.name, version, "revoked version was not live"
            );
            return Ok(None);
        }

        match state.history.newest() {
            Some((fallback, handle)) => {
                info!(
                    target: "kindling::hotload",
                    unit = %self.name, revoked = version, fallback,
                    "live binary rolled back"
                );
                state.live = Some((fallback, handle.clone()));
                if matches!(state.hotload_state, Some(HotloadState::FastHotloaded(v)) if v == version)
                {
                    state.hotload_state = Some(HotloadState::FastHotloaded(fallback));
                }
                Ok(Some(handle))
            }
            None => {
                error!(
                    target: "kindling::hotload",
                    unit = %self.name, revoked = version,
                    "no fallback binary remains"
                );
                state.live = None;
                Err(HotloadError::NoFallback {
                    unit: self.name.clone(),
                    version,
                })
            }
        }
    }
}

/// Step 2 body: read sources, produce the candidate snapshot, collect
/// reference names, diff against the committed snapshot
fn frontend_pass(
    frontend: &dyn Frontend,
    classifier: &dyn ChangeClassifier,
    sources: &[Arc<dyn SourceProvider>],
    config: &UnitConfig,
    config_dirty: bool,
    previous_snapshot: Option<Snapshot>,
    manifest_references: Vec<String>,
) -> Result<FrontendPass, BuildError> {
    let scratch = IncrementalState::with_snapshot(previous_snapshot);
    let first_build = !scratch.has_snapshot();

    let mut texts = Vec::with_capacity(sources.len());
    for provider in sources {
        let text = provider.read().map_err(BuildError::from)?;
        texts.push((provider.path().to_string(), text));
    }
    let paths: Vec<String> = texts.iter().map(|(path, _)| path.clone()).collect();
    let full = scratch.needs_full_pass(config_dirty, &paths);

    let mut snapshot = Snapshot::new();
    for (path, text) in &texts {
        let item = if full {
            let node = frontend.parse(path, text, config)?;
            IrItem {
                path: path.clone(),
                hash: SourceHash::of(text),
                node,
            }
        } else {
            scratch.merge_source_item(frontend, config, path, text)?
        };
        snapshot.push(item);
    }

    // Manifest references first, then names declared by generated code
    let mut references = manifest_references;
    for item in snapshot.items() {
        for name in frontend.references(&item.node) {
            if !references.contains(&name) {
                references.push(name);
            }
        }
    }

    let summary = scratch.change_summary(&snapshot, classifier);
    Ok(FrontendPass {
        snapshot,
        references,
        summary,
        first_build,
    })
}
