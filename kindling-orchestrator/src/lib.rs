//! Kindling Orchestrator
//!
//! Incremental, dependency-aware build orchestration with hot-reload support.
//!
//! A [`BuildGroup`] owns named [`CompileUnit`]s, each a source tree compiled
//! to one binary module. A build pass runs every unit concurrently: CPU-bound
//! frontend and emission work goes to the rayon worker pool, while units that
//! reference each other coordinate through pre-allocated build futures, so a
//! unit awaiting a sibling never occupies a worker thread. After the pass,
//! the successfully emitted binaries are sorted into dependency load order
//! and every rebuilt unit is classified as fast-hotloadable or requiring a
//! full module reload.
//!
//! The source-language frontend, the security validator, external reference
//! resolution, and change classification are collaborator traits injected at
//! group construction; this crate orchestrates, it does not compile.

pub mod classify;
pub mod error;
pub mod frontend;
pub mod future;
pub mod group;
pub mod hotload;
pub mod incremental;
pub mod ordering;
pub mod output;
pub mod resolve;
pub mod source;
pub mod unit;
pub mod validate;
pub mod version;

mod compute;

pub use classify::{ChangeClassifier, ChangeCompat, ChangeReport, TextChangeClassifier};
pub use error::{BuildError, FrontendError, HotloadError, ResolveError, SourceError};
pub use frontend::{
    BinaryBlob, BinaryHandle, Emission, Frontend, IrItem, IrNode, ResolvedReference,
};
pub use future::BuildFuture;
pub use group::BuildGroup;
pub use hotload::{HotloadOutcome, HotloadState, RecentBinaryHistory};
pub use incremental::{ChangeKind, IncrementalState, Snapshot, SourceChange};
pub use ordering::{resolve_load_order, LoadOrder};
pub use output::{BuildGroupResult, BuildOutput, Diagnostic, Location, Severity, UnitResult};
pub use resolve::{MapResolver, NullResolver, ReferenceResolver};
pub use source::{MemorySource, SourceHash, SourceProvider};
pub use unit::CompileUnit;
pub use validate::{SecurityValidator, Verdict};
pub use version::{process_counter, ProcessCounter, VersionCounter};

// Re-export the configuration vocabulary
pub use kindling_config::{OptimizeLevel, UnitConfig};
