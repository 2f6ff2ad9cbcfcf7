//! Frontend boundary
//!
//! The source-language frontend (parser, type checker, code generator) is an
//! external collaborator. The orchestrator hands it source text and resolved
//! binary references and gets back IR nodes, binaries, and diagnostics; it
//! never looks inside either. IR payloads are type-erased so any frontend can
//! carry its own representation through the incremental cache.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use kindling_config::UnitConfig;

use crate::error::FrontendError;
use crate::output::Diagnostic;
use crate::source::SourceHash;

/// Opaque frontend-owned IR payload
pub type IrNode = Arc<dyn Any + Send + Sync>;

/// One source item's IR, as cached between builds
#[derive(Clone)]
pub struct IrItem {
    /// Source path this item was parsed from
    pub path: String,
    /// Content hash of the text the node was produced from
    pub hash: SourceHash,
    /// The frontend's representation
    pub node: IrNode,
}

impl fmt::Debug for IrItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrItem")
            .field("path", &self.path)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// Result of emitting one unit
pub struct Emission {
    /// Raw binary module bytes
    pub data: Vec<u8>,
    /// Diagnostics produced during emission
    pub diagnostics: Vec<Diagnostic>,
}

/// One compiled binary module with its extractable metadata
pub struct BinaryBlob {
    /// Assembly name, the owning unit's name
    pub name: String,
    /// Names of binaries this one references
    pub references: Vec<String>,
    /// Opaque module bytes
    pub data: Arc<[u8]>,
}

impl fmt::Debug for BinaryBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryBlob")
            .field("name", &self.name)
            .field("references", &self.references)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Shared handle to a compiled binary
pub type BinaryHandle = Arc<BinaryBlob>;

/// A reference name resolved to a concrete binary
#[derive(Clone, Debug)]
pub struct ResolvedReference {
    pub name: String,
    pub handle: BinaryHandle,
}

/// The opaque source-language frontend
pub trait Frontend: Send + Sync {
    /// Parse one source item from scratch
    fn parse(&self, path: &str, source: &str, config: &UnitConfig)
        -> Result<IrNode, FrontendError>;

    /// Incrementally update an existing node for new text
    ///
    /// Frontends without incremental support keep the default, a full parse of
    /// the one item.
    fn reparse(
        &self,
        previous: &IrNode,
        path: &str,
        source: &str,
        config: &UnitConfig,
    ) -> Result<IrNode, FrontendError> {
        let _ = previous;
        self.parse(path, source, config)
    }

    /// Reference names declared by generated code in this node
    fn references(&self, node: &IrNode) -> Vec<String> {
        let _ = node;
        Vec::new()
    }

    /// Generate the unit's binary from its IR and resolved references
    fn emit(
        &self,
        unit: &str,
        items: &[IrItem],
        references: &[ResolvedReference],
    ) -> Result<Emission, FrontendError>;
}
