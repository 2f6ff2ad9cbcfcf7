//! Source providers
//!
//! A compile unit owns an ordered list of source providers. Providers are
//! external collaborators (editors, files, generated text); the orchestrator
//! only needs a path for identity and the current text. Content identity is a
//! SHA-256 digest so it is stable across processes and restarts.

use std::fmt;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::SourceError;

/// Stable identity of one source item's content
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceHash([u8; 32]);

impl SourceHash {
    pub fn of(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl fmt::Debug for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One source item of a compile unit
pub trait SourceProvider: Send + Sync {
    /// Stable path identifying this item across rebuilds
    fn path(&self) -> &str;

    /// Current text of the item
    fn read(&self) -> Result<String, SourceError>;
}

/// In-memory source provider
///
/// Content is replaceable, which is how tests and embedding editors simulate
/// edits between build passes.
pub struct MemorySource {
    path: String,
    content: RwLock<String>,
}

impl MemorySource {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: RwLock::new(content.into()),
        }
    }

    /// Replace the text, as an editor buffer change would
    pub fn set_content(&self, content: impl Into<String>) {
        *self.content.write() = content.into();
    }
}

impl SourceProvider for MemorySource {
    fn path(&self) -> &str {
        &self.path
    }

    fn read(&self) -> Result<String, SourceError> {
        Ok(self.content.read().clone())
    }
}
