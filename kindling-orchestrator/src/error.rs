//! Error types for the orchestrator
//!
//! Diagnostic-level problems (compile errors, unresolved references) travel as
//! `Diagnostic` data on a `BuildOutput` and are never raised through these
//! types. The enums here cover orchestration faults and collaborator failures.

use thiserror::Error;

/// Main orchestration error type
///
/// Stored in `BuildOutput::exception` when a unit's orchestration faulted, or
/// returned directly from group APIs on contract violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("frontend fault: {0}")]
    FrontendFault(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Error type for frontend collaborators
///
/// A frontend that fails to produce IR or a binary reports through this type;
/// the coordinator captures it as a `BuildError::FrontendFault` on the unit's
/// output rather than letting it cross the future boundary.
#[derive(Error, Debug, Clone)]
pub enum FrontendError {
    #[error("parse failed for '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("emission failed: {0}")]
    Emit(String),

    #[error("internal frontend error: {0}")]
    Internal(String),
}

/// Error type for source providers
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("source read failed for '{path}': {message}")]
    Read { path: String, message: String },

    #[error("source not found: {0}")]
    NotFound(String),
}

/// Error type for external reference resolvers
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("reference not found: {0}")]
    NotFound(String),

    #[error("resolver failure for '{name}': {message}")]
    Failed { name: String, message: String },
}

/// Error type for hotload revocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HotloadError {
    #[error("no fallback binary remains for unit '{unit}' after revoking version {version}")]
    NoFallback { unit: String, version: u64 },
}

impl From<FrontendError> for BuildError {
    fn from(err: FrontendError) -> Self {
        BuildError::FrontendFault(err.to_string())
    }
}

impl From<SourceError> for BuildError {
    fn from(err: SourceError) -> Self {
        BuildError::Source(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_error_becomes_fault() {
        let err = FrontendError::Emit("codegen exploded".to_string());
        let build_err: BuildError = err.into();
        assert!(matches!(build_err, BuildError::FrontendFault(_)));
        assert!(build_err.to_string().contains("codegen exploded"));
    }

    #[test]
    fn test_hotload_error_display() {
        let err = HotloadError::NoFallback {
            unit: "game".to_string(),
            version: 7,
        };
        assert!(err.to_string().contains("game"));
        assert!(err.to_string().contains('7'));
    }
}
