//! Build results
//!
//! All compile-time problems are represented as data attached to a
//! `BuildOutput`, so a consumer can always inspect a result object. A unit's
//! output is immutable once published; consumers share it read-only until the
//! unit's next build replaces it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::frontend::BinaryHandle;
use crate::hotload::HotloadOutcome;

/// Severity of one diagnostic entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Source position a diagnostic points at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

/// One compile diagnostic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            location: None,
        }
    }

    /// Attach a source position
    pub fn at(mut self, path: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = Some(Location {
            path: path.into(),
            line,
            column,
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.location {
            Some(loc) => write!(
                f,
                "{severity}: {} ({}:{}:{})",
                self.message, loc.path, loc.line, loc.column
            ),
            None => write!(f, "{severity}: {}", self.message),
        }
    }
}

/// Immutable result of one build attempt for one unit
#[derive(Debug)]
pub struct BuildOutput {
    /// Unit this output belongs to
    pub unit: String,
    /// Process-wide build version, assigned at build start
    pub version: u64,
    pub success: bool,
    /// Compiled binary, present only on success
    pub binary: Option<BinaryHandle>,
    /// Ordered compile diagnostics
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the orchestration itself faulted, distinct from compile
    /// diagnostics
    pub exception: Option<BuildError>,
}

impl BuildOutput {
    /// Output for a build whose orchestration faulted
    pub(crate) fn faulted(unit: impl Into<String>, version: u64, error: BuildError) -> Self {
        Self {
            unit: unit.into(),
            version,
            success: false,
            binary: None,
            diagnostics: Vec::new(),
            exception: Some(error),
        }
    }

    /// Whether any diagnostic is an error
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Per-unit slice of a finished build pass
#[derive(Debug)]
pub struct UnitResult {
    pub name: String,
    pub output: Arc<BuildOutput>,
    /// Hotload classification; absent for failed builds
    pub hotload: Option<HotloadOutcome>,
}

/// Aggregate result of one build pass over a group
#[derive(Debug)]
pub struct BuildGroupResult {
    /// Per-unit results in unit registration order
    pub units: Vec<UnitResult>,
    /// Successfully built binaries in dependency load order
    pub load_order: Vec<BinaryHandle>,
    /// True when the load order is best-effort input order because the
    /// binary reference graph contained a cycle
    pub cycle_detected: bool,
}

impl BuildGroupResult {
    pub fn all_succeeded(&self) -> bool {
        self.units.iter().all(|u| u.output.success)
    }

    pub fn unit(&self, name: &str) -> Option<&UnitResult> {
        self.units.iter().find(|u| u.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_builders() {
        let diag = Diagnostic::error("unknown symbol 'frobnicate'").at("lib/main.knd", 12, 5);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.location.as_ref().unwrap().line, 12);
        assert!(diag.to_string().contains("lib/main.knd"));
    }

    #[test]
    fn test_has_errors_ignores_warnings() {
        let output = BuildOutput {
            unit: "core".to_string(),
            version: 1,
            success: true,
            binary: None,
            diagnostics: vec![Diagnostic::warning("unused variable")],
            exception: None,
        };
        assert!(!output.has_errors());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
