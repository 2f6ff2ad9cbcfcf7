//! Post-emission validation boundary
//!
//! An external security validator (whitelist scanner) may inspect every
//! emitted binary before the unit's result is published. A rejection flips
//! the build to failed; downstream units therefore never observe a binary
//! that validation has not cleared.

use crate::frontend::BinaryBlob;
use crate::output::Diagnostic;

/// Validator verdict for one binary
pub struct Verdict {
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            ok: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn reject(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            ok: false,
            diagnostics,
        }
    }
}

/// Scans an emitted binary before it is published
pub trait SecurityValidator: Send + Sync {
    fn validate(&self, binary: &BinaryBlob) -> Verdict;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_constructors() {
        assert!(Verdict::pass().ok);
        let rejected = Verdict::reject(vec![Diagnostic::error("forbidden import")]);
        assert!(!rejected.ok);
        assert_eq!(rejected.diagnostics.len(), 1);
    }
}
