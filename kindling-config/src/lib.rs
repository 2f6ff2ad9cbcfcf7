//! Kindling Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Kindling crates.
//!
//! `UnitConfig` equality drives incremental invalidation: a unit whose
//! configuration compares unequal to the one it last built with must discard
//! its cached state and rebuild from scratch.

use serde::{Deserialize, Serialize};

/// Optimization level for emitted binaries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeLevel {
    /// No optimization, fastest builds
    None,
    /// Balanced optimization for iterative development
    Debug,
    /// Full optimization for shipped binaries
    Release,
}

/// Configuration for one compile unit
///
/// Immutable per build: the coordinator snapshots this value at build start
/// and never observes mid-pass mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Conditional compilation symbols, `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,
    /// Optimization level for emission
    pub optimize: OptimizeLevel,
    /// Whether to emit debug information
    pub emit_debug_info: bool,
    /// Whether compiled output is handed to the security validator
    pub enable_validation: bool,
    /// Whether this unit participates in hot reloading at all
    pub hotload: bool,
    /// Maximum number of recent binaries retained for hotload rollback
    pub history_limit: usize,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            defines: Vec::new(),
            optimize: OptimizeLevel::Debug,
            emit_debug_info: true,
            enable_validation: false,
            hotload: true,
            history_limit: 8,
        }
    }
}

impl UnitConfig {
    /// Check the configuration for internal contradictions.
    ///
    /// Returns a human-readable description of the first problem found.
    /// A define listed twice with different values is contradictory; listing
    /// the same define twice with the same value is merely redundant.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<(&str, Option<&str>)> = Vec::new();
        for define in &self.defines {
            let (name, value) = match define.split_once('=') {
                Some((n, v)) => (n, Some(v)),
                None => (define.as_str(), None),
            };
            if name.is_empty() {
                return Err(format!("empty define name in '{define}'"));
            }
            if let Some((_, prev)) = seen.iter().find(|(n, _)| *n == name) {
                if *prev != value {
                    return Err(format!("define '{name}' given two different values"));
                }
            } else {
                seen.push((name, value));
            }
        }
        if self.history_limit == 0 {
            return Err("history_limit must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Subsystem enum for subsystem-specific log configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsystem {
    Group,
    Unit,
    Incremental,
    Order,
    Hotload,
}

impl Subsystem {
    /// Get the string name of the subsystem
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Group => "group",
            Subsystem::Unit => "unit",
            Subsystem::Incremental => "incremental",
            Subsystem::Order => "order",
            Subsystem::Hotload => "hotload",
        }
    }

    /// Get the log target name for this subsystem
    pub fn target(&self) -> String {
        format!("kindling::{}", self.as_str())
    }
}
