//! Assembly load ordering
//!
//! After a pass, the successfully emitted binaries are sorted so that every
//! binary loads after the binaries it references. The sort is a repeated
//! stable extraction: scan the remaining entries for the first one whose
//! in-set references are all placed, move it to the output, repeat. Quadratic
//! in the number of binaries, which is the number of compile units in a
//! project, not the number of source files.

use std::collections::HashSet;

use tracing::warn;

use crate::frontend::BinaryHandle;

/// Result of load-order resolution
pub struct LoadOrder {
    /// Binaries in load order; equals the input order when a cycle was found
    pub ordered: Vec<BinaryHandle>,
    /// True when the sort fell back to input order
    pub cycle_detected: bool,
}

/// Sort binaries so dependencies load first
///
/// Self-references and references to names outside the input set are treated
/// as already satisfied. Ties keep input order, so the result is
/// deterministic for a deterministic input. A cyclic input never fails hard:
/// the original order comes back unchanged with `cycle_detected` set and a
/// warning logged.
pub fn resolve_load_order(input: Vec<BinaryHandle>) -> LoadOrder {
    let known: HashSet<String> = input.iter().map(|b| b.name.clone()).collect();

    let mut remaining = input.clone();
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(input.len());

    while !remaining.is_empty() {
        let eligible = remaining.iter().position(|blob| {
            blob.references.iter().all(|reference| {
                reference == &blob.name
                    || !known.contains(reference)
                    || placed.contains(reference)
            })
        });

        match eligible {
            Some(index) => {
                let blob = remaining.remove(index);
                placed.insert(blob.name.clone());
                ordered.push(blob);
            }
            None => {
                let stuck: Vec<&str> = remaining.iter().map(|b| b.name.as_str()).collect();
                warn!(
                    target: "kindling::order",
                    ?stuck,
                    "cyclic assembly references; falling back to input order"
                );
                return LoadOrder {
                    ordered: input,
                    cycle_detected: true,
                };
            }
        }
    }

    LoadOrder {
        ordered,
        cycle_detected: false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::frontend::BinaryBlob;

    fn blob(name: &str, references: &[&str]) -> BinaryHandle {
        Arc::new(BinaryBlob {
            name: name.to_string(),
            references: references.iter().map(|r| r.to_string()).collect(),
            data: Vec::new().into(),
        })
    }

    fn names(order: &LoadOrder) -> Vec<&str> {
        order.ordered.iter().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn test_dependencies_load_first() {
        let order = resolve_load_order(vec![
            blob("c", &["b"]),
            blob("a", &[]),
            blob("b", &["a"]),
        ]);
        assert!(!order.cycle_detected);
        assert_eq!(names(&order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_every_reference_precedes_its_user() {
        let order = resolve_load_order(vec![
            blob("app", &["engine", "ui"]),
            blob("ui", &["engine"]),
            blob("engine", &["std"]),
            blob("std", &[]),
        ]);
        assert!(!order.cycle_detected);
        let placed = names(&order);
        for blob in &order.ordered {
            let own = placed.iter().position(|n| *n == blob.name).unwrap();
            for reference in &blob.references {
                if let Some(dep) = placed.iter().position(|n| n == reference) {
                    assert!(dep < own, "{reference} must precede {}", blob.name);
                }
            }
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let order = resolve_load_order(vec![blob("y", &[]), blob("x", &[]), blob("z", &[])]);
        assert_eq!(names(&order), vec!["y", "x", "z"]);
    }

    #[test]
    fn test_self_reference_is_satisfied() {
        let order = resolve_load_order(vec![blob("solo", &["solo"])]);
        assert!(!order.cycle_detected);
        assert_eq!(names(&order), vec!["solo"]);
    }

    #[test]
    fn test_external_references_are_satisfied() {
        let order = resolve_load_order(vec![blob("app", &["system-runtime"]), blob("lib", &[])]);
        assert!(!order.cycle_detected);
        assert_eq!(names(&order), vec!["app", "lib"]);
    }

    #[test]
    fn test_cycle_falls_back_to_input_order() {
        let order = resolve_load_order(vec![blob("x", &["y"]), blob("y", &["x"])]);
        assert!(order.cycle_detected);
        assert_eq!(names(&order), vec!["x", "y"]);
    }

    #[test]
    fn test_partial_cycle_still_falls_back_whole() {
        let order = resolve_load_order(vec![
            blob("free", &[]),
            blob("x", &["y"]),
            blob("y", &["x"]),
        ]);
        assert!(order.cycle_detected);
        assert_eq!(names(&order), vec!["free", "x", "y"]);
    }

    #[test]
    fn test_empty_input() {
        let order = resolve_load_order(Vec::new());
        assert!(!order.cycle_detected);
        assert!(order.ordered.is_empty());
    }
}
