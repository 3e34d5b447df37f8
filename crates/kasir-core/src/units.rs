//! # Unit Graph Resolver
//!
//! Products count stock in ONE base unit. Every other unit a user declares
//! points at another unit of the same product with an integer factor:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Box ──×12──► Dozen ──×12──► Pcs (base)                               │
//! │                                                                         │
//! │   toBase(Pcs)   = 1                                                     │
//! │   toBase(Dozen) = 12 × toBase(Pcs)   = 12                               │
//! │   toBase(Box)   = 12 × toBase(Dozen) = 144                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules (checked in this order)
//! 1. Names are non-empty and unique per product, ignoring case.
//! 2. Exactly one unit is the base. Its factor is 1 and it points nowhere.
//! 3. Every other unit has a positive factor and points at a declared unit.
//! 4. Following the pointers from any unit reaches the base without
//!    revisiting a unit on the same walk.
//!
//! The walk keeps a per-walk `visiting` set apart from the graph-wide
//! `resolved` table, so a shared ancestor is resolved once and a cycle is
//! never mistaken for a memo hit. The resolved order lists parents before
//! children, which is the order persistence inserts rows in.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::UnitGraphError;

// =============================================================================
// Declarations
// =============================================================================

/// One unit as declared by the user, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitDeclaration {
    pub name: String,
    pub is_base: bool,
    /// How many `converts_to` units make one of this unit.
    pub conversion_factor: i64,
    /// Name of the unit this one is expressed in.
    pub converts_to: Option<String>,
}

impl UnitDeclaration {
    /// Declares the base unit.
    pub fn base(name: impl Into<String>) -> Self {
        UnitDeclaration {
            name: name.into(),
            is_base: true,
            conversion_factor: 1,
            converts_to: None,
        }
    }

    /// Declares `factor` × `converts_to` = 1 × `name`.
    pub fn derived(name: impl Into<String>, factor: i64, converts_to: impl Into<String>) -> Self {
        UnitDeclaration {
            name: name.into(),
            is_base: false,
            conversion_factor: factor,
            converts_to: Some(converts_to.into()),
        }
    }
}

/// A validated unit with its factor to the base unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedUnit {
    pub name: String,
    pub is_base: bool,
    pub conversion_factor: i64,
    pub converts_to: Option<String>,
    pub to_base: i64,
}

impl ResolvedUnit {
    /// Turns the resolved unit back into the declaration it came from.
    pub fn declaration(&self) -> UnitDeclaration {
        UnitDeclaration {
            name: self.name.clone(),
            is_base: self.is_base,
            conversion_factor: self.conversion_factor,
            converts_to: self.converts_to.clone(),
        }
    }
}

// =============================================================================
// Unit Graph
// =============================================================================

/// The resolved units of one product, parents before children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitGraph {
    units: Vec<ResolvedUnit>,
    by_name: HashMap<String, usize>,
}

impl UnitGraph {
    /// Validates one product's declarations and computes every `to_base`.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::units::{UnitDeclaration, UnitGraph};
    ///
    /// let graph = UnitGraph::resolve(&[
    ///     UnitDeclaration::derived("Box", 12, "Dozen"),
    ///     UnitDeclaration::base("Pcs"),
    ///     UnitDeclaration::derived("Dozen", 12, "Pcs"),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!(graph.to_base("box"), Some(144));
    /// assert_eq!(graph.units()[0].name, "Pcs");
    /// ```
    pub fn resolve(declarations: &[UnitDeclaration]) -> Result<Self, UnitGraphError> {
        let n = declarations.len();

        // Rule 1: names
        let mut index: HashMap<String, usize> = HashMap::with_capacity(n);
        for (i, decl) in declarations.iter().enumerate() {
            let name = decl.name.trim();
            if name.is_empty() {
                return Err(UnitGraphError::EmptyName);
            }
            if index.insert(name.to_lowercase(), i).is_some() {
                return Err(UnitGraphError::DuplicateName(name.to_string()));
            }
        }

        // Rule 2: exactly one base
        let bases: Vec<usize> = declarations
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_base)
            .map(|(i, _)| i)
            .collect();
        let base = match bases.as_slice() {
            [only] => *only,
            _ => return Err(UnitGraphError::BaseUnitCount { found: bases.len() }),
        };

        // Rule 3: factors and targets
        let mut parent: Vec<Option<usize>> = vec![None; n];
        for (i, decl) in declarations.iter().enumerate() {
            if i == base {
                continue;
            }
            let unit = decl.name.trim();
            if decl.conversion_factor <= 0 {
                return Err(UnitGraphError::NonPositiveFactor {
                    unit: unit.to_string(),
                });
            }
            let target = decl
                .converts_to
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| UnitGraphError::MissingTarget {
                    unit: unit.to_string(),
                })?;
            let target_idx =
                index
                    .get(&target.to_lowercase())
                    .ok_or_else(|| UnitGraphError::UnknownTarget {
                        unit: unit.to_string(),
                        target: target.to_string(),
                    })?;
            parent[i] = Some(*target_idx);
        }

        // Rule 4: walk to the base, memoizing as we unwind
        let mut resolved: Vec<Option<i64>> = vec![None; n];
        resolved[base] = Some(1);
        let mut order = Vec::with_capacity(n);
        order.push(base);

        for start in 0..n {
            if resolved[start].is_some() {
                continue;
            }

            let mut visiting: HashSet<usize> = HashSet::new();
            let mut path: Vec<usize> = Vec::new();
            let mut current = start;

            while resolved[current].is_none() {
                if !visiting.insert(current) {
                    return Err(UnitGraphError::CircularReference {
                        unit: declarations[current].name.trim().to_string(),
                    });
                }
                path.push(current);
                match parent[current] {
                    Some(p) => current = p,
                    None => break,
                }
            }

            // `current` is resolved here; unwind from nearest ancestor outwards
            let mut ancestor_factor = resolved[current].unwrap_or(1);
            while let Some(unit) = path.pop() {
                let factor = declarations[unit]
                    .conversion_factor
                    .checked_mul(ancestor_factor)
                    .ok_or_else(|| UnitGraphError::FactorOverflow {
                        unit: declarations[unit].name.trim().to_string(),
                    })?;
                resolved[unit] = Some(factor);
                order.push(unit);
                ancestor_factor = factor;
            }
        }

        let mut units = Vec::with_capacity(n);
        let mut by_name = HashMap::with_capacity(n);
        for idx in order {
            let decl = &declarations[idx];
            let is_base = idx == base;
            let name = decl.name.trim().to_string();
            by_name.insert(name.to_lowercase(), units.len());
            units.push(ResolvedUnit {
                name,
                is_base,
                conversion_factor: if is_base { 1 } else { decl.conversion_factor },
                converts_to: if is_base {
                    None
                } else {
                    parent[idx].map(|p| declarations[p].name.trim().to_string())
                },
                to_base: resolved[idx].unwrap_or(1),
            });
        }

        Ok(UnitGraph { units, by_name })
    }

    /// All units in creation order (base first).
    pub fn units(&self) -> &[ResolvedUnit] {
        &self.units
    }

    /// The base unit.
    pub fn base(&self) -> &ResolvedUnit {
        &self.units[0]
    }

    /// Looks a unit up by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&ResolvedUnit> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.units[i])
    }

    /// Factor from `name` to the base unit.
    pub fn to_base(&self, name: &str) -> Option<i64> {
        self.get(name).map(|u| u.to_base)
    }

    /// Consumes the graph, returning units in creation order.
    pub fn into_units(self) -> Vec<ResolvedUnit> {
        self.units
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pcs_dozen_box() -> Vec<UnitDeclaration> {
        vec![
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Dozen", 12, "Pcs"),
            UnitDeclaration::derived("Box", 12, "Dozen"),
        ]
    }

    #[test]
    fn test_three_level_chain() {
        let graph = UnitGraph::resolve(&pcs_dozen_box()).unwrap();
        assert_eq!(graph.to_base("Pcs"), Some(1));
        assert_eq!(graph.to_base("Dozen"), Some(12));
        assert_eq!(graph.to_base("Box"), Some(144));
        assert_eq!(graph.base().name, "Pcs");
    }

    #[test]
    fn test_creation_order_puts_parents_first() {
        let graph = UnitGraph::resolve(&[
            UnitDeclaration::derived("Box", 12, "Dozen"),
            UnitDeclaration::derived("Dozen", 12, "Pcs"),
            UnitDeclaration::base("Pcs"),
        ])
        .unwrap();

        let names: Vec<&str> = graph.units().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Pcs", "Dozen", "Box"]);
    }

    #[test]
    fn test_lookup_ignores_case() {
        let graph = UnitGraph::resolve(&pcs_dozen_box()).unwrap();
        assert_eq!(graph.to_base("bOX"), Some(144));
        assert_eq!(graph.to_base("Crate"), None);
    }

    #[test]
    fn test_targets_match_case_insensitively() {
        let graph = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Pack", 6, "pcs"),
        ])
        .unwrap();
        assert_eq!(graph.get("Pack").unwrap().converts_to.as_deref(), Some("Pcs"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = UnitGraph::resolve(&[UnitDeclaration::base("  ")]).unwrap_err();
        assert_eq!(err, UnitGraphError::EmptyName);
    }

    #[test]
    fn test_duplicate_name_rejected_case_insensitive() {
        let err = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("PCS", 2, "Pcs"),
        ])
        .unwrap_err();
        assert_eq!(err, UnitGraphError::DuplicateName("PCS".to_string()));
    }

    #[test]
    fn test_no_base_fails_before_cycle_detection() {
        let err = UnitGraph::resolve(&[
            UnitDeclaration::derived("A", 2, "B"),
            UnitDeclaration::derived("B", 3, "A"),
        ])
        .unwrap_err();
        assert_eq!(err, UnitGraphError::BaseUnitCount { found: 0 });
        assert_eq!(err.to_string(), "exactly one base unit is required");
    }

    #[test]
    fn test_two_bases_rejected() {
        let err = UnitGraph::resolve(&[UnitDeclaration::base("Pcs"), UnitDeclaration::base("Kg")])
            .unwrap_err();
        assert_eq!(err, UnitGraphError::BaseUnitCount { found: 2 });
    }

    #[test]
    fn test_base_is_normalized() {
        let graph = UnitGraph::resolve(&[
            UnitDeclaration {
                name: "Pcs".into(),
                is_base: true,
                conversion_factor: 5,
                converts_to: Some("Pack".into()),
            },
            UnitDeclaration::derived("Pack", 6, "Pcs"),
        ])
        .unwrap();
        let base = graph.base();
        assert_eq!(base.conversion_factor, 1);
        assert_eq!(base.converts_to, None);
        assert_eq!(base.to_base, 1);
        assert_eq!(graph.to_base("Pack"), Some(6));
    }

    #[test]
    fn test_non_positive_factor_rejected() {
        let err = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Pack", 0, "Pcs"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            UnitGraphError::NonPositiveFactor {
                unit: "Pack".into()
            }
        );
    }

    #[test]
    fn test_missing_and_unknown_target() {
        let err = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration {
                name: "Pack".into(),
                is_base: false,
                conversion_factor: 6,
                converts_to: None,
            },
        ])
        .unwrap_err();
        assert_eq!(err, UnitGraphError::MissingTarget { unit: "Pack".into() });

        let err = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Pack", 6, "Crate"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            UnitGraphError::UnknownTarget {
                unit: "Pack".into(),
                target: "Crate".into()
            }
        );
    }

    #[test]
    fn test_self_reference_is_circular() {
        let err = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Loop", 2, "Loop"),
        ])
        .unwrap_err();
        assert!(matches!(err, UnitGraphError::CircularReference { .. }));
    }

    #[test]
    fn test_cycle_hanging_off_valid_branch() {
        let err = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Pack", 6, "Pcs"),
            UnitDeclaration::derived("A", 2, "B"),
            UnitDeclaration::derived("B", 2, "C"),
            UnitDeclaration::derived("C", 2, "A"),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "circular unit reference detected");
    }

    #[test]
    fn test_shared_ancestor_resolved_once() {
        let graph = UnitGraph::resolve(&[
            UnitDeclaration::derived("Carton", 4, "Box"),
            UnitDeclaration::derived("Pallet", 10, "Box"),
            UnitDeclaration::derived("Box", 10, "Pack"),
            UnitDeclaration::derived("Pack", 6, "Pcs"),
            UnitDeclaration::base("Pcs"),
        ])
        .unwrap();
        assert_eq!(graph.to_base("Carton"), Some(240));
        assert_eq!(graph.to_base("Pallet"), Some(600));
        assert_eq!(graph.units().len(), 5);
    }

    #[test]
    fn test_factor_overflow() {
        let err = UnitGraph::resolve(&[
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Big", i64::MAX, "Pcs"),
            UnitDeclaration::derived("Bigger", 2, "Big"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            UnitGraphError::FactorOverflow {
                unit: "Bigger".into()
            }
        );
    }

    #[test]
    fn test_declarations_round_trip() {
        let graph = UnitGraph::resolve(&pcs_dozen_box()).unwrap();
        let decls: Vec<UnitDeclaration> = graph.units().iter().map(|u| u.declaration()).collect();
        let again = UnitGraph::resolve(&decls).unwrap();
        assert_eq!(graph.units(), again.units());
    }

    /// Builds a random tree: unit i>0 points at a random earlier unit.
    fn arb_tree() -> impl Strategy<Value = Vec<UnitDeclaration>> {
        (1usize..12).prop_flat_map(|n| {
            (
                proptest::collection::vec(1i64..20, n),
                proptest::collection::vec(any::<prop::sample::Index>(), n),
            )
                .prop_map(move |(factors, parents)| {
                    (0..n)
                        .map(|i| {
                            if i == 0 {
                                UnitDeclaration::base("U0")
                            } else {
                                let p = parents[i].index(i);
                                UnitDeclaration::derived(format!("U{}", i), factors[i], format!("U{}", p))
                            }
                        })
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn prop_to_base_is_product_of_factors(decls in arb_tree()) {
            let graph = UnitGraph::resolve(&decls).unwrap();
            prop_assert_eq!(graph.base().to_base, 1);
            for unit in graph.units().iter().filter(|u| !u.is_base) {
                let parent = unit.converts_to.as_deref().unwrap();
                let expected = unit.conversion_factor * graph.to_base(parent).unwrap();
                prop_assert_eq!(unit.to_base, expected);
            }
        }

        #[test]
        fn prop_parents_created_before_children(decls in arb_tree()) {
            let graph = UnitGraph::resolve(&decls).unwrap();
            let position: HashMap<&str, usize> = graph
                .units()
                .iter()
                .enumerate()
                .map(|(i, u)| (u.name.as_str(), i))
                .collect();
            for (i, unit) in graph.units().iter().enumerate() {
                if let Some(parent) = unit.converts_to.as_deref() {
                    prop_assert!(position[parent] < i);
                }
            }
        }

        #[test]
        fn prop_any_cycle_fails(len in 1usize..6, extra in 0usize..4) {
            let mut decls = vec![UnitDeclaration::base("Base")];
            for i in 0..extra {
                decls.push(UnitDeclaration::derived(format!("T{}", i), 2, "Base"));
            }
            for i in 0..len {
                let next = (i + 1) % len;
                decls.push(UnitDeclaration::derived(format!("C{}", i), 2, format!("C{}", next)));
            }
            let err = UnitGraph::resolve(&decls).unwrap_err();
            let is_circular = matches!(err, UnitGraphError::CircularReference { .. });
            prop_assert!(is_circular);
        }
    }
}
