//! Dependency resolution against real catalogs, plus order properties.

use plinth_core::{DependencyGraph, Error, resolve};
use plinth_manifest::{Format, Manifest, Violation};
use plinth_test_utils::catalog;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn standard() -> Manifest {
    Manifest::parse(catalog::STANDARD, Format::Toml, ".").unwrap()
}

#[test]
fn standard_scenario_order() {
    let manifest = standard();
    let order = resolve(&manifest, &["std-security", "lang-python", "foundation"]).unwrap();
    assert_eq!(order, ["foundation", "lang-python", "std-security"]);
}

#[test]
fn dependencies_are_pulled_in() {
    let manifest = standard();
    let order = resolve(&manifest, &["std-security"]).unwrap();
    assert_eq!(order, ["foundation", "std-security"]);
}

#[test]
fn unknown_plugins_are_all_reported() {
    let manifest = standard();
    let err = resolve(&manifest, &["ghost", "lang-python", "phantom"]).unwrap_err();
    match err {
        Error::DependencyUnresolved { missing } => {
            let ids: Vec<_> = missing.iter().map(|m| m.id.as_str()).collect();
            assert_eq!(ids, ["ghost", "phantom"]);
        }
        other => panic!("expected unresolved dependency, got {other:?}"),
    }
}

#[test]
fn cyclic_catalog_is_rejected_at_load() {
    let err = Manifest::parse(catalog::CYCLIC, Format::Toml, ".").unwrap_err();
    let plinth_manifest::Error::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert!(validation.violations.iter().any(|v| matches!(
        v,
        Violation::DependencyCycle { cycle } if cycle == &["a", "b", "c", "a"]
    )));
}

/// A random DAG: node `i` may depend only on nodes with a smaller index.
fn dag() -> impl Strategy<Value = (Vec<u8>, Vec<(usize, usize)>)> {
    (2usize..12).prop_flat_map(|n| {
        let ranks = proptest::collection::vec(0u8..5, n);
        let edges = proptest::collection::vec((1..n, 0..n), 0..n * 2)
            .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| b < a).collect::<Vec<_>>());
        (ranks, edges)
    })
}

fn build(ranks: &[u8], edges: &[(usize, usize)], reversed: bool) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    let mut ids: Vec<usize> = (0..ranks.len()).collect();
    if reversed {
        ids.reverse();
    }
    for i in ids {
        graph.add_node(format!("p{i:02}"), ranks[i]);
    }
    let mut edges = edges.to_vec();
    if reversed {
        edges.reverse();
    }
    for (from, to) in edges {
        graph.add_edge(&format!("p{from:02}"), &format!("p{to:02}"));
    }
    graph
}

proptest! {
    #[test]
    fn order_is_deterministic((ranks, edges) in dag()) {
        let first = build(&ranks, &edges, false).topological_order().unwrap();
        let second = build(&ranks, &edges, true).topological_order().unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn dependencies_precede_dependents((ranks, edges) in dag()) {
        let order = build(&ranks, &edges, false).topological_order().unwrap();
        prop_assert_eq!(order.len(), ranks.len());
        let position = |id: &str| order.iter().position(|o| o == id).unwrap();
        for (from, to) in &edges {
            let to_id = format!("p{to:02}");
            let from_id = format!("p{from:02}");
            prop_assert!(position(&to_id) < position(&from_id));
        }
    }
}
