//! Property-based tests for gantry
//!
//! Uses proptest to check matrix sizing, import ordering and the
//! never-panic guarantee of the front-end.

use proptest::prelude::*;
use serde_json::{Map, Value};

use gantry::ast::{Matrix, MatrixAxis};
use gantry::validate::{matrix_job_count, validate_matrices, MatrixLimits};
use gantry::{codes, parse_source, ImportGraph};

// ============================================================================
// Strategies
// ============================================================================

prop_compose! {
    fn arb_matrix()(
        sizes in prop::collection::vec(1usize..8, 1..4),
        include in 0usize..6,
        exclude in 0usize..6,
    ) -> Matrix {
        Matrix {
            axes: sizes
                .iter()
                .enumerate()
                .map(|(i, n)| MatrixAxis {
                    name: format!("axis{}", i),
                    values: (0..*n).map(|v| Value::from(v as u64)).collect(),
                })
                .collect(),
            include: vec![Map::new(); include],
            exclude: vec![Map::new(); exclude],
            ..Matrix::default()
        }
    }
}

/// Edges `i -> j` with `i < j` only, so the graph is acyclic
fn arb_dag() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..8, 0usize..8), 0..20).prop_map(|pairs| {
        pairs
            .into_iter()
            .filter(|(a, b)| a < b)
            .collect::<Vec<_>>()
    })
}

fn file(i: usize) -> String {
    format!("f{}.yaml", i)
}

// ============================================================================
// Matrix sizing
// ============================================================================

mod matrix {
    use super::*;

    proptest! {
        #[test]
        fn include_never_shrinks(m in arb_matrix()) {
            let before = matrix_job_count(&m);
            let mut more = m.clone();
            more.include.push(Map::new());
            prop_assert!(matrix_job_count(&more) >= before);
        }

        #[test]
        fn exclude_never_grows(m in arb_matrix()) {
            let before = matrix_job_count(&m);
            let mut fewer = m.clone();
            fewer.exclude.push(Map::new());
            prop_assert!(matrix_job_count(&fewer) <= before);
        }

        #[test]
        fn thresholds_match_count(a in 1usize..20, b in 1usize..20) {
            let values = |n: usize| {
                (0..n).map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
            };
            let yaml = format!(
                "workflows:\n  - name: wf\n    jobs:\n      - {{ name: grid, runs_on: x, matrix: {{ axes: {{ a: [{}], b: [{}] }} }} }}\n",
                values(a),
                values(b)
            );
            let parsed = parse_source("wf.yaml", &yaml);
            let workflow = &parsed.file.unwrap().workflows[0];
            let diags = validate_matrices(workflow, &MatrixLimits::default());
            let count = a * b;
            let found: Vec<_> = diags.iter().map(|d| d.code).collect();
            if count > 256 {
                prop_assert_eq!(found, vec![codes::MATRIX_TOO_LARGE]);
            } else if count > 200 {
                prop_assert_eq!(found, vec![codes::MATRIX_NEAR_LIMIT]);
            } else {
                prop_assert!(found.is_empty());
            }
        }
    }
}

// ============================================================================
// Import graph
// ============================================================================

mod import_graph {
    use super::*;

    proptest! {
        #[test]
        fn topological_order_respects_edges(edges in arb_dag()) {
            let mut graph = ImportGraph::new();
            for i in 0..8 {
                graph.add_file(&file(i));
            }
            for (a, b) in &edges {
                graph.add_edge(&file(*a), &file(*b));
            }
            let order = graph.get_topological_order().unwrap();
            let position = |name: &str| order.iter().position(|o| o == name).unwrap();
            for (a, b) in &edges {
                // importer comes after what it imports
                prop_assert!(position(&file(*b)) < position(&file(*a)));
            }
        }

        #[test]
        fn back_edge_breaks_order(edges in arb_dag()) {
            prop_assume!(!edges.is_empty());
            let mut graph = ImportGraph::new();
            for (a, b) in &edges {
                graph.add_edge(&file(*a), &file(*b));
            }
            let (a, b) = edges[0];
            graph.add_edge(&file(b), &file(a));
            prop_assert!(graph.has_cycle());
            prop_assert!(graph.get_topological_order().is_err());
        }
    }
}

// ============================================================================
// Front-end robustness
// ============================================================================

mod frontend {
    use super::*;

    proptest! {
        #[test]
        fn parse_never_panics(text in "\\PC{0,200}") {
            let _ = parse_source("fuzz.yaml", &text);
        }

        #[test]
        fn type_expr_never_panics(text in "[a-z\\[\\]{}|:,\"() ]{0,40}") {
            let _ = gantry::frontend::parse_type_expr(&text);
        }
    }
}
