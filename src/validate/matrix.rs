//! Matrix sizing against the platform's per-matrix job limit

use serde::{Deserialize, Serialize};

use crate::ast::{Matrix, Workflow};
use crate::diagnostic::{codes, Diagnostic};

use super::all_jobs;

/// Thresholds for expanded matrix sizes (`[matrix]` in gantry.toml)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixLimits {
    /// Counts above this warn
    pub warn_threshold: usize,
    /// Counts above this fail; the platform rejects larger matrices
    pub max_jobs: usize,
}

impl Default for MatrixLimits {
    fn default() -> Self {
        Self {
            warn_threshold: 200,
            max_jobs: 256,
        }
    }
}

/// Jobs a matrix expands to: axis product + include - exclude, floored at 0
///
/// A matrix without axes has an empty product, so only `include` counts.
pub fn matrix_job_count(matrix: &Matrix) -> usize {
    let product = if matrix.axes.is_empty() {
        0
    } else {
        matrix
            .axes
            .iter()
            .fold(1usize, |acc, axis| acc.saturating_mul(axis.values.len()))
    };
    product
        .saturating_add(matrix.include.len())
        .saturating_sub(matrix.exclude.len())
}

pub fn validate_matrices(workflow: &Workflow, limits: &MatrixLimits) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (job, cycle) in all_jobs(workflow) {
        let Some(matrix) = job.matrix() else {
            continue;
        };
        let count = matrix_job_count(matrix);
        let subject = match cycle {
            Some(c) => format!("matrix job '{}' in cycle '{}'", job.name(), c.name),
            None => format!("matrix job '{}'", job.name()),
        };

        if count > limits.max_jobs {
            diagnostics.push(
                Diagnostic::error(
                    codes::MATRIX_TOO_LARGE,
                    format!(
                        "{} expands to {} jobs, above the limit of {}",
                        subject, count, limits.max_jobs
                    ),
                    matrix.span,
                )
                .with_hint("split the matrix or add `exclude` entries"),
            );
        } else if count > limits.warn_threshold {
            diagnostics.push(Diagnostic::warning(
                codes::MATRIX_NEAR_LIMIT,
                format!(
                    "{} expands to {} jobs, close to the limit of {}",
                    subject, count, limits.max_jobs
                ),
                matrix.span,
            ));
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MatrixAxis;
    use crate::frontend::parse_source;
    use serde_json::{Map, Value};

    fn matrix(sizes: &[usize], include: usize, exclude: usize) -> Matrix {
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

    #[test]
    fn test_job_count() {
        assert_eq!(matrix_job_count(&matrix(&[2, 3], 0, 0)), 6);
        assert_eq!(matrix_job_count(&matrix(&[2, 3], 2, 1)), 7);
        assert_eq!(matrix_job_count(&matrix(&[2], 0, 5)), 0);
        assert_eq!(matrix_job_count(&matrix(&[], 3, 0)), 3);
        assert_eq!(matrix_job_count(&matrix(&[4, 0], 0, 0)), 0);
    }

    fn check(axes: &str, in_cycle: bool) -> Vec<Diagnostic> {
        let job = format!(
            "{{ name: grid, runs_on: x, matrix: {{ axes: {{ {} }} }} }}",
            axes
        );
        let yaml = if in_cycle {
            format!("workflows:\n  - name: wf\n    cycles:\n      - {{ name: loop, max_iters: 2, body: [{}] }}\n", job)
        } else {
            format!("workflows:\n  - name: wf\n    jobs:\n      - {}\n", job)
        };
        let file = parse_source("wf.yaml", &yaml).file.unwrap();
        validate_matrices(&file.workflows[0], &MatrixLimits::default())
    }

    fn values(n: usize) -> String {
        let items: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        format!("[{}]", items.join(", "))
    }

    #[test]
    fn test_thresholds() {
        assert!(check(&format!("a: {}", values(200)), false).is_empty());

        let near = check(&format!("a: {}", values(201)), false);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].code, codes::MATRIX_NEAR_LIMIT);
        assert!(near[0].message.contains("'grid'"));
        assert!(near[0].message.contains("201"));

        let at_limit = check(&format!("a: {}", values(256)), false);
        assert_eq!(at_limit[0].code, codes::MATRIX_NEAR_LIMIT);

        let over = check(&format!("a: {}, b: {}", values(17), values(16)), false);
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].code, codes::MATRIX_TOO_LARGE);
        assert!(over[0].message.contains("272"));
    }

    #[test]
    fn test_owning_cycle_named() {
        let over = check(&format!("a: {}", values(300)), true);
        assert_eq!(over[0].code, codes::MATRIX_TOO_LARGE);
        assert!(over[0].message.contains("cycle 'loop'"));
        assert!(over[0].message.contains("300"));
    }
}
