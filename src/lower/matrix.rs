//! Matrix lowering: strategy block and artifact-name fingerprint

use crate::ast::Matrix;
use crate::ir::StrategyIr;

pub fn strategy(matrix: &Matrix) -> StrategyIr {
    StrategyIr {
        axes: matrix
            .axes
            .iter()
            .map(|axis| (axis.name.clone(), axis.values.clone()))
            .collect(),
        include: matrix.include.clone(),
        exclude: matrix.exclude.clone(),
        fail_fast: matrix.fail_fast,
        max_parallel: matrix.max_parallel,
    }
}

/// Per-cell suffix: sorted axis names as `${{ matrix.<axis> }}` joined by `-`
///
/// `None` when the matrix has no axes (include-only matrices).
pub fn fingerprint(matrix: &Matrix) -> Option<String> {
    let mut names: Vec<&str> = matrix.axes.iter().map(|a| a.name.as_str()).collect();
    if names.is_empty() {
        return None;
    }
    names.sort_unstable();
    names.dedup();
    Some(
        names
            .iter()
            .map(|name| format!("${{{{ matrix.{} }}}}", name))
            .collect::<Vec<_>>()
            .join("-"),
    )
}

/// Artifact name made unique per matrix cell
pub fn artifact_name(name: &str, fingerprint: Option<&str>) -> String {
    match fingerprint {
        Some(fp) => format!("{}-{}", name, fp),
        None => name.to_string(),
    }
}
