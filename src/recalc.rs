//! Recalculation of formula rows.
//!
//! Whenever any value changes, every row carrying a formula is recomputed
//! from scratch against the current raw values — a brute-force full re-scan
//! rather than a dependency graph. Results are never read back as inputs
//! (the evaluator coerces formula rows through their raw stored value), so
//! the pass is order-independent and idempotent.

use crate::formula::evaluate_formula_checked;
use crate::types::{Row, Table};

/// Recomputes the `result` of every row with a non-empty formula.
///
/// Pure: returns a new row sequence, leaving the input untouched. Rows
/// without a formula pass through unchanged apart from having any stale
/// `result` cleared. Evaluation failures keep the fail-silent contract —
/// the row's result becomes 0.0 and the failure is kept on the row's
/// `diagnostic` field.
pub fn recalculate(rows: &[Row], all_tables: &[Table]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut row = row.clone();
            if row.formula.is_empty() {
                row.result = None;
                row.diagnostic = None;
            } else {
                // Evaluate against the input snapshot: only raw values are
                // read, so sibling results computed this pass cannot leak in.
                match evaluate_formula_checked(&row.formula, rows, all_tables) {
                    Ok(value) => {
                        row.result = Some(value);
                        row.diagnostic = None;
                    }
                    Err(err) => {
                        log::warn!("row `{}` formula `{}` failed: {err}", row.name, row.formula);
                        row.result = Some(0.0);
                        row.diagnostic = Some(err);
                    }
                }
            }
            row
        })
        .collect()
}
