//! Built-in sample diagrams that can be quickly loaded from the UI.
//!
//! This module defines curated starting points to help new users see what
//! state tables, formulas, and transitions look like together.

use crate::types::*;

/// Kinds of built-in samples available from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// A two-state loan application with computed payment rows
    LoanApplication,
}

/// Metadata for a single sample.
pub struct SampleInfo {
    /// Stable identifier for the sample
    pub kind: SampleKind,
    /// Human-friendly display name
    pub name: &'static str,
}

/// Returns all samples with their display names.
pub const fn all_samples() -> &'static [SampleInfo] {
    const SAMPLES: &[SampleInfo] = &[SampleInfo {
        kind: SampleKind::LoanApplication,
        name: "Loan Application (two states)",
    }];
    SAMPLES
}

/// Builds a diagram instance for the given sample kind.
pub fn build_sample(kind: SampleKind) -> Diagram {
    match kind {
        SampleKind::LoanApplication => build_loan_application(),
    }
}

fn build_loan_application() -> Diagram {
    let mut diagram = Diagram::new();

    // Submitted: raw inputs plus a computed yearly interest amount.
    let mut rate = Row::new(2, "rate", RowValue::Number(0.05), RowKind::Percentage);
    rate.output = Some("annual".to_string());
    let submitted = Table::new(
        (100.0, 150.0),
        vec![
            Row::number(1, "principal", 12000.0),
            rate,
            Row::formula(3, "interest", "principal * rate"),
        ],
    );
    let submitted_id = diagram.add_table(submitted);

    // Approved: monthly view computed from the submitted state's rows.
    let approved = Table::new(
        (600.0, 150.0),
        vec![
            Row::number(1, "months", 12.0),
            Row::formula(2, "monthly_payment", "(principal + principal * rate) / months"),
        ],
    );
    let approved_id = diagram.add_table(approved);

    let mut transition = Transition::new(submitted_id, approved_id);
    transition.text = "approve".to_string();
    diagram.transitions.push(transition);

    diagram.shapes.push({
        let mut label = Shape::new(ShapeKind::Text, (100.0, 80.0), (0.0, 0.0));
        label.text = "Loan workflow".to_string();
        label
    });

    diagram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recalc::recalculate;

    #[test]
    fn test_loan_sample_recalculates_to_documented_results() {
        let diagram = build_sample(SampleKind::LoanApplication);
        assert_eq!(diagram.tables.len(), 2);
        assert_eq!(diagram.transitions.len(), 1);

        let submitted = recalculate(&diagram.tables[0].data, &diagram.tables);
        assert_eq!(submitted[2].result, Some(600.0));

        let approved = recalculate(&diagram.tables[1].data, &diagram.tables);
        assert_eq!(approved[1].result, Some(1050.0));
    }

    #[test]
    fn test_sample_listing_is_nonempty() {
        assert!(!all_samples().is_empty());
        assert_eq!(all_samples()[0].kind, SampleKind::LoanApplication);
    }
}
