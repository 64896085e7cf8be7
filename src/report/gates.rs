use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ComplianceReport, Criterion};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// A run-level assertion: `criterion` must reach `min_rate` over its
/// testable results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequiredPassRate {
    pub criterion: Criterion,
    pub min_rate: f64,
}

/// A failed gate. Distinct from harness errors: this is the only way a
/// compliance run fails.
#[derive(Debug, Clone, PartialEq)]
pub struct GateViolation {
    pub criterion: Criterion,
    pub required: f64,
    /// `None` when every result for the criterion was skipped.
    pub observed: Option<f64>,
}

impl fmt::Display for GateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.observed {
            Some(rate) => write!(
                f,
                "criterion {} ({}) pass rate {:.1}% is below the required {:.1}%",
                self.criterion.id(),
                self.criterion.label(),
                rate * 100.0,
                self.required * 100.0
            ),
            None => write!(
                f,
                "criterion {} ({}) has no testable results; required {:.1}%",
                self.criterion.id(),
                self.criterion.label(),
                self.required * 100.0
            ),
        }
    }
}

impl std::error::Error for GateViolation {}

/// Check every gate against the report summary. A criterion with no testable
/// results cannot demonstrate compliance and violates its gate.
pub fn check_gates(report: &ComplianceReport, gates: &[RequiredPassRate]) -> Vec<GateViolation> {
    let violations: Vec<GateViolation> = gates
        .iter()
        .filter_map(|gate| {
            let observed = report
                .criterion_summary(gate.criterion)
                .and_then(|summary| summary.pass_rate);
            match observed {
                Some(rate) if rate >= gate.min_rate => None,
                observed => Some(GateViolation {
                    criterion: gate.criterion,
                    required: gate.min_rate,
                    observed,
                }),
            }
        })
        .collect();

    for violation in &violations {
        log_warn!("gate violated: {violation}");
    }
    violations
}
