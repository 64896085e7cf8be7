//! Aggregation, advisory gap analysis, run gates and rendering.

pub mod aggregate;
pub mod gaps;
pub mod gates;
pub mod render;

pub use aggregate::{build_report, build_report_with, summarize};
pub use gaps::{GapRegistry, GapRule};
pub use gates::{check_gates, GateViolation, RequiredPassRate};
pub use render::{to_json_pretty, to_markdown};
