pub mod checks;
pub mod evaluator;
pub mod registry;


pub use checks::{
    CancelableProbe, Check, CheckKind, CheckOutcome, CheckState, Probe, ProbeResult,
};
pub use evaluator::{run_check, AggregateStatus, EvaluationReport, HealthEvaluator};
pub use registry::CheckRegistry;
