//! Queue diagnostics for pending jobs blocked by reportedly failed nodes.

pub mod diagnoser;
pub mod engine;

pub use diagnoser::{Diagnosis, diagnose};
pub use engine::{QueueDiagnosticEngine, QueueFinding};
