//! Node health monitoring and automated recovery.

pub mod classifier;
pub mod cycle;
pub mod recovery;

pub use classifier::{Availability, classify};
pub use cycle::{ClusterSummary, Monitor, MonitorOptions, MonitorSummary};
pub use recovery::{
    RecoveryOrchestrator, RecoveryOutcome, RecoverySettings, RecoveryState, Sleeper,
    ThreadSleeper,
};
