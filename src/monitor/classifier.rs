//! Mapping of raw Slurm node state tokens to availability.

use serde::Serialize;

/// Availability verdict for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        *self == Availability::Available
    }
}

/// Classify a raw state token against a cluster's problem states.
///
/// Matching is a case-insensitive substring test because Slurm decorates state
/// tokens with suffixes (`drng`, `draining`, `down*`, `idle~`).
pub fn classify(raw_state: &str, problem_states: &[String]) -> Availability {
    let state = raw_state.to_lowercase();
    let is_problem = problem_states
        .iter()
        .map(|p| p.to_lowercase())
        .any(|p| state.contains(&p));

    if is_problem {
        Availability::Unavailable
    } else {
        Availability::Available
    }
}
