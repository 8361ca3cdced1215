//! Slurm node health monitoring, automated node recovery, and pending-job
//! reason diagnostics.
//!
//! The [`monitor`] engine checks each cluster's nodes through its head node,
//! records every observation in an append-only [`store`], and walks problem
//! nodes through ordered recovery commands. The [`queue`] engine finds pending
//! jobs whose DOWN/DRAIN reason no longer matches the nodes they wait on.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod queue;
pub mod remote;
pub mod slurm;
pub mod store;
