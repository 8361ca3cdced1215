//! `nodewatch queue`

use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::commands::Context;
use crate::commands::output::print_json;
use crate::queue::{QueueDiagnosticEngine, QueueFinding};
use crate::remote::Connector;

#[derive(Serialize)]
struct ClusterFindings {
    cluster: String,
    findings: Vec<QueueFinding>,
}

pub fn run_queue(ctx: &Context, cluster: Option<&str>, verbose: bool) -> Result<()> {
    let clusters = ctx.config.cluster_descriptors(cluster)?;
    let connector = ctx.connector();

    let mut results = Vec::new();
    for descriptor in &clusters {
        info!("Checking queue cluster={}", descriptor.name);
        let exec = connector.connect(descriptor);
        let engine =
            QueueDiagnosticEngine::new(&descriptor.name, exec.as_ref(), ctx.command_timeout());
        results.push(ClusterFindings {
            cluster: descriptor.name.clone(),
            findings: engine.diagnose_queue(),
        });
    }

    if ctx.is_json() {
        print_json(&results, "queue findings");
        return Ok(());
    }

    let total: usize = results.iter().map(|r| r.findings.len()).sum();
    for result in &results {
        println!("Cluster {}", result.cluster);
        if result.findings.is_empty() {
            println!("  No misleading statuses found\n");
            continue;
        }
        println!(
            "  Found {} misleading status messages:\n",
            result.findings.len()
        );
        for finding in &result.findings {
            let job = &finding.job;
            println!("  Job {} - {} ({})", job.job_id, job.name, job.user);
            println!("    Status says: {}", job.reason);
            println!("    Reality: {}", finding.real_reason);
            if verbose {
                for detail in &finding.details {
                    println!("      {}", detail);
                }
            }
            println!();
        }
    }
    println!("Total misleading job statuses: {}", total);
    Ok(())
}
