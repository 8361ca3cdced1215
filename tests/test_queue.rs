//! Queue diagnostics against scripted squeue/scontrol output

mod common;

use common::{ScriptedExec, fail, ok};
use nodewatch::queue::QueueDiagnosticEngine;
use nodewatch::queue::diagnoser::{REASON_BUSY, REASON_CPUS_FULL, REASON_MEMORY_FULL};
use nodewatch::slurm::commands::PENDING_JOBS_COMMAND;
use rstest::rstest;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

const SCONTROL_CPUS_FULL: &str = "\
NodeName=node01 Arch=x86_64 CoresPerSocket=16
   CPUAlloc=32 CPUTot=32 CPULoad=31.90
   RealMemory=256000 AllocMem=128000 FreeMem=120000
   State=ALLOCATED ThreadsPerCore=1
NodeName=node02 Arch=x86_64 CoresPerSocket=16
   CPUAlloc=32 CPUTot=32 CPULoad=31.20
   RealMemory=256000 AllocMem=64000 FreeMem=190000
   State=ALLOCATED ThreadsPerCore=1
";

const SCONTROL_BUSY: &str = "\
NodeName=node03 CPUAlloc=4 CPUTot=32 RealMemory=256000 AllocMem=1000 State=MIXED
";

const SCONTROL_ALL_DOWN: &str = "\
NodeName=node01 CPUAlloc=0 CPUTot=32 RealMemory=256000 AllocMem=0 State=DOWN
NodeName=node02 CPUAlloc=0 CPUTot=32 RealMemory=256000 AllocMem=0 State=DRAINED
";

const SCONTROL_MEMORY_FULL: &str = "\
NodeName=node51 CPUAlloc=8 CPUTot=64 RealMemory=512000 AllocMem=511500 State=MIXED
";

#[rstest]
fn test_only_down_or_drain_jobs_are_checked() {
    let squeue = "\
2001|batch|train|alice|Nodes required for job are DOWN, DRAINED or reserved|node[01-02]
2002|gpu|sim|bob|Resources|(Resources)
2003|batch|post|alice|ReqNodeNotAvail, UnavailableNodes:node05|node05
";
    let exec = ScriptedExec::new(vec![ok(squeue), ok(SCONTROL_CPUS_FULL)]);
    let engine = QueueDiagnosticEngine::new("arachne", &exec, TIMEOUT);

    let findings = engine.diagnose_queue();

    let commands = exec.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0], PENDING_JOBS_COMMAND);
    assert_eq!(commands[1], "scontrol show node node01,node02");

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].job.user, "alice");
    assert_eq!(findings[0].nodes, vec!["node01", "node02"]);
    assert_eq!(findings[0].real_reason, REASON_CPUS_FULL);
    assert_eq!(
        findings[0].details,
        vec!["node01: 0/32 CPUs free", "node02: 0/32 CPUs free"]
    );
}

#[rstest]
#[case::cpus("node[01-02]", SCONTROL_CPUS_FULL, REASON_CPUS_FULL)]
#[case::busy("node03", SCONTROL_BUSY, REASON_BUSY)]
#[case::memory("node51", SCONTROL_MEMORY_FULL, REASON_MEMORY_FULL)]
fn test_real_reason_attribution(
    #[case] nodelist: &str,
    #[case] scontrol: &str,
    #[case] expected: &str,
) {
    let squeue = format!(
        "3001|batch|md|carol|Nodes required for job are DOWN, DRAINED or reserved|{}\n",
        nodelist
    );
    let exec = ScriptedExec::new(vec![ok(&squeue), ok(scontrol)]);
    let engine = QueueDiagnosticEngine::new("spydur", &exec, TIMEOUT);

    let findings = engine.diagnose_queue();

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].job.job_id, "3001");
    assert_eq!(findings[0].real_reason, expected);
    assert!(!findings[0].details.is_empty());
}

#[rstest]
fn test_accurate_down_reason_is_not_reported() {
    let squeue =
        "4001|batch|md|carol|Nodes required for job are DOWN, DRAINED or reserved|node[01-02]\n";
    let exec = ScriptedExec::new(vec![ok(squeue), ok(SCONTROL_ALL_DOWN)]);
    let engine = QueueDiagnosticEngine::new("spydur", &exec, TIMEOUT);

    assert!(engine.diagnose_queue().is_empty());
    assert_eq!(exec.commands().len(), 2);
}

#[rstest]
fn test_keywords_are_case_sensitive() {
    let squeue = "5001|batch|md|carol|node is down for maintenance|node01\n";
    let exec = ScriptedExec::new(vec![ok(squeue)]);
    let engine = QueueDiagnosticEngine::new("spydur", &exec, TIMEOUT);

    assert!(engine.diagnose_queue().is_empty());
    assert_eq!(exec.commands().len(), 1);
}

#[rstest]
fn test_squeue_failure_yields_no_findings() {
    let exec = ScriptedExec::new(vec![fail(1, "squeue: error: Invalid user")]);
    let engine = QueueDiagnosticEngine::new("spydur", &exec, TIMEOUT);

    assert!(engine.fetch_pending_jobs().is_empty());
}

#[rstest]
#[case::unassigned("(null)")]
#[case::resources_placeholder("(Resources)")]
fn test_unexpandable_nodelist_is_skipped(#[case] nodelist: &str) {
    let squeue = format!("6001|batch|md|carol|DRAIN|{}\n", nodelist);
    let exec = ScriptedExec::new(vec![ok(&squeue)]);
    let engine = QueueDiagnosticEngine::new("spydur", &exec, TIMEOUT);

    assert!(engine.diagnose_queue().is_empty());
    assert_eq!(exec.commands().len(), 1);
}

#[rstest]
fn test_scontrol_failure_skips_job() {
    let squeue = "7001|batch|md|carol|DOWN|node01\n7002|batch|md|dave|DOWN|node03\n";
    let exec = ScriptedExec::new(vec![
        ok(squeue),
        fail(1, "Node node01 not found"),
        ok(SCONTROL_BUSY),
    ]);
    let engine = QueueDiagnosticEngine::new("spydur", &exec, TIMEOUT);

    let findings = engine.diagnose_queue();

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].job.job_id, "7002");
    assert_eq!(findings[0].nodes, vec!["node03"]);
}
