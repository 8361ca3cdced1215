//! Remote command execution through a cluster's head node.
//!
//! Every scheduler query and recovery command is sent as one remote-shell string
//! over `ssh <user>@<head_node>`. Failures of any kind (non-zero exit, timeout,
//! connection refused, missing ssh binary) come back as an unsuccessful
//! [`ExecResult`]; nothing here returns an error.

use log::{debug, trace, warn};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::models::{ClusterDescriptor, ExecResult};

/// How often a running child is polled while waiting for it to exit
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Executes a command string against a fixed host/user pair
pub trait RemoteExec {
    fn execute(&self, command: &str, timeout: Duration) -> ExecResult;

    /// Human-readable form of the full invocation, recorded in the audit trail
    fn describe(&self, command: &str) -> String {
        command.to_string()
    }
}

/// Builds a [`RemoteExec`] bound to a cluster's head node
pub trait Connector {
    fn connect(&self, cluster: &ClusterDescriptor) -> Box<dyn RemoteExec>;
}

/// SSH client options shared by all clusters
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// ssh executable (allows for testing with a fake binary)
    pub binary: String,
    pub connect_timeout_secs: u64,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            binary: "ssh".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

/// Runs commands on `user@host` with the system ssh client
#[derive(Debug, Clone)]
pub struct SshExec {
    user: String,
    host: String,
    options: SshOptions,
}

impl SshExec {
    pub fn new(user: &str, host: &str, options: SshOptions) -> Self {
        Self {
            user: user.to_string(),
            host: host.to_string(),
            options,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn ssh_args(&self, command: &str) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout_secs),
            self.destination(),
            command.to_string(),
        ]
    }
}

impl RemoteExec for SshExec {
    fn execute(&self, command: &str, timeout: Duration) -> ExecResult {
        debug!("Running remote command host={} command={}", self.host, command);
        let mut cmd = Command::new(&self.options.binary);
        cmd.args(self.ssh_args(command));
        run_with_timeout(cmd, timeout)
    }

    fn describe(&self, command: &str) -> String {
        format!(
            "{} {} {}",
            self.options.binary,
            self.destination(),
            shell_quote(command)
        )
    }
}

/// Quote a string for a POSIX shell using single quotes.
///
/// Embedded single quotes become `'\''`. This is the only quoting applied to
/// remote commands; metacharacters are never parsed.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Connects to each cluster's head node as its management user
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    pub options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

impl Connector for SshConnector {
    fn connect(&self, cluster: &ClusterDescriptor) -> Box<dyn RemoteExec> {
        Box::new(SshExec::new(
            &cluster.user,
            &cluster.head_node,
            self.options.clone(),
        ))
    }
}

/// Run a command, killing it if it outlives `timeout`.
///
/// Output pipes are drained on helper threads so a chatty command cannot block
/// on a full pipe while we wait for it.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> ExecResult {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to start command {:?}: {}", cmd.get_program(), e);
            return ExecResult::failure(ExecResult::SYNTHETIC_FAILURE, e.to_string());
        }
    };

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = wait_for_exit(&mut child, timeout);
    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);

    match status {
        Some(code) => {
            trace!("Command exited code={} stdout=[{}]", code, stdout);
            ExecResult {
                ok: code == 0,
                exit_code: code,
                stdout,
                stderr,
            }
        }
        None => ExecResult {
            ok: false,
            exit_code: ExecResult::SYNTHETIC_FAILURE,
            stdout,
            stderr: format!("Command timed out after {} seconds", timeout.as_secs()),
        },
    }
}

/// Poll until the child exits. Returns None on timeout (after killing it).
fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<i32> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Some(status.code().unwrap_or(ExecResult::SYNTHETIC_FAILURE));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to poll child process: {}", e);
                return Some(ExecResult::SYNTHETIC_FAILURE);
            }
        }

        if Instant::now() >= deadline {
            warn!("Command exceeded timeout of {:?}, killing it", timeout);
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<thread::JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).to_string()
        })
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
