//! Operator notifications for problem nodes.

use anyhow::{Context, Result, bail};
use chrono::Local;
use log::{info, warn};
use std::io::Write;
use std::process::{Command, Stdio};

use crate::models::Severity;

pub trait Notifier {
    fn notify(&self, subject: &str, body: &str, severity: Severity) -> Result<()>;
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str, severity: Severity) -> Result<()> {
        match severity {
            Severity::Info => info!("Notification severity={} subject={}", severity, subject),
            _ => warn!("Notification severity={} subject={}", severity, subject),
        }
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            info!("  {}", line);
        }
        Ok(())
    }
}

/// Sends mail by piping an RFC 822 message to a sendmail-compatible binary
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    pub sendmail_binary: String,
    pub from: String,
    pub to: Vec<String>,
    /// Host reported in the message body
    pub control_host: String,
}

impl SendmailNotifier {
    fn message(&self, subject: &str, body: &str, severity: Severity) -> String {
        let level = severity.as_str().to_uppercase();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        format!(
            "From: {from}\n\
             To: {to}\n\
             Subject: [{level}] {subject}\n\
             \n\
             Cluster Node Monitor Alert\n\
             ==========================\n\
             \n\
             Time: {time}\n\
             Host: {host}\n\
             Severity: {level}\n\
             \n\
             {body}\n\
             \n\
             ---\n\
             This is an automated message from nodewatch\n\
             Running on {host} as {user}\n",
            from = self.from,
            to = self.to.join(", "),
            level = level,
            subject = subject,
            time = Local::now().format("%Y-%m-%d %H:%M:%S"),
            host = self.control_host,
            body = body.trim_end(),
            user = user,
        )
    }
}

impl Notifier for SendmailNotifier {
    fn notify(&self, subject: &str, body: &str, severity: Severity) -> Result<()> {
        if self.to.is_empty() {
            bail!("No notification recipients configured");
        }

        let message = self.message(subject, body, severity);
        let mut child = Command::new(&self.sendmail_binary)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.sendmail_binary))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.as_bytes())
                .context("Failed to write message to sendmail")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for sendmail")?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.sendmail_binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!("Notification sent subject={}", subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(binary: &str) -> SendmailNotifier {
        SendmailNotifier {
            sendmail_binary: binary.to_string(),
            from: "nodewatch@example.edu".to_string(),
            to: vec!["hpc@example.edu".to_string(), "ops@example.edu".to_string()],
            control_host: "monitor01".to_string(),
        }
    }

    #[test]
    fn test_message_headers() {
        let message = notifier("sendmail").message(
            "Cluster spydur: 2 node(s) down",
            "  - spdr07: down*\n",
            Severity::Critical,
        );
        assert!(message.starts_with("From: nodewatch@example.edu\n"));
        assert!(message.contains("To: hpc@example.edu, ops@example.edu\n"));
        assert!(message.contains("Subject: [CRITICAL] Cluster spydur: 2 node(s) down\n\n"));
        assert!(message.contains("Host: monitor01"));
        assert!(message.contains("  - spdr07: down*"));
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let result = notifier("/nonexistent/sendmail").notify("s", "b", Severity::Warning);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_recipients_is_an_error() {
        let mut n = notifier("sendmail");
        n.to.clear();
        assert!(n.notify("s", "b", Severity::Info).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_sendmail_pipe_succeeds() {
        // `cat -t` consumes stdin and exits 0, standing in for `sendmail -t`
        notifier("cat")
            .notify("subject line", "body line", Severity::Warning)
            .unwrap();
    }
}
