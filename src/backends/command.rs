// External command execution
//
// Every inspection tool (ps, lsof, ...) goes through a CommandProbe so the
// sources and the connection enumerator can be exercised against canned
// output in tests.

use crate::error::ProbeError;
use std::process::{Command, Stdio};

/// Runs a single external inspection command and captures its stdout
pub trait CommandProbe: Send + Sync {
    /// Execute `program` with `args` and return its stdout as text
    ///
    /// A non-zero exit status is not an error: tools like lsof exit 1 when
    /// nothing matched, and whatever they printed is still usable.
    fn output(&self, program: &str, args: &[&str]) -> Result<String, ProbeError>;

    /// Like `output`, but failures are logged and collapsed to `None`
    fn capture(&self, program: &str, args: &[&str]) -> Option<String> {
        match self.output(program, args) {
            Ok(stdout) => Some(stdout),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }
}

/// CommandProbe backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandProbe;

impl CommandProbe for SystemCommandProbe {
    fn output(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ProbeError::SubprocessFailure {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::debug!(
                "{} {:?} exited with {}: {}",
                program,
                args,
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Check whether a command is on PATH
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
