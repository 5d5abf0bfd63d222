// One-shot operator actions on a process

use crate::backends::command::CommandProbe;
use anyhow::Result;
use std::path::Path;

/// Forcefully terminate a process (SIGKILL)
///
/// Fire-and-forget: the signal is sent once and never retried. Only a
/// single positive PID is accepted; 0 and negative values would address a
/// process group or every process.
#[cfg(unix)]
pub fn terminate(pid: i32) -> Result<()> {
    use anyhow::Context;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    ensure_single_process(pid)?;
    kill(Pid::from_raw(pid), Signal::SIGKILL)
        .with_context(|| format!("Failed to kill process {}", pid))?;
    log::info!("Sent SIGKILL to PID {}", pid);
    Ok(())
}

#[cfg(not(unix))]
pub fn terminate(pid: i32) -> Result<()> {
    ensure_single_process(pid)?;
    anyhow::bail!("Terminating PID {} is not supported on this platform", pid)
}

fn ensure_single_process(pid: i32) -> Result<()> {
    if pid <= 0 {
        anyhow::bail!("Refusing to signal PID {}: not a single process", pid);
    }
    Ok(())
}

/// Program used to open a directory in the desktop file browser
fn file_browser() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    }
}

/// Open the directory containing `path` in the file browser
///
/// Returns whether the browser was launched. An empty path, the "N/A"
/// placeholder, or a parent directory that does not exist only logs a
/// diagnostic.
pub fn reveal_in_file_browser(path: &str, probe: &dyn CommandProbe) -> bool {
    if path.is_empty() || path == "N/A" {
        log::warn!("Invalid path: '{}'", path);
        return false;
    }

    let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) else {
        log::warn!("Path has no parent directory: {}", path);
        return false;
    };

    if !parent.is_dir() {
        log::warn!("Path does not exist: {}", parent.display());
        return false;
    }

    let parent = parent.to_string_lossy();
    match probe.output(file_browser(), &[parent.as_ref()]) {
        Ok(_) => {
            log::info!("Opened path: {}", parent);
            true
        }
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}
