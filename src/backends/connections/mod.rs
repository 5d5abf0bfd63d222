// Per-process socket enumeration backends
//
// A ConnectionEnumerator answers "which sockets does this PID hold right
// now". Each call is a fresh query; nothing is cached between calls.

mod address;
mod lsof;

pub use lsof::LsofConnectionEnumerator;

use crate::backends::command::CommandProbe;
use crate::backends::{BackendCapabilities, BackendPriority};
use crate::process::NetworkConnection;
use anyhow::Result;
use std::sync::Arc;

/// Per-process socket listing backend
pub trait ConnectionEnumerator: Send + Sync {
    /// Backend name (e.g., "lsof")
    fn name(&self) -> &'static str;

    /// Backend priority for auto-selection
    fn priority(&self) -> BackendPriority;

    /// Check if this backend is available on the current system
    fn is_available() -> bool
    where
        Self: Sized;

    /// Get backend capabilities
    fn capabilities(&self) -> BackendCapabilities;

    /// List the sockets currently held by `pid`
    ///
    /// Never fails: a tool that cannot run or rows that cannot be parsed
    /// simply shorten the result, down to an empty vec.
    fn enumerate(&self, pid: i32) -> Vec<NetworkConnection>;
}

/// Connection enumerator metadata for selection
#[derive(Debug, Clone)]
pub struct ConnectionBackendInfo {
    pub name: &'static str,
    pub priority: BackendPriority,
    pub available: bool,
}

/// Detect all connection enumerator backends on the current system
pub fn detect_connection_backends() -> Vec<ConnectionBackendInfo> {
    vec![ConnectionBackendInfo {
        name: "lsof",
        priority: BackendPriority::Good,
        available: LsofConnectionEnumerator::is_available(),
    }]
}

/// Select a connection enumerator
///
/// An explicit preference is honoured even if the tool is missing; the
/// enumerator then just returns empty results.
pub fn select_connection_enumerator(
    preference: Option<&str>,
    probe: Arc<dyn CommandProbe>,
    include_listening: bool,
) -> Result<Box<dyn ConnectionEnumerator>> {
    match preference {
        Some("lsof") => Ok(Box::new(LsofConnectionEnumerator::new(
            probe,
            include_listening,
        ))),
        Some(name) => Err(anyhow::anyhow!("Unknown connection backend: {}", name)),
        None => {
            if !LsofConnectionEnumerator::is_available() {
                log::warn!("lsof not found; connection listings will be empty");
            }
            Ok(Box::new(LsofConnectionEnumerator::new(
                probe,
                include_listening,
            )))
        }
    }
}
