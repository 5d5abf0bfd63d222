// Error taxonomy for the acquisition engine
//
// None of these are fatal to callers of the public entry points. They are
// produced internally, logged, and then folded into a "no contribution" or
// "line dropped" outcome.

use thiserror::Error;

/// Failure categories raised while probing external sources
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A fallback source returned no usable data
    #[error("{source_name}: no usable data for pid {pid}")]
    SourceUnavailable { source_name: &'static str, pid: i32 },

    /// A line or token matched no recognized pattern
    #[error("unrecognized {what}: '{input}'")]
    ParseMismatch { what: &'static str, input: String },

    /// The external command failed to launch or its I/O failed
    #[error("command '{program}' failed: {reason}")]
    SubprocessFailure { program: String, reason: String },

    /// An expected structured resource (e.g. a bundle's Info.plist) is absent or unreadable
    #[error("resource missing: {path}")]
    ResourceMissing { path: String },
}

impl ProbeError {
    pub fn unavailable(source_name: &'static str, pid: i32) -> Self {
        Self::SourceUnavailable { source_name, pid }
    }

    pub fn mismatch(what: &'static str, input: impl Into<String>) -> Self {
        Self::ParseMismatch {
            what,
            input: input.into(),
        }
    }
}
