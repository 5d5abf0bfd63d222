// ps-based command name lookup

use super::{MetadataQuery, MetadataSource, PartialMetadata, file_name_of};
use crate::backends::BackendPriority;
use crate::backends::command::CommandProbe;
use crate::error::ProbeError;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Asks `ps -p <pid> -o comm=` for the command of a process
///
/// On macOS `comm` is the full executable path; elsewhere it is usually
/// just the (possibly truncated) command name.
pub struct PsSource {
    probe: Arc<dyn CommandProbe>,
}

impl PsSource {
    pub fn new(probe: Arc<dyn CommandProbe>) -> Self {
        Self { probe }
    }
}

impl MetadataSource for PsSource {
    fn name(&self) -> &'static str {
        "ps"
    }

    fn priority(&self) -> BackendPriority {
        BackendPriority::Good
    }

    fn resolve(&self, query: &MetadataQuery, _found: &PartialMetadata) -> Result<PartialMetadata> {
        let pid_arg = query.pid.to_string();
        let output = self
            .probe
            .capture("ps", &["-p", &pid_arg, "-o", "comm="])
            .unwrap_or_default();

        let command = output.trim();
        if command.is_empty() {
            return Err(ProbeError::unavailable(self.name(), query.pid).into());
        }

        if command.contains('/') {
            Ok(PartialMetadata {
                executable_path: Some(PathBuf::from(command)),
                display_name: file_name_of(command),
                ..Default::default()
            })
        } else {
            Ok(PartialMetadata {
                display_name: Some(command.to_string()),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::command::testing::ScriptedProbe;

    fn query(pid: i32) -> MetadataQuery<'static> {
        MetadataQuery { pid, name: "generic" }
    }

    #[test]
    fn test_full_path() {
        let probe = Arc::new(ScriptedProbe::new().with(
            "ps",
            &["-p", "42", "-o", "comm="],
            "/usr/libexec/trustd\n",
        ));
        let found = PsSource::new(probe)
            .resolve(&query(42), &PartialMetadata::default())
            .unwrap();

        assert_eq!(found.executable_path, Some(PathBuf::from("/usr/libexec/trustd")));
        assert_eq!(found.display_name.as_deref(), Some("trustd"));
    }

    #[test]
    fn test_bare_command_name() {
        let probe = Arc::new(ScriptedProbe::new().with("ps", &["-p", "42", "-o", "comm="], "sshd\n"));
        let found = PsSource::new(probe)
            .resolve(&query(42), &PartialMetadata::default())
            .unwrap();

        assert_eq!(found.executable_path, None);
        assert_eq!(found.display_name.as_deref(), Some("sshd"));
    }

    #[test]
    fn test_exited_process_is_unavailable() {
        let probe = Arc::new(ScriptedProbe::new());
        let err = PsSource::new(probe)
            .resolve(&query(42), &PartialMetadata::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProbeError>(),
            Some(ProbeError::SourceUnavailable { .. })
        ));
    }
}
