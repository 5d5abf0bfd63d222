// lsof open-files lookup for the executable path

use super::{MetadataQuery, MetadataSource, PartialMetadata, file_name_of};
use crate::backends::BackendPriority;
use crate::backends::command::CommandProbe;
use crate::error::ProbeError;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Finds the executable among a process's open files with `lsof -p <pid> -Fn`
///
/// Field output has one record per line, prefixed by a field marker:
///
/// ```text
/// p812        <- PID
/// fcwd        <- file descriptor
/// n/          <- name
/// ftxt
/// n/Applications/Safari.app/Contents/MacOS/Safari
/// ```
///
/// The first name record that is a path to an executable regular file is
/// taken to be the process image.
pub struct OpenFilesSource {
    probe: Arc<dyn CommandProbe>,
}

impl OpenFilesSource {
    pub fn new(probe: Arc<dyn CommandProbe>) -> Self {
        Self { probe }
    }

    /// First executable path in `lsof -Fn` output
    pub fn find_executable(output: &str) -> Option<PathBuf> {
        output
            .lines()
            .filter_map(|line| line.strip_prefix('n'))
            .filter(|name| name.contains('/'))
            .map(Path::new)
            .find(|path| is_executable(path))
            .map(Path::to_path_buf)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl MetadataSource for OpenFilesSource {
    fn name(&self) -> &'static str {
        "lsof"
    }

    fn priority(&self) -> BackendPriority {
        BackendPriority::Good
    }

    fn resolve(&self, query: &MetadataQuery, found: &PartialMetadata) -> Result<PartialMetadata> {
        // Only needed when nothing earlier produced a path
        if found.executable_path.is_some() {
            return Ok(PartialMetadata::default());
        }

        let pid_arg = query.pid.to_string();
        let output = self
            .probe
            .capture("lsof", &["-p", &pid_arg, "-Fn"])
            .unwrap_or_default();

        let path = Self::find_executable(&output)
            .ok_or_else(|| ProbeError::unavailable(self.name(), query.pid))?;

        Ok(PartialMetadata {
            display_name: file_name_of(&path.to_string_lossy()),
            executable_path: Some(path),
            ..Default::default()
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::backends::command::testing::ScriptedProbe;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_first_executable_regular_file_wins() {
        let dir = TempDir::new().unwrap();
        let data = make_file(dir.path(), "data.db", 0o644);
        let exe = make_file(dir.path(), "worker", 0o755);
        let later = make_file(dir.path(), "libfoo.dylib", 0o755);

        let output = format!(
            "p812\nfcwd\nn{}\nf3\nn{}\nftxt\nn{}\nftxt\nn{}\nf4\nn*:5353\n",
            dir.path().display(),
            data.display(),
            exe.display(),
            later.display()
        );

        assert_eq!(OpenFilesSource::find_executable(&output), Some(exe));
    }

    #[test]
    fn test_no_executable() {
        assert_eq!(OpenFilesSource::find_executable("p1\nf0\nn/dev/null\n"), None);
        assert_eq!(OpenFilesSource::find_executable(""), None);
    }

    #[test]
    fn test_skipped_when_path_known() {
        let probe = Arc::new(ScriptedProbe::new());
        let found = PartialMetadata {
            executable_path: Some(PathBuf::from("/usr/bin/true")),
            ..Default::default()
        };
        let source = OpenFilesSource::new(probe.clone());
        let result = source
            .resolve(&MetadataQuery { pid: 1, name: "true" }, &found)
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(probe.call_count(), 0);
    }

    #[test]
    fn test_resolves_path_and_name() {
        let dir = TempDir::new().unwrap();
        let exe = make_file(dir.path(), "agent", 0o755);
        let probe = Arc::new(ScriptedProbe::new().with(
            "lsof",
            &["-p", "99", "-Fn"],
            &format!("p99\nftxt\nn{}\n", exe.display()),
        ));

        let result = OpenFilesSource::new(probe)
            .resolve(&MetadataQuery { pid: 99, name: "agent" }, &PartialMetadata::default())
            .unwrap();

        assert_eq!(result.executable_path, Some(exe));
        assert_eq!(result.display_name.as_deref(), Some("agent"));
    }
}
