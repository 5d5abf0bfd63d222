// OS process registry lookup
//
// The registry answers for "registered applications": processes whose image
// lives inside an application bundle. For those we report the bundle's own
// identifier, name and icon. Plain daemons and CLI tools are left to the
// later links of the chain.

use super::bundle::{bundle_icon_path, bundle_root, read_bundle_info};
use super::{MetadataQuery, MetadataSource, PartialMetadata};
use crate::backends::BackendPriority;
use crate::error::ProbeError;
use crate::process::Icon;
use anyhow::Result;
use std::path::PathBuf;

type PathLookup = Box<dyn Fn(i32) -> Option<PathBuf> + Send + Sync>;

pub struct RegistrySource {
    executable_path: PathLookup,
}

impl RegistrySource {
    pub fn new() -> Self {
        Self::with_path_lookup(native_executable_path)
    }

    /// Use a custom pid → executable path lookup
    pub fn with_path_lookup<F>(lookup: F) -> Self
    where
        F: Fn(i32) -> Option<PathBuf> + Send + Sync + 'static,
    {
        Self {
            executable_path: Box::new(lookup),
        }
    }
}

impl Default for RegistrySource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
fn native_executable_path(pid: i32) -> Option<PathBuf> {
    match libproc::libproc::proc_pid::pidpath(pid) {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        Ok(_) => None,
        Err(e) => {
            log::debug!("pidpath({}) failed: {}", pid, e);
            None
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn native_executable_path(pid: i32) -> Option<PathBuf> {
    use sysinfo::{Pid, System};

    let sys = System::new_all();
    let pid_obj = Pid::from_u32(u32::try_from(pid).ok()?);
    sys.process(pid_obj)
        .and_then(|p| p.exe())
        .map(|exe| exe.to_path_buf())
}

impl MetadataSource for RegistrySource {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn priority(&self) -> BackendPriority {
        BackendPriority::Best
    }

    fn resolve(&self, query: &MetadataQuery, _found: &PartialMetadata) -> Result<PartialMetadata> {
        let unavailable = || ProbeError::unavailable(self.name(), query.pid);

        let exe = (self.executable_path)(query.pid).ok_or_else(unavailable)?;
        let exe_str = exe.to_string_lossy();
        let (bundle, bundle_name) = bundle_root(&exe_str).ok_or_else(unavailable)?;

        let mut found = PartialMetadata {
            executable_path: Some(exe.clone()),
            ..Default::default()
        };

        match read_bundle_info(&bundle) {
            Ok(info) => {
                found.bundle_identifier = info.identifier;
                found.display_name = info.display_name.or(Some(bundle_name));
                found.icon = info
                    .icon_file
                    .and_then(|file| bundle_icon_path(&bundle, &file))
                    .map(Icon::Bundle);
            }
            Err(e) => {
                log::debug!("registry: bundle {:?} has no usable Info.plist: {}", bundle, e);
                found.display_name = Some(bundle_name);
            }
        }

        Ok(found)
    }
}
