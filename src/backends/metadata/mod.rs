// Process metadata sources and the fallback chain
//
// Each source looks at one external place (the OS process registry, `ps`,
// `lsof`, the executable's path) and fills in whatever fields it can. The
// resolver walks the sources in order, merging partial results, until every
// field is known or the chain runs out.

mod bundle;
mod cache;
mod janitor;
mod open_files;
mod ps;
mod registry;
mod resolver;

pub use bundle::BundleIdentifierSource;
pub use janitor::CacheJanitor;
pub use open_files::OpenFilesSource;
pub use ps::PsSource;
pub use registry::RegistrySource;
pub use resolver::ProcessMetadataResolver;

use crate::backends::BackendPriority;
use crate::backends::command::CommandProbe;
use crate::process::{Icon, ProcessMetadata};
use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;

/// What the caller knows about the process being resolved
#[derive(Debug, Clone, Copy)]
pub struct MetadataQuery<'a> {
    pub pid: i32,
    /// Generic name from the traffic source (often a truncated command name)
    pub name: &'a str,
}

/// Fields a source managed to fill
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMetadata {
    pub bundle_identifier: Option<String>,
    pub executable_path: Option<PathBuf>,
    pub display_name: Option<String>,
    pub icon: Option<Icon>,
}

impl PartialMetadata {
    pub fn is_empty(&self) -> bool {
        self.bundle_identifier.is_none()
            && self.executable_path.is_none()
            && self.display_name.is_none()
            && self.icon.is_none()
    }

    /// All target fields are satisfied
    pub fn is_complete(&self) -> bool {
        self.bundle_identifier.is_some()
            && self.executable_path.is_some()
            && self.display_name.is_some()
            && self.icon.is_some()
    }

    /// Merge a lower-priority contribution into this one
    ///
    /// Fields already set win, except a display name that is just the
    /// caller's generic name, which any source with a real name replaces.
    /// Returns the names of the fields that changed.
    pub fn merge(&mut self, other: PartialMetadata, generic_name: &str) -> Vec<&'static str> {
        let mut filled = Vec::new();

        if self.bundle_identifier.is_none() && other.bundle_identifier.is_some() {
            self.bundle_identifier = other.bundle_identifier;
            filled.push("bundle_identifier");
        }
        if self.executable_path.is_none() && other.executable_path.is_some() {
            self.executable_path = other.executable_path;
            filled.push("executable_path");
        }
        let name_is_generic = match &self.display_name {
            None => true,
            Some(name) => name == generic_name,
        };
        if name_is_generic && other.display_name.is_some() && other.display_name != self.display_name
        {
            self.display_name = other.display_name;
            filled.push("display_name");
        }
        if self.icon.is_none() && other.icon.is_some() {
            self.icon = other.icon;
            filled.push("icon");
        }

        filled
    }

    /// Finish a resolution pass into a complete record
    pub fn into_metadata(self, query: &MetadataQuery) -> ProcessMetadata {
        ProcessMetadata {
            pid: query.pid,
            display_name: self.display_name.unwrap_or_else(|| query.name.to_string()),
            bundle_identifier: self.bundle_identifier,
            executable_path: self.executable_path,
            icon: self.icon.unwrap_or(Icon::Generic),
            resolved_at: Local::now(),
        }
    }
}

/// One link of the metadata fallback chain
pub trait MetadataSource: Send + Sync {
    /// Source name (e.g., "registry", "ps", "lsof")
    fn name(&self) -> &'static str;

    /// Source priority, used for display
    fn priority(&self) -> BackendPriority;

    /// Attempt a partial resolution
    ///
    /// `found` holds what earlier sources produced so a source can skip work
    /// that is already done. Errors are never fatal: the resolver logs them
    /// and moves on to the next source.
    fn resolve(&self, query: &MetadataQuery, found: &PartialMetadata) -> Result<PartialMetadata>;
}

/// Metadata source description for listing
#[derive(Debug, Clone)]
pub struct MetadataSourceInfo {
    pub name: &'static str,
    pub priority: BackendPriority,
}

/// The standard chain: registry → ps → lsof open files → synthesized identifier
pub fn default_sources(probe: Arc<dyn CommandProbe>) -> Vec<Box<dyn MetadataSource>> {
    vec![
        Box::new(RegistrySource::new()),
        Box::new(PsSource::new(probe.clone())),
        Box::new(OpenFilesSource::new(probe)),
        Box::new(BundleIdentifierSource),
    ]
}

/// Describe the sources of a chain in order
pub fn describe_sources(sources: &[Box<dyn MetadataSource>]) -> Vec<MetadataSourceInfo> {
    sources
        .iter()
        .map(|s| MetadataSourceInfo {
            name: s.name(),
            priority: s.priority(),
        })
        .collect()
}

/// Last path component, used as a display name for bare executables
pub(crate) fn file_name_of(path: &str) -> Option<String> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
