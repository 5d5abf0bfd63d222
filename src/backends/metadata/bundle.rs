// Application bundle inspection and bundle identifier synthesis
//
// When no authoritative identifier is available we derive a plausible
// reverse-DNS one from where the executable lives. The result is not
// guaranteed to be the real identifier, only stable for a given path.

use super::{MetadataQuery, MetadataSource, PartialMetadata};
use crate::backends::BackendPriority;
use crate::error::ProbeError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const BUNDLE_SUFFIX: &str = ".app";
const FRAMEWORK_SUFFIX: &str = ".framework";
const INFO_PLIST: &str = "Contents/Info.plist";
const RESOURCES_DIR: &str = "Contents/Resources";

/// Fields read from a bundle's Info.plist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleInfo {
    pub identifier: Option<String>,
    pub display_name: Option<String>,
    pub icon_file: Option<String>,
}

/// Innermost application bundle containing `path`
///
/// Returns the bundle directory and its name without the suffix.
pub fn bundle_root(path: &str) -> Option<(PathBuf, String)> {
    let components: Vec<&str> = path.split('/').collect();
    let idx = components
        .iter()
        .rposition(|c| c.len() > BUNDLE_SUFFIX.len() && c.ends_with(BUNDLE_SUFFIX))?;

    let bundle_path = components[..=idx].join("/");
    let bundle_name = components[idx]
        .strip_suffix(BUNDLE_SUFFIX)
        .unwrap_or(components[idx])
        .to_string();

    Some((PathBuf::from(bundle_path), bundle_name))
}

/// Read the interesting keys out of `<bundle>/Contents/Info.plist`
///
/// XML and binary property lists are both understood. Only keys of the
/// top-level dictionary are consulted.
pub fn read_bundle_info(bundle: &Path) -> Result<BundleInfo> {
    let plist_path = bundle.join(INFO_PLIST);
    if !plist_path.is_file() {
        return Err(ProbeError::ResourceMissing {
            path: plist_path.display().to_string(),
        }
        .into());
    }

    let value = plist::Value::from_file(&plist_path)
        .with_context(|| format!("Failed to parse Info.plist: {:?}", plist_path))?;
    let dict = value.as_dictionary().ok_or_else(|| {
        ProbeError::mismatch("Info.plist root (not a dictionary)", plist_path.display().to_string())
    })?;

    let string = |key: &str| {
        dict.get(key)
            .and_then(plist::Value::as_string)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(BundleInfo {
        identifier: string("CFBundleIdentifier"),
        display_name: string("CFBundleDisplayName").or_else(|| string("CFBundleName")),
        icon_file: string("CFBundleIconFile"),
    })
}

/// Resolve the icon resource named by CFBundleIconFile, if it exists on disk
pub fn bundle_icon_path(bundle: &Path, icon_file: &str) -> Option<PathBuf> {
    let mut name = icon_file.to_string();
    if Path::new(&name).extension().is_none() {
        name.push_str(".icns");
    }

    let path = bundle.join(RESOURCES_DIR).join(name);
    path.is_file().then_some(path)
}

/// Bundle name reduced to an identifier segment
fn sanitize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '(' | ')'))
        .collect()
}

/// Lowercased last path component
fn process_component(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Name of the first `*.framework` segment of `path`
fn framework_name(path: &str) -> Option<String> {
    path.split('/')
        .find_map(|c| c.strip_suffix(FRAMEWORK_SUFFIX))
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
}

/// Identifier for an executable outside any application bundle
fn system_identifier(path: &str) -> String {
    let proc_name = process_component(path);

    if path.starts_with("/System/") || path.starts_with("/usr/sbin/") || path.starts_with("/usr/bin/")
    {
        format!("com.apple.system.{}", proc_name)
    } else if path.starts_with("/Library/") {
        format!("com.system.library.{}", proc_name)
    } else if path.contains("/Frameworks/") {
        match framework_name(path) {
            Some(framework) => format!("com.framework.{}.{}", framework, proc_name),
            None => format!("com.framework.{}", proc_name),
        }
    } else if path.starts_with("/private/") {
        format!("com.system.private.{}", proc_name)
    } else {
        format!("com.process.{}", proc_name)
    }
}

/// Derive a bundle identifier for the executable at `path`
///
/// Total and deterministic for a given filesystem state: the innermost
/// bundle's Info.plist wins, then `com.unknown.<bundle>`, then a
/// location-based identifier for unbundled executables.
pub fn synthesize(path: &str) -> String {
    let Some((bundle, bundle_name)) = bundle_root(path) else {
        return system_identifier(path);
    };

    match read_bundle_info(&bundle) {
        Ok(BundleInfo {
            identifier: Some(identifier),
            ..
        }) => identifier,
        Ok(_) => format!("com.unknown.{}", sanitize(&bundle_name)),
        Err(e) => {
            log::debug!("No bundle identifier for {:?}: {}", bundle, e);
            format!("com.unknown.{}", sanitize(&bundle_name))
        }
    }
}

/// Last link of the fallback chain: fills a missing bundle identifier from the path
pub struct BundleIdentifierSource;

impl MetadataSource for BundleIdentifierSource {
    fn name(&self) -> &'static str {
        "bundle-id-synthesizer"
    }

    fn priority(&self) -> BackendPriority {
        BackendPriority::Fallback
    }

    fn resolve(&self, query: &MetadataQuery, found: &PartialMetadata) -> Result<PartialMetadata> {
        if found.bundle_identifier.is_some() {
            return Ok(PartialMetadata::default());
        }

        let path = found
            .executable_path
            .as_ref()
            .ok_or_else(|| ProbeError::unavailable(self.name(), query.pid))?;

        Ok(PartialMetadata {
            bundle_identifier: Some(synthesize(&path.to_string_lossy())),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_bundle(root: &Path, name: &str, plist: &str) -> PathBuf {
        let bundle = root.join(format!("{}.app", name));
        fs::create_dir_all(bundle.join("Contents/MacOS")).unwrap();
        fs::create_dir_all(bundle.join(RESOURCES_DIR)).unwrap();
        fs::write(bundle.join(INFO_PLIST), plist).unwrap();
        bundle
    }

    const PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleExecutable</key>
	<string>Foo</string>
	<key>CFBundleIdentifier</key>
	<string>com.example.foo</string>
	<key>CFBundleName</key>
	<string>Foo &amp; Bar</string>
	<key>CFBundleIconFile</key>
	<string>AppIcon</string>
</dict>
</plist>
"#;

    #[test]
    fn test_unreadable_bundle_falls_back_to_unknown() {
        assert_eq!(
            synthesize("/Applications/Foo.app/Contents/MacOS/Foo"),
            "com.unknown.foo"
        );
    }

    #[test]
    fn test_bundle_name_sanitized() {
        assert_eq!(
            synthesize("/nonexistent/My App (Beta).app/Contents/MacOS/My App"),
            "com.unknown.myappbeta"
        );
    }

    #[test]
    fn test_system_paths() {
        assert_eq!(synthesize("/usr/sbin/somedaemon"), "com.apple.system.somedaemon");
        assert_eq!(synthesize("/usr/bin/ssh"), "com.apple.system.ssh");
        assert_eq!(
            synthesize("/System/Library/CoreServices/launchservicesd"),
            "com.apple.system.launchservicesd"
        );
        assert_eq!(
            synthesize("/Library/Application Support/Vendor/Agent"),
            "com.system.library.agent"
        );
        assert_eq!(synthesize("/private/var/tmp/Worker"), "com.system.private.worker");
        assert_eq!(synthesize("/opt/homebrew/bin/node"), "com.process.node");
    }

    #[test]
    fn test_framework_paths() {
        assert_eq!(
            synthesize("/opt/Frameworks/Sparkle.framework/Versions/B/Autoupdate"),
            "com.framework.sparkle.autoupdate"
        );
        assert_eq!(synthesize("/opt/Frameworks/helper"), "com.framework.helper");
    }

    #[test]
    fn test_total_on_unstructured_input() {
        for input in ["", "/", "garbage", ".app", "////", "no/slash/prefix.app"] {
            assert_eq!(synthesize(input), synthesize(input));
        }
        assert_eq!(synthesize(""), "com.process.");
        assert_eq!(synthesize("garbage"), "com.process.garbage");
    }

    #[test]
    fn test_innermost_bundle_wins() {
        let (bundle, name) =
            bundle_root("/Applications/Outer.app/Contents/Helpers/Inner.app/Contents/MacOS/Inner")
                .unwrap();
        assert_eq!(name, "Inner");
        assert_eq!(
            bundle,
            PathBuf::from("/Applications/Outer.app/Contents/Helpers/Inner.app")
        );
        assert!(bundle_root("/System/Library/com.apple.foo").is_none());
    }

    #[test]
    fn test_plist_identifier_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "Foo", PLIST);
        let exe = bundle.join("Contents/MacOS/Foo");

        assert_eq!(synthesize(&exe.to_string_lossy()), "com.example.foo");

        let info = read_bundle_info(&bundle).unwrap();
        assert_eq!(info.display_name.as_deref(), Some("Foo & Bar"));
        assert_eq!(info.icon_file.as_deref(), Some("AppIcon"));
    }

    #[test]
    fn test_plist_without_identifier() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "Odd Tool", "<plist><dict></dict></plist>");
        let exe = bundle.join("Contents/MacOS/tool");
        assert_eq!(synthesize(&exe.to_string_lossy()), "com.unknown.oddtool");
    }

    #[test]
    fn test_binary_plist_identifier_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "BinFoo", "");

        let mut dict = plist::Dictionary::new();
        dict.insert(
            "CFBundleIdentifier".to_string(),
            plist::Value::String("com.example.binfoo".to_string()),
        );
        dict.insert(
            "CFBundleName".to_string(),
            plist::Value::String("Bin Foo".to_string()),
        );
        plist::Value::Dictionary(dict)
            .to_file_binary(bundle.join(INFO_PLIST))
            .unwrap();

        let exe = bundle.join("Contents/MacOS/BinFoo");
        assert_eq!(synthesize(&exe.to_string_lossy()), "com.example.binfoo");
        assert_eq!(
            read_bundle_info(&bundle).unwrap().display_name.as_deref(),
            Some("Bin Foo")
        );
    }

    #[test]
    fn test_nested_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(
            dir.path(),
            "Nested",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>CFBundleDocumentTypes</key>
	<array>
		<dict>
			<key>CFBundleIdentifier</key>
			<string>com.example.document</string>
		</dict>
	</array>
	<key>CFBundleIdentifier</key>
	<string>com.example.nested</string>
</dict>
</plist>
"#,
        );

        let info = read_bundle_info(&bundle).unwrap();
        assert_eq!(info.identifier.as_deref(), Some("com.example.nested"));
    }

    #[test]
    fn test_corrupt_plist_falls_back_to_unknown() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "Broken", "bplist00\u{1}\u{2}");
        assert!(read_bundle_info(&bundle).is_err());

        let exe = bundle.join("Contents/MacOS/Broken");
        assert_eq!(synthesize(&exe.to_string_lossy()), "com.unknown.broken");
    }

    #[test]
    fn test_missing_plist_is_resource_missing() {
        let dir = TempDir::new().unwrap();
        let err = read_bundle_info(&dir.path().join("Gone.app")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProbeError>(),
            Some(ProbeError::ResourceMissing { .. })
        ));
    }

    #[test]
    fn test_icon_path_requires_file() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(dir.path(), "Foo", PLIST);
        assert_eq!(bundle_icon_path(&bundle, "AppIcon"), None);

        fs::write(bundle.join(RESOURCES_DIR).join("AppIcon.icns"), b"icns").unwrap();
        assert_eq!(
            bundle_icon_path(&bundle, "AppIcon"),
            Some(bundle.join(RESOURCES_DIR).join("AppIcon.icns"))
        );
    }
}
