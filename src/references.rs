//! Metadata reference resolution
//!
//! Produces the reference set for the compilation context. The base runtime
//! assemblies are always present; the Unity/VRC API surface contributes stub
//! assemblies depending on the configured surface. Missing directories and
//! unreadable entries warn and are skipped.

use crate::settings::{ApiSurface, Settings};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Well-known base runtime assemblies, present in every compilation
pub const BASE_RUNTIME: &[&str] = &[
    "mscorlib.dll",
    "System.dll",
    "System.Core.dll",
    "netstandard.dll",
];

/// Directory of bundled stub assemblies, relative to the executable
pub const BUNDLED_STUB_DIR: &str = "Stubs/Generated";

/// The resolved reference set for one compilation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceSet {
    /// Reference assembly paths (base runtime names + discovered stubs)
    pub assemblies: Vec<PathBuf>,
    /// Whether any API-surface stubs were found
    pub has_api_surface: bool,
}

/// Resolve the reference set for the given settings.
///
/// `base_dir` is the directory the bundled `Stubs/Generated` tree lives
/// under (normally beside the executable).
pub fn resolve_references(settings: &Settings, base_dir: &Path) -> ReferenceSet {
    let mut set = ReferenceSet {
        assemblies: BASE_RUNTIME.iter().map(PathBuf::from).collect(),
        has_api_surface: false,
    };

    match settings.unity_api_surface {
        ApiSurface::BundledStubs => {
            let dir = base_dir.join(BUNDLED_STUB_DIR);
            collect_stubs(&dir, &mut set);
        }
        ApiSurface::CustomStubs => match &settings.custom_stub_path {
            Some(dir) => collect_stubs(dir, &mut set),
            None => tracing::warn!("custom-stubs surface without a stub path; base references only"),
        },
        ApiSurface::None => {}
    }

    set
}

fn collect_stubs(dir: &Path, set: &mut ReferenceSet) {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "stub directory missing; analysis degrades to syntax-only");
        return;
    }
    let mut found = 0usize;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable stub entry");
                continue;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("dll") {
            set.assemblies.push(path.to_path_buf());
            found += 1;
        }
    }
    if found == 0 {
        tracing::warn!(dir = %dir.display(), "stub directory contains no assemblies");
    } else {
        set.has_api_surface = true;
        tracing::debug!(dir = %dir.display(), count = found, "loaded stub references");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_surface_is_base_only() {
        let settings = Settings {
            unity_api_surface: ApiSurface::None,
            ..Settings::default()
        };
        let set = resolve_references(&settings, Path::new("/nonexistent"));
        assert_eq!(set.assemblies.len(), BASE_RUNTIME.len());
        assert!(!set.has_api_surface);
    }

    #[test]
    fn test_missing_bundled_dir_warns_but_succeeds() {
        let settings = Settings::default();
        let set = resolve_references(&settings, Path::new("/nonexistent"));
        assert_eq!(set.assemblies.len(), BASE_RUNTIME.len());
        assert!(!set.has_api_surface);
    }

    #[test]
    fn test_bundled_stub_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let stubs = dir.path().join(BUNDLED_STUB_DIR).join("Unity");
        std::fs::create_dir_all(&stubs).unwrap();
        std::fs::write(stubs.join("UnityEngine.CoreModule.dll"), b"").unwrap();
        std::fs::write(stubs.join("notes.txt"), b"").unwrap();

        let set = resolve_references(&Settings::default(), dir.path());
        assert!(set.has_api_surface);
        assert_eq!(set.assemblies.len(), BASE_RUNTIME.len() + 1);
    }

    #[test]
    fn test_custom_stub_discovery() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VRCSDK3.dll"), b"").unwrap();

        let settings = Settings {
            unity_api_surface: ApiSurface::CustomStubs,
            custom_stub_path: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let set = resolve_references(&settings, Path::new("/unused"));
        assert!(set.has_api_surface);
        assert!(set
            .assemblies
            .iter()
            .any(|p| p.file_name().unwrap() == "VRCSDK3.dll"));
    }
}
