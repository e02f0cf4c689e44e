//! Configuration resolution
//!
//! Settings arrive as LSP payloads (`initializationOptions` and
//! `workspace/didChangeConfiguration`) scoped to the `udonsharpLinter` key.
//! Resolution is total: unknown keys are ignored, invalid enum values fall
//! back to their defaults with a warning, and nonsensical combinations are
//! dropped. The resolved snapshot is immutable and compared structurally to
//! decide whether a change event fires.

use crate::diagnostic::Severity;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which Unity/VRC API surface backs the compilation references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiSurface {
    /// Stub assemblies bundled beside the executable
    #[default]
    BundledStubs,
    /// Stub assemblies from a user-supplied directory
    CustomStubs,
    /// Base runtime references only
    None,
}

impl fmt::Display for ApiSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiSurface::BundledStubs => write!(f, "bundled-stubs"),
            ApiSurface::CustomStubs => write!(f, "custom-stubs"),
            ApiSurface::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for ApiSurface {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bundled-stubs" | "bundled" => Ok(ApiSurface::BundledStubs),
            "custom-stubs" | "custom" => Ok(ApiSurface::CustomStubs),
            "none" => Ok(ApiSurface::None),
            _ => Err(()),
        }
    }
}

/// Telemetry aggregation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryMode {
    Off,
    #[default]
    Minimal,
}

impl std::str::FromStr for TelemetryMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(TelemetryMode::Off),
            "minimal" => Ok(TelemetryMode::Minimal),
            _ => Err(()),
        }
    }
}

/// Recognised severity-profile names; unknown profiles resolve to defaults
pub const KNOWN_PROFILES: &[&str] = &["latest", "legacy_0.x", "strict_experimental"];

/// Immutable configuration snapshot, replaced atomically on change
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Active severity profile (opaque string, see [`KNOWN_PROFILES`])
    pub profile: String,

    /// Per-rule severity overrides; keys upper-cased
    pub rule_overrides: BTreeMap<String, Severity>,

    /// API surface backing the compilation references
    pub unity_api_surface: ApiSurface,

    /// Stub directory, present iff the surface is `custom-stubs`
    pub custom_stub_path: Option<PathBuf>,

    /// Loosen the runtime-event signature rule for ref/out parameters
    pub allow_ref_out: bool,

    /// Whether code actions are advertised (advertisement only)
    pub code_actions_enabled: bool,

    /// Telemetry aggregation
    pub telemetry: TelemetryMode,

    /// Extra policy pack files, in load order
    pub policy_pack_paths: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: "latest".to_string(),
            rule_overrides: BTreeMap::new(),
            unity_api_surface: ApiSurface::default(),
            custom_stub_path: None,
            allow_ref_out: false,
            code_actions_enabled: true,
            telemetry: TelemetryMode::default(),
            policy_pack_paths: Vec::new(),
        }
    }
}

impl Settings {
    /// Resolve a configuration payload.
    ///
    /// Accepts either the scoped object itself or a wrapper carrying an
    /// `udonsharpLinter` key, which covers both `initializationOptions` and
    /// `didChangeConfiguration` shapes.
    pub fn resolve(payload: Option<&Value>, workspace_root: Option<&Path>) -> Self {
        let mut settings = Settings::default();

        let Some(payload) = payload else {
            return settings;
        };
        let scoped = payload.get("udonsharpLinter").unwrap_or(payload);
        let Some(obj) = scoped.as_object() else {
            return settings;
        };

        if let Some(profile) = obj.get("profile").and_then(Value::as_str) {
            if !KNOWN_PROFILES.contains(&profile) {
                tracing::warn!(profile, "unrecognised profile; defaults will apply");
            }
            settings.profile = profile.to_string();
        }

        if let Some(overrides) = obj.get("ruleOverrides").and_then(Value::as_object) {
            for (id, value) in overrides {
                let Some(text) = value.as_str() else {
                    tracing::warn!(rule = %id, "ignoring non-string severity override");
                    continue;
                };
                match text.parse::<Severity>() {
                    Ok(severity) => {
                        settings
                            .rule_overrides
                            .insert(id.to_ascii_uppercase(), severity);
                    }
                    Err(()) => {
                        tracing::warn!(rule = %id, value = text, "ignoring invalid severity")
                    }
                }
            }
        }

        if let Some(surface) = obj.get("unityApiSurface").and_then(Value::as_str) {
            match surface.parse::<ApiSurface>() {
                Ok(parsed) => settings.unity_api_surface = parsed,
                Err(()) => tracing::warn!(value = surface, "invalid unityApiSurface; using default"),
            }
        }

        if let Some(path) = obj.get("customStubPath").and_then(Value::as_str) {
            settings.custom_stub_path = Some(resolve_path(path, workspace_root));
        }
        // customStubPath is only meaningful for the custom-stubs surface
        if settings.unity_api_surface != ApiSurface::CustomStubs {
            settings.custom_stub_path = None;
        } else if settings.custom_stub_path.is_none() {
            tracing::warn!("custom-stubs surface selected without customStubPath");
        }

        if let Some(b) = obj.get("allowRefOut").and_then(Value::as_bool) {
            settings.allow_ref_out = b;
        }
        if let Some(b) = obj.get("codeActionsEnabled").and_then(Value::as_bool) {
            settings.code_actions_enabled = b;
        }

        if let Some(mode) = obj.get("telemetry").and_then(Value::as_str) {
            match mode.parse::<TelemetryMode>() {
                Ok(parsed) => settings.telemetry = parsed,
                Err(()) => tracing::warn!(value = mode, "invalid telemetry mode; using default"),
            }
        }

        if let Some(paths) = obj.get("policyPackPaths").and_then(Value::as_array) {
            settings.policy_pack_paths = paths
                .iter()
                .filter_map(Value::as_str)
                .map(|p| resolve_path(p, workspace_root))
                .collect();
        }

        settings
    }

    /// User override for a rule ID, if any
    pub fn override_for(&self, rule_id: &str) -> Option<Severity> {
        self.rule_overrides.get(&rule_id.to_ascii_uppercase()).copied()
    }
}

/// Resolve tilde-prefixed and workspace-relative paths to absolute paths
fn resolve_path(raw: &str, workspace_root: Option<&Path>) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    match workspace_root {
        Some(root) => root.join(path),
        None => path,
    }
}
