//! Policy packs and the rule catalogue
//!
//! A policy pack is a JSON file with a top-level `rules` array. Packs are
//! loaded from the bundled `PolicyPacks/` directory (recursively) and then
//! from the explicit paths in the settings, in order; a rule ID seen again
//! replaces the previous definition. Malformed files and malformed rule
//! entries are logged and skipped, never fatal.

use crate::descriptors::{builtin_descriptors, RuleCategory, RuleDescriptor};
use crate::diagnostic::Severity;
use crate::settings::Settings;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use walkdir::WalkDir;

/// Error reading a single pack file
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("pack has no top-level 'rules' array")]
    MissingRules,
}

/// Per-locale documentation body; at minimum a `markdown` field
pub type LocaleDoc = BTreeMap<String, String>;

/// A fully merged rule definition
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pub descriptor: RuleDescriptor,
    /// profile name -> severity under that profile
    pub profiles: BTreeMap<String, Severity>,
    /// locale -> documentation fields
    pub documentation: BTreeMap<String, LocaleDoc>,
}

impl From<RuleDescriptor> for RuleDefinition {
    fn from(descriptor: RuleDescriptor) -> Self {
        Self {
            descriptor,
            profiles: BTreeMap::new(),
            documentation: BTreeMap::new(),
        }
    }
}

/// Resolved documentation for one rule/locale pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDocumentation {
    pub id: String,
    pub locale: String,
    pub title: String,
    pub markdown: String,
}

/// The merged catalogue: upper-cased rule ID -> definition.
///
/// `BTreeMap` keeps `all_rules()` in stable ID order for free.
pub type Catalog = BTreeMap<String, RuleDefinition>;

/// Build the catalogue: builtin descriptors seeded first, then the bundled
/// pack directory, then the explicit extra paths, last-wins by ID.
pub fn load_catalog(bundled_dir: Option<&Path>, extra_paths: &[PathBuf]) -> Catalog {
    let mut catalog: Catalog = builtin_descriptors()
        .into_iter()
        .map(|d| (d.id.clone(), RuleDefinition::from(d)))
        .collect();

    if let Some(dir) = bundled_dir {
        if dir.is_dir() {
            for entry in WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    merge_pack_file(&mut catalog, path);
                }
            }
        } else {
            tracing::warn!(dir = %dir.display(), "bundled policy pack directory missing");
        }
    }

    for path in extra_paths {
        if path.is_file() {
            merge_pack_file(&mut catalog, path);
        } else {
            tracing::warn!(path = %path.display(), "policy pack path does not exist; skipped");
        }
    }

    catalog
}

fn merge_pack_file(catalog: &mut Catalog, path: &Path) {
    match read_pack(path) {
        Ok(defs) => {
            tracing::debug!(path = %path.display(), rules = defs.len(), "merged policy pack");
            for def in defs {
                catalog.insert(def.descriptor.id.clone(), def);
            }
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "skipping malformed policy pack");
        }
    }
}

/// Read one pack file into rule definitions, skipping malformed entries
fn read_pack(path: &Path) -> Result<Vec<RuleDefinition>, PolicyError> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let rules = value
        .get("rules")
        .and_then(Value::as_array)
        .ok_or(PolicyError::MissingRules)?;

    let mut defs = Vec::new();
    for entry in rules {
        match parse_rule_entry(entry) {
            Some(def) => defs.push(def),
            None => {
                tracing::warn!(
                    path = %path.display(),
                    entry = %entry.get("id").and_then(serde_json::Value::as_str).unwrap_or("<no id>"),
                    "skipping rule entry with missing or invalid required fields"
                );
            }
        }
    }
    Ok(defs)
}

/// Parse one rule object; `None` when a required field is missing or invalid
fn parse_rule_entry(entry: &Value) -> Option<RuleDefinition> {
    let id = entry.get("id")?.as_str()?.to_ascii_uppercase();
    let title = entry.get("title")?.as_str()?.to_string();
    let message = entry.get("message")?.as_str()?.to_string();
    let category: RuleCategory = entry.get("category")?.as_str()?.parse().ok()?;
    let default_severity: Severity = entry.get("defaultSeverity")?.as_str()?.parse().ok()?;

    let mut descriptor = RuleDescriptor::new(&id, &title, &message)
        .with_category(category)
        .with_severity(default_severity);
    descriptor.help_uri = entry
        .get("helpUri")
        .and_then(Value::as_str)
        .map(String::from);
    descriptor.has_code_fix = entry
        .get("hasCodeFix")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut profiles = BTreeMap::new();
    if let Some(map) = entry.get("profiles").and_then(Value::as_object) {
        for (profile, severity) in map {
            if let Some(parsed) = severity.as_str().and_then(|s| s.parse::<Severity>().ok()) {
                profiles.insert(profile.clone(), parsed);
            }
        }
    }

    let mut documentation = BTreeMap::new();
    if let Some(map) = entry.get("documentation").and_then(Value::as_object) {
        for (locale, body) in map {
            let Some(fields) = body.as_object() else { continue };
            let doc: LocaleDoc = fields
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
            if doc.contains_key("markdown") {
                documentation.insert(locale.clone(), doc);
            }
        }
    }

    Some(RuleDefinition {
        descriptor,
        profiles,
        documentation,
    })
}

/// The in-memory rule catalogue, atomically swappable on reload
pub struct PolicyRepository {
    catalog: RwLock<Arc<Catalog>>,
}

impl PolicyRepository {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Replace the whole catalogue in one swap
    pub fn reload(&self, catalog: Catalog) {
        *self.catalog.write().expect("policy catalog lock poisoned") = Arc::new(catalog);
    }

    /// Immutable handle onto the current catalogue
    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().expect("policy catalog lock poisoned"))
    }

    /// All rule definitions in stable ID order
    pub fn all_rules(&self) -> Vec<RuleDefinition> {
        self.snapshot().values().cloned().collect()
    }

    pub fn get_rule(&self, id: &str) -> Option<RuleDefinition> {
        self.snapshot().get(&id.to_ascii_uppercase()).cloned()
    }

    /// Severity resolution order: user override, then the rule's profile
    /// entry for the active profile, then the rule default.
    pub fn get_severity(&self, id: &str, settings: &Settings) -> Option<Severity> {
        let catalog = self.snapshot();
        let def = catalog.get(&id.to_ascii_uppercase())?;
        if let Some(user) = settings.override_for(id) {
            return Some(user);
        }
        if let Some(profiled) = def.profiles.get(&settings.profile) {
            return Some(*profiled);
        }
        Some(def.descriptor.default_severity)
    }

    /// Documentation resolution: exact locale, then `en-US`, then `None`
    pub fn get_documentation(&self, id: &str, locale: &str) -> Option<RuleDocumentation> {
        let catalog = self.snapshot();
        let def = catalog.get(&id.to_ascii_uppercase())?;
        let (resolved_locale, doc) = def
            .documentation
            .get_key_value(locale)
            .or_else(|| def.documentation.get_key_value("en-US"))?;
        Some(RuleDocumentation {
            id: def.descriptor.id.clone(),
            locale: resolved_locale.clone(),
            title: def.descriptor.title.clone(),
            markdown: doc.get("markdown")?.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_pack(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_builtin_seed() {
        let catalog = load_catalog(None, &[]);
        assert_eq!(catalog.len(), 45);
        assert!(catalog.contains_key("USH0001"));
    }

    #[test]
    fn test_pack_overrides_builtin_by_id() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(
            dir.path(),
            "a.json",
            r#"{ "rules": [ { "id": "ush0001", "title": "Replaced", "message": "m",
                 "category": "network", "defaultSeverity": "warning" } ] }"#,
        );
        let catalog = load_catalog(Some(dir.path()), &[]);
        let def = &catalog["USH0001"];
        assert_eq!(def.descriptor.title, "Replaced");
        assert_eq!(def.descriptor.default_severity, Severity::Warning);
    }

    #[test]
    fn test_last_pack_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(
            dir.path(),
            "a.json",
            r#"{ "rules": [ { "id": "USH9000", "title": "First", "message": "m",
                 "category": "language", "defaultSeverity": "error" } ] }"#,
        );
        let extra = write_pack(
            dir.path(),
            "later.json",
            r#"{ "rules": [ { "id": "USH9000", "title": "Second", "message": "m",
                 "category": "language", "defaultSeverity": "info" } ] }"#,
        );
        // extra paths load after the bundled directory
        let catalog = load_catalog(Some(dir.path()), &[extra]);
        assert_eq!(catalog["USH9000"].descriptor.title, "Second");
    }

    #[test]
    fn test_malformed_entries_and_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "broken.json", "{ not json");
        write_pack(dir.path(), "norules.json", r#"{ "version": 1 }"#);
        write_pack(
            dir.path(),
            "partial.json",
            r#"{ "rules": [
                 { "id": "USH9001", "title": "no message here",
                   "category": "language", "defaultSeverity": "error" },
                 { "id": "USH9002", "title": "ok", "message": "m",
                   "category": "language", "defaultSeverity": "error" } ] }"#,
        );
        let catalog = load_catalog(Some(dir.path()), &[]);
        assert!(!catalog.contains_key("USH9001"));
        assert!(catalog.contains_key("USH9002"));
    }

    #[test]
    fn test_severity_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(
            dir.path(),
            "profiles.json",
            r#"{ "rules": [ { "id": "USH0043", "title": "t", "message": "m",
                 "category": "network", "defaultSeverity": "info",
                 "profiles": { "strict_experimental": "error" } } ] }"#,
        );
        let repo = PolicyRepository::new(load_catalog(Some(dir.path()), &[]));

        let mut settings = Settings::default();
        assert_eq!(
            repo.get_severity("USH0043", &settings),
            Some(Severity::Information)
        );

        settings.profile = "strict_experimental".to_string();
        assert_eq!(repo.get_severity("USH0043", &settings), Some(Severity::Error));

        settings
            .rule_overrides
            .insert("USH0043".to_string(), Severity::Hidden);
        assert_eq!(
            repo.get_severity("USH0043", &settings),
            Some(Severity::Hidden)
        );

        assert_eq!(repo.get_severity("USH9999", &settings), None);
    }

    #[test]
    fn test_documentation_locale_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(
            dir.path(),
            "docs.json",
            r#"{ "rules": [ { "id": "USH0001", "title": "t", "message": "m",
                 "category": "network", "defaultSeverity": "error",
                 "documentation": {
                   "en-US": { "markdown": "english body" },
                   "ja-JP": { "markdown": "japanese body" } } } ] }"#,
        );
        let repo = PolicyRepository::new(load_catalog(Some(dir.path()), &[]));

        let ja = repo.get_documentation("USH0001", "ja-JP").unwrap();
        assert_eq!(ja.markdown, "japanese body");
        assert_eq!(ja.locale, "ja-JP");

        let fallback = repo.get_documentation("USH0001", "de-DE").unwrap();
        assert_eq!(fallback.markdown, "english body");
        assert_eq!(fallback.locale, "en-US");

        // builtin rules carry no documentation until a pack provides it
        assert!(repo.get_documentation("USH0002", "en-US").is_none());
    }

    #[test]
    fn test_reload_swaps_atomically() {
        let repo = PolicyRepository::new(load_catalog(None, &[]));
        assert_eq!(repo.all_rules().len(), 45);
        let mut small = Catalog::new();
        small.insert(
            "USH0001".into(),
            RuleDefinition::from(RuleDescriptor::new("USH0001", "t", "m")),
        );
        repo.reload(small);
        assert_eq!(repo.all_rules().len(), 1);
    }
}
