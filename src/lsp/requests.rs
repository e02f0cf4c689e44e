//! Custom `udonsharp/*` request payloads and their builders

use crate::policy::PolicyRepository;
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of `udonsharp/rules/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleListEntry {
    pub id: String,
    pub title: String,
    pub category: String,
    pub default_severity: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_link: Option<String>,
    pub has_code_fix: bool,
    pub profile_severity: BTreeMap<String, String>,
}

/// Parameters of `udonsharp/rules/documentation`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationParams {
    pub rule_id: String,
    #[serde(default)]
    pub locale: Option<String>,
}

/// Response of `udonsharp/rules/documentation`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationResponse {
    pub id: String,
    pub locale: String,
    pub title: String,
    pub markdown: String,
}

/// Response of `udonsharp/server/status` (and the legacy alias)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub profile: String,
    pub disabled_rule_count: usize,
    pub total_rule_count: usize,
    pub server_version: String,
}

pub const DOCUMENTATION_STUB: &str = "Documentation not available.";

/// Build the rule list, sorted by ID
pub fn rules_list(policy: &PolicyRepository) -> Vec<RuleListEntry> {
    policy
        .all_rules()
        .into_iter()
        .map(|def| {
            let description = def
                .documentation
                .get("en-US")
                .and_then(|doc| doc.get("markdown"))
                .cloned()
                .unwrap_or_else(|| def.descriptor.title.clone());
            RuleListEntry {
                id: def.descriptor.id.clone(),
                title: def.descriptor.title.clone(),
                category: def.descriptor.category.to_string(),
                default_severity: def.descriptor.default_severity.to_string(),
                description,
                help_link: def.descriptor.help_uri.clone(),
                has_code_fix: def.descriptor.has_code_fix,
                profile_severity: def
                    .profiles
                    .iter()
                    .map(|(profile, severity)| (profile.clone(), severity.to_string()))
                    .collect(),
            }
        })
        .collect()
}

/// Resolve documentation for one rule; unknown rules and undocumented
/// locales yield the stub body.
pub fn rule_documentation(
    policy: &PolicyRepository,
    params: &DocumentationParams,
) -> DocumentationResponse {
    let locale = params.locale.clone().unwrap_or_else(|| "en-US".to_string());
    let id = params.rule_id.to_ascii_uppercase();
    match policy.get_documentation(&id, &locale) {
        Some(doc) => DocumentationResponse {
            id: doc.id,
            locale: doc.locale,
            title: doc.title,
            markdown: doc.markdown,
        },
        None => DocumentationResponse {
            title: policy
                .get_rule(&id)
                .map(|def| def.descriptor.title)
                .unwrap_or_else(|| id.clone()),
            id,
            locale,
            markdown: DOCUMENTATION_STUB.to_string(),
        },
    }
}

/// Current server status. Disabled rules are those whose resolved severity
/// under the active settings is `Hidden`.
pub fn server_status(policy: &PolicyRepository, settings: &Settings) -> ServerStatus {
    let rules = policy.all_rules();
    let disabled = rules
        .iter()
        .filter(|def| {
            policy.get_severity(&def.descriptor.id, settings)
                == Some(crate::diagnostic::Severity::Hidden)
        })
        .count();
    ServerStatus {
        profile: settings.profile.clone(),
        disabled_rule_count: disabled,
        total_rule_count: rules.len(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::policy::load_catalog;

    fn repo() -> PolicyRepository {
        PolicyRepository::new(load_catalog(None, &[]))
    }

    #[test]
    fn test_rules_list_sorted_and_complete() {
        let list = rules_list(&repo());
        assert_eq!(list.len(), 45);
        let mut ids: Vec<_> = list.iter().map(|e| e.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, list.iter().map(|e| e.id.clone()).collect::<Vec<_>>());
        let advisory = list.iter().find(|e| e.id == "USH0043").unwrap();
        assert_eq!(advisory.default_severity, "information");
        assert!(advisory.has_code_fix);
    }

    #[test]
    fn test_documentation_stub_for_unknown_rule() {
        let doc = rule_documentation(
            &repo(),
            &DocumentationParams {
                rule_id: "USH9999".into(),
                locale: None,
            },
        );
        assert_eq!(doc.id, "USH9999");
        assert_eq!(doc.markdown, DOCUMENTATION_STUB);
    }

    #[test]
    fn test_documentation_stub_for_undocumented_rule() {
        let doc = rule_documentation(
            &repo(),
            &DocumentationParams {
                rule_id: "ush0001".into(),
                locale: Some("en-US".into()),
            },
        );
        assert_eq!(doc.id, "USH0001");
        assert_eq!(doc.markdown, DOCUMENTATION_STUB);
        assert_eq!(doc.title, "Custom event target does not exist");
    }

    #[test]
    fn test_status_counts_hidden_rules() {
        let repo = repo();
        let mut settings = Settings::default();
        let baseline = server_status(&repo, &settings);
        assert_eq!(baseline.total_rule_count, 45);
        assert_eq!(baseline.disabled_rule_count, 0);
        assert_eq!(baseline.profile, "latest");

        settings
            .rule_overrides
            .insert("USH0043".into(), Severity::Hidden);
        settings
            .rule_overrides
            .insert("USH0044".into(), Severity::Hidden);
        let status = server_status(&repo, &settings);
        assert_eq!(status.disabled_rule_count, 2);
    }
}
