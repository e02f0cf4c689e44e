//! Canonical rule descriptor table
//!
//! Every rule the engine can emit is declared here with its default
//! severity, category, message template and help link. The policy
//! repository seeds its catalogue from this table, so the server works
//! with no policy packs on disk; JSON packs merge over it by ID.

use crate::diagnostic::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule category for grouping related rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Network-event wiring (SendCustomEvent / SendCustomNetworkEvent)
    Network,
    /// UdonSynced field constraints
    Synchronization,
    /// Forbidden namespaces, types and members
    ApiUsage,
    /// Runtime-event signatures and runtime-only restrictions
    Runtime,
    /// Banned language features
    #[default]
    Language,
    /// Attribute cross-referencing (FieldChangeCallback)
    Attributes,
    /// Per-declaration structural rules
    Structure,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Network => write!(f, "network"),
            RuleCategory::Synchronization => write!(f, "synchronization"),
            RuleCategory::ApiUsage => write!(f, "api-usage"),
            RuleCategory::Runtime => write!(f, "runtime"),
            RuleCategory::Language => write!(f, "language"),
            RuleCategory::Attributes => write!(f, "attributes"),
            RuleCategory::Structure => write!(f, "structure"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "network" => Ok(RuleCategory::Network),
            "synchronization" | "sync" => Ok(RuleCategory::Synchronization),
            "api-usage" | "apiusage" | "api" => Ok(RuleCategory::ApiUsage),
            "runtime" => Ok(RuleCategory::Runtime),
            "language" => Ok(RuleCategory::Language),
            "attributes" => Ok(RuleCategory::Attributes),
            "structure" => Ok(RuleCategory::Structure),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// A rule descriptor: the static metadata for one rule ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Stable identifier, always upper-case (e.g. "USH0001")
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Message template with positional `{0}` placeholders
    pub message: String,

    /// Rule category
    pub category: RuleCategory,

    /// Default severity before profile/override resolution
    pub default_severity: Severity,

    /// Documentation URL
    pub help_uri: Option<String>,

    /// Whether a client-side code fix is advertised for this rule
    pub has_code_fix: bool,
}

impl RuleDescriptor {
    pub fn new(id: &str, title: &str, message: &str) -> Self {
        Self {
            id: id.to_ascii_uppercase(),
            title: title.to_string(),
            message: message.to_string(),
            category: RuleCategory::default(),
            default_severity: Severity::Error,
            help_uri: Some(format!(
                "https://ushlint.dev/rules/{}",
                id.to_ascii_lowercase()
            )),
            has_code_fix: false,
        }
    }

    pub fn with_category(mut self, category: RuleCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.default_severity = severity;
        self
    }

    pub fn with_code_fix(mut self) -> Self {
        self.has_code_fix = true;
        self
    }
}

/// All built-in rule descriptors, ordered by ID
pub fn builtin_descriptors() -> Vec<RuleDescriptor> {
    use RuleCategory::*;

    vec![
        RuleDescriptor::new(
            "USH0001",
            "Custom event target does not exist",
            "Custom event target '{0}' does not exist on type '{1}'",
        )
        .with_category(Network),
        RuleDescriptor::new(
            "USH0002",
            "Custom event target is not public",
            "Custom event target '{0}' on type '{1}' is not declared public",
        )
        .with_category(Network),
        RuleDescriptor::new(
            "USH0003",
            "Network event target starts with an underscore",
            "Network event target '{0}' must not begin with an underscore",
        )
        .with_category(Network),
        RuleDescriptor::new(
            "USH0004",
            "Network event payload without NetworkCallable",
            "Network event '{0}' carries arguments but no overload on '{1}' has the NetworkCallable attribute",
        )
        .with_category(Network),
        RuleDescriptor::new(
            "USH0005",
            "Network event argument type mismatch",
            "Argument {0} of network event '{1}' is not implicitly convertible to the target parameter type",
        )
        .with_category(Network),
        RuleDescriptor::new(
            "USH0006",
            "Network event sent to a non-synced behaviour",
            "Network event sent to '{0}', which is declared with BehaviourSyncMode.None",
        )
        .with_category(Network),
        RuleDescriptor::new(
            "USH0007",
            "Synced field on a NoVariableSync behaviour",
            "Field '{0}' is marked UdonSynced but '{1}' is declared with BehaviourSyncMode.NoVariableSync",
        )
        .with_category(Synchronization),
        RuleDescriptor::new(
            "USH0008",
            "Unsupported synced field type",
            "Type '{0}' of synced field '{1}' is not supported for synchronization",
        )
        .with_category(Synchronization),
        RuleDescriptor::new(
            "USH0009",
            "Synced array outside manual sync",
            "Synced array field '{0}' requires BehaviourSyncMode.Manual",
        )
        .with_category(Synchronization),
        RuleDescriptor::new(
            "USH0010",
            "Tweening unavailable in manual sync",
            "Synced field '{0}' uses tweening, which is unavailable in BehaviourSyncMode.Manual",
        )
        .with_category(Synchronization),
        RuleDescriptor::new(
            "USH0011",
            "Linear tweening unsupported for type",
            "Linear tweening does not support type '{0}'",
        )
        .with_category(Synchronization),
        RuleDescriptor::new(
            "USH0012",
            "Smooth tweening unsupported for type",
            "Smooth tweening does not support type '{0}'",
        )
        .with_category(Synchronization),
        RuleDescriptor::new(
            "USH0013",
            "Method not exposed to Udon",
            "Method '{0}' is not exposed to Udon",
        )
        .with_category(ApiUsage),
        RuleDescriptor::new(
            "USH0014",
            "Member not exposed to Udon",
            "Member '{0}' is not exposed to Udon",
        )
        .with_category(ApiUsage),
        RuleDescriptor::new(
            "USH0015",
            "Type not exposed to Udon",
            "Type '{0}' is not exposed to Udon",
        )
        .with_category(ApiUsage),
        RuleDescriptor::new(
            "USH0016",
            "Malformed runtime event signature",
            "Runtime event '{0}' must be declared 'public override' with a single VRCPlayerApi parameter",
        )
        .with_category(Runtime),
        RuleDescriptor::new(
            "USH0017",
            "Instantiate of a non-GameObject",
            "Instantiate may only be used with GameObject instances",
        )
        .with_category(Runtime),
        RuleDescriptor::new(
            "USH0018",
            "'is' operator unsupported",
            "The 'is' operator is not supported by UdonSharp",
        )
        .with_category(Runtime),
        RuleDescriptor::new(
            "USH0019",
            "'as' operator unsupported",
            "The 'as' operator is not supported by UdonSharp",
        )
        .with_category(Runtime),
        RuleDescriptor::new(
            "USH0020",
            "Exception handling unsupported",
            "Exception handling (try/catch/finally) is not supported by UdonSharp",
        )
        .with_category(Runtime),
        RuleDescriptor::new(
            "USH0021",
            "'throw' unsupported",
            "The 'throw' statement is not supported by UdonSharp",
        )
        .with_category(Runtime),
        RuleDescriptor::new(
            "USH0022",
            "Nullable value types unsupported",
            "Nullable value types are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0023",
            "Null-conditional operators unsupported",
            "Null-conditional operators are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0024",
            "Multidimensional arrays unsupported",
            "Multidimensional arrays are not supported by UdonSharp; use jagged arrays",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0025",
            "Multi-index element access unsupported",
            "Element access with more than one index is not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0026",
            "Local functions unsupported",
            "Local functions are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0027",
            "Nested types unsupported",
            "Nested type declarations are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0028",
            "Constructors unsupported",
            "Constructors are not supported on UdonSharpBehaviours",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0029",
            "Generic methods unsupported",
            "Generic method declarations are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0030",
            "Interface implementation unsupported",
            "UdonSharpBehaviours cannot implement interfaces",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0031",
            "Method hiding unsupported",
            "Method '{0}' hides a base method; method hiding is not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0032",
            "Object initializers unsupported",
            "Object and collection initializers are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0033",
            "typeof on an UdonSharp script",
            "typeof cannot be used on UdonSharpBehaviour type '{0}'",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0034",
            "Static members unsupported",
            "Static fields and properties are not supported on UdonSharpBehaviours",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0035",
            "Partial methods unsupported",
            "Partial methods are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0036",
            "'goto' unsupported",
            "The 'goto' statement is not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0037",
            "Labeled statements unsupported",
            "Labeled statements are not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0038",
            "'goto case' unsupported",
            "The 'goto case' statement is not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0039",
            "'goto default' unsupported",
            "The 'goto default' statement is not supported by UdonSharp",
        )
        .with_category(Language),
        RuleDescriptor::new(
            "USH0040",
            "Duplicate FieldChangeCallback target",
            "Fields '{0}' and '{1}' both target property '{2}' with FieldChangeCallback",
        )
        .with_category(Attributes),
        RuleDescriptor::new(
            "USH0041",
            "FieldChangeCallback target missing",
            "FieldChangeCallback target property '{0}' does not exist on type '{1}'",
        )
        .with_category(Attributes),
        RuleDescriptor::new(
            "USH0042",
            "FieldChangeCallback type mismatch",
            "FieldChangeCallback target property '{0}' has type '{1}' but field '{2}' has type '{3}'",
        )
        .with_category(Attributes),
        RuleDescriptor::new(
            "USH0043",
            "Prefer nameof for event targets",
            "Prefer nameof over a string literal for the event target '{0}'",
        )
        .with_category(Network)
        .with_severity(Severity::Information)
        .with_code_fix(),
        RuleDescriptor::new(
            "USH0044",
            "Script outside a namespace",
            "UdonSharp script '{0}' should be declared inside a namespace",
        )
        .with_category(Structure)
        .with_severity(Severity::Warning)
        .with_code_fix(),
        RuleDescriptor::new(
            "USH0045",
            "Class name does not match file name",
            "Class name '{0}' does not match the file name '{1}'",
        )
        .with_category(Structure)
        .with_code_fix(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_count_and_order() {
        let rules = builtin_descriptors();
        assert_eq!(rules.len(), 45);
        let mut sorted = rules.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        sorted.sort();
        assert_eq!(
            sorted,
            rules.iter().map(|r| r.id.clone()).collect::<Vec<_>>()
        );
        assert_eq!(rules[0].id, "USH0001");
        assert_eq!(rules[44].id, "USH0045");
    }

    #[test]
    fn test_ids_are_unique() {
        let rules = builtin_descriptors();
        let mut ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 45);
    }

    #[test]
    fn test_category_roundtrip() {
        for cat in [
            RuleCategory::Network,
            RuleCategory::Synchronization,
            RuleCategory::ApiUsage,
            RuleCategory::Runtime,
            RuleCategory::Language,
            RuleCategory::Attributes,
            RuleCategory::Structure,
        ] {
            assert_eq!(cat.to_string().parse::<RuleCategory>(), Ok(cat));
        }
        assert!("other".parse::<RuleCategory>().is_err());
    }

    #[test]
    fn test_default_severities() {
        let rules = builtin_descriptors();
        let get = |id: &str| rules.iter().find(|r| r.id == id).unwrap();
        assert_eq!(get("USH0001").default_severity, Severity::Error);
        assert_eq!(get("USH0043").default_severity, Severity::Information);
        assert_eq!(get("USH0044").default_severity, Severity::Warning);
        assert!(get("USH0043").has_code_fix);
        assert!(!get("USH0001").has_code_fix);
    }

    #[test]
    fn test_help_links() {
        for rule in builtin_descriptors() {
            let uri = rule.help_uri.expect("every builtin rule has a help link");
            assert!(uri.ends_with(&rule.id.to_ascii_lowercase()));
        }
    }
}
