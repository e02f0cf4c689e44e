//! Rule dispatch
//!
//! `analyze` runs every registered rule family against one document of a
//! compilation snapshot. Severities and message templates come from the
//! policy repository resolved against the current settings; rules report
//! through the context and never see the wire.

use crate::diagnostic::{format_message, Diagnostic, Severity, Span};
use crate::policy::PolicyRepository;
use crate::semantic::{DocumentSnapshot, SemanticModel};
use crate::settings::Settings;
use crate::syntax::TypeDecl;
use crate::workspace::Snapshot;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_lsp::lsp_types::Url;

/// Cooperative cancellation handle; one per analysis run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Analysis context handed to each rule family
pub struct RuleContext<'a> {
    pub snapshot: &'a Snapshot,
    pub doc: &'a DocumentSnapshot,
    pub settings: &'a Settings,
    severities: &'a HashMap<String, Severity>,
    templates: &'a HashMap<String, String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> RuleContext<'a> {
    pub fn model(&self) -> &'a SemanticModel {
        &self.snapshot.model
    }

    /// Type declarations of the analysed document, with namespace flags
    pub fn types(&self) -> Vec<(&'a TypeDecl, bool)> {
        self.doc.tree.types()
    }

    /// Report a diagnostic for a rule ID at a span in the analysed document.
    /// Unknown IDs (absent from the catalogue) are dropped.
    pub fn report(&mut self, rule_id: &str, span: Span, args: &[&str]) {
        let id = rule_id.to_ascii_uppercase();
        let Some(&severity) = self.severities.get(&id) else {
            return;
        };
        let message = match self.templates.get(&id) {
            Some(template) => format_message(template, args),
            None => return,
        };
        self.diagnostics.push(
            Diagnostic::new(&id, severity, message).with_location(self.doc.uri.clone(), span),
        );
    }
}

/// One rule family: the IDs it may emit and its entry point
pub struct RegisteredRule {
    pub name: &'static str,
    pub ids: &'static [&'static str],
    pub run: fn(&mut RuleContext),
}

/// Run the full rule set for one document.
///
/// Returns the deduplicated, deterministically ordered diagnostic list;
/// empty on cancellation. Diagnostics whose resolved severity is `Hidden`
/// are suppressed here, after collection.
pub fn analyze(
    snapshot: &Snapshot,
    uri: &Url,
    settings: &Settings,
    policy: &PolicyRepository,
    cancel: &CancelToken,
) -> Vec<Diagnostic> {
    let Some(doc) = snapshot.document(uri) else {
        // a document not in the set never produces diagnostics
        return Vec::new();
    };

    // per-analysis severity and message maps, resolved once
    let catalog = policy.snapshot();
    let mut severities = HashMap::new();
    let mut templates = HashMap::new();
    for (id, def) in catalog.iter() {
        if let Some(severity) = policy.get_severity(id, settings) {
            severities.insert(id.clone(), severity);
        }
        templates.insert(id.clone(), def.descriptor.message.clone());
    }

    let mut ctx = RuleContext {
        snapshot,
        doc,
        settings,
        severities: &severities,
        templates: &templates,
        diagnostics: Vec::new(),
    };

    for rule in super::rules::registered_rules() {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        let before = ctx.diagnostics.len();
        let outcome = catch_unwind(AssertUnwindSafe(|| (rule.run)(&mut ctx)));
        if let Err(panic) = outcome {
            // one faulty rule must not silence the others
            ctx.diagnostics.truncate(before);
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(rule = rule.name, uri = %uri, error = %detail, "rule failed");
        }
    }
    if cancel.is_cancelled() {
        return Vec::new();
    }

    let mut diagnostics = ctx.diagnostics;
    diagnostics.retain(|d| {
        d.severity != Severity::Hidden && d.uri.as_ref().map_or(true, |u| u == uri)
    });
    diagnostics.sort_by(|a, b| {
        a.span_or_zero()
            .cmp(&b.span_or_zero())
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.message.cmp(&b.message))
    });
    diagnostics.dedup_by(|a, b| a.rule_id == b.rule_id && a.span == b.span && a.message == b.message);
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::load_catalog;
    use crate::workspace::WorkspaceManager;

    fn run(source: &str, file: &str) -> Vec<Diagnostic> {
        run_with(source, file, Settings::default())
    }

    fn run_with(source: &str, file: &str, settings: Settings) -> Vec<Diagnostic> {
        let workspace = WorkspaceManager::new();
        let uri = Url::parse(&format!("file:///{}", file)).unwrap();
        workspace.open_or_update(uri.clone(), source, 1);
        let policy = PolicyRepository::new(load_catalog(None, &[]));
        analyze(
            &workspace.snapshot(),
            &uri,
            &settings,
            &policy,
            &CancelToken::new(),
        )
    }

    fn ids(diags: &[Diagnostic]) -> Vec<&str> {
        diags.iter().map(|d| d.rule_id.as_str()).collect()
    }

    #[test]
    fn test_unknown_document_yields_nothing() {
        let workspace = WorkspaceManager::new();
        workspace.open_or_update(Url::parse("file:///A.cs").unwrap(), "class A { }", 1);
        let policy = PolicyRepository::new(load_catalog(None, &[]));
        let diags = analyze(
            &workspace.snapshot(),
            &Url::parse("file:///Missing.cs").unwrap(),
            &Settings::default(),
            &policy,
            &CancelToken::new(),
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_cancellation_returns_empty() {
        let workspace = WorkspaceManager::new();
        let uri = Url::parse("file:///A.cs").unwrap();
        workspace.open_or_update(uri.clone(), "class A : UdonSharpBehaviour { }", 1);
        let policy = PolicyRepository::new(load_catalog(None, &[]));
        let cancel = CancelToken::new();
        cancel.cancel();
        let diags = analyze(
            &workspace.snapshot(),
            &uri,
            &Settings::default(),
            &policy,
            &cancel,
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_non_script_type_is_quiet() {
        // the class is not an UdonSharp script, so feature rules stay silent
        let diags = run(
            "namespace N { class Plain { void Go() { try { } catch { } } } }",
            "Plain.cs",
        );
        assert!(diags.is_empty(), "got: {:?}", ids(&diags));
    }

    #[test]
    fn test_hidden_override_suppresses() {
        let source = r#"namespace N {
            class Script : UdonSharpBehaviour {
                public void Foo() { }
                void Go() { SendCustomEvent("Foo"); }
            }
        }"#;
        let baseline = run(source, "Script.cs");
        assert!(ids(&baseline).contains(&"USH0043"));

        let mut settings = Settings::default();
        settings
            .rule_overrides
            .insert("USH0043".to_string(), Severity::Hidden);
        let silenced = run_with(source, "Script.cs", settings);
        assert!(!ids(&silenced).contains(&"USH0043"));
    }

    #[test]
    fn test_severity_matches_repository_resolution() {
        let source = r#"namespace N {
            class Script : UdonSharpBehaviour {
                void Go() { var x = 1 as object; }
            }
        }"#;
        let diags = run(source, "Script.cs");
        let policy = PolicyRepository::new(load_catalog(None, &[]));
        let settings = Settings::default();
        for d in &diags {
            assert_eq!(
                Some(d.severity),
                policy.get_severity(&d.rule_id, &settings),
                "severity mismatch for {}",
                d.rule_id
            );
        }
    }

    #[test]
    fn test_deterministic_output() {
        let source = r#"namespace N {
            class Script : UdonSharpBehaviour {
                void Go() {
                    try { } catch { }
                    var a = x as Script;
                    goto done;
                    done: return;
                }
            }
        }"#;
        let first = run(source, "Script.cs");
        let second = run(source, "Script.cs");
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
