//! End-to-end engine scenarios: full file text in, expected rule IDs out.
//!
//! These run the real pipeline (parse, bind, analyse) against the bundled
//! policy pack, the same way the server does.

use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::Url;
use ushlint::analysis::{analyze, CancelToken};
use ushlint::diagnostic::Severity;
use ushlint::policy::{load_catalog, PolicyRepository};
use ushlint::settings::Settings;
use ushlint::workspace::WorkspaceManager;
use ushlint::Diagnostic;

fn bundled_pack_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("PolicyPacks")
}

fn repository() -> PolicyRepository {
    PolicyRepository::new(load_catalog(Some(&bundled_pack_dir()), &[]))
}

fn uri(file: &str) -> Url {
    Url::parse(&format!("file:///scripts/{}", file)).unwrap()
}

/// Analyse one file (optionally with sibling documents open) under settings
fn analyse_files(files: &[(&str, &str)], analysed: &str, settings: &Settings) -> Vec<Diagnostic> {
    let workspace = WorkspaceManager::new();
    for (name, text) in files {
        workspace.open_or_update(uri(name), text, 1);
    }
    analyze(
        &workspace.snapshot(),
        &uri(analysed),
        settings,
        &repository(),
        &CancelToken::new(),
    )
}

fn analyse(file: &str, text: &str) -> Vec<Diagnostic> {
    analyse_files(&[(file, text)], file, &Settings::default())
}

fn ids(diags: &[Diagnostic]) -> Vec<String> {
    let mut out: Vec<String> = diags.iter().map(|d| d.rule_id.clone()).collect();
    out.dedup();
    out
}

fn lines_of(diags: &[Diagnostic], rule: &str) -> Vec<u32> {
    diags
        .iter()
        .filter(|d| d.rule_id == rule)
        .map(|d| d.span_or_zero().start.line)
        .collect()
}

#[test]
fn scenario_unknown_event_target() {
    let source = "namespace Demo {\n\
                  class A : UdonSharpBehaviour {\n\
                  public void Foo() { }\n\
                  void Bar() { SendCustomEvent(\"DoesNotExist\"); }\n\
                  }\n\
                  }\n";
    let diags = analyse("A.cs", source);
    assert_eq!(ids(&diags), vec!["USH0001", "USH0043"], "got {:?}", diags);
    // both point at the string literal
    assert_eq!(lines_of(&diags, "USH0001"), vec![3]);
    assert_eq!(lines_of(&diags, "USH0043"), vec![3]);
}

#[test]
fn scenario_private_event_target() {
    let source = "namespace Demo {\n\
                  class A : UdonSharpBehaviour {\n\
                  public void Foo() { }\n\
                  private void Secret() { }\n\
                  void Bar() { SendCustomEvent(nameof(Secret)); }\n\
                  }\n\
                  }\n";
    let diags = analyse("A.cs", source);
    assert_eq!(ids(&diags), vec!["USH0002"], "got {:?}", diags);
}

#[test]
fn scenario_network_payload_type_mismatch() {
    let source = "namespace Demo {\n\
                  class A : UdonSharpBehaviour {\n\
                  public A target;\n\
                  [NetworkCallable] public void Shoot(int n) { }\n\
                  void Fire() { SendCustomNetworkEvent(target, NetworkEventTarget.All, nameof(Shoot), \"hello\"); }\n\
                  }\n\
                  }\n";
    let diags = analyse("A.cs", source);
    assert_eq!(ids(&diags), vec!["USH0005"], "got {:?}", diags);
    let mismatch = &diags[0];
    assert!(
        mismatch.message.starts_with("Argument 1 "),
        "payload index is 1-based: {}",
        mismatch.message
    );
    assert!(mismatch.message.contains("'Shoot'"));
}

#[test]
fn scenario_network_event_to_unsynced_behaviour() {
    let target = "namespace Demo {\n\
                  [UdonBehaviourSyncMode(BehaviourSyncMode.None)]\n\
                  class Target : UdonSharpBehaviour {\n\
                  public void Ping() { }\n\
                  }\n\
                  }\n";
    let sender = "namespace Demo {\n\
                  class Sender : UdonSharpBehaviour {\n\
                  public Target target;\n\
                  void Go() { target.SendCustomNetworkEvent(NetworkEventTarget.All, nameof(Target.Ping)); }\n\
                  }\n\
                  }\n";
    let diags = analyse_files(
        &[("Target.cs", target), ("Sender.cs", sender)],
        "Sender.cs",
        &Settings::default(),
    );
    assert_eq!(ids(&diags), vec!["USH0006"], "got {:?}", diags);
}

#[test]
fn scenario_unsupported_synced_type() {
    let source = "namespace Demo {\n\
                  class A : UdonSharpBehaviour {\n\
                  [UdonSynced] Dictionary<string, int> map;\n\
                  }\n\
                  }\n";
    let diags = analyse("A.cs", source);
    assert_eq!(ids(&diags), vec!["USH0008"], "got {:?}", diags);
    assert!(diags[0].message.contains("Dictionary<string, int>"));
}

#[test]
fn scenario_instantiate_as_try() {
    let source = "namespace Demo {\n\
                  class A : UdonSharpBehaviour {\n\
                  void Go() {\n\
                  var obj = Instantiate(prefab) as SomeComponent;\n\
                  try { } catch { }\n\
                  }\n\
                  }\n\
                  }\n";
    let diags = analyse("A.cs", source);
    assert_eq!(
        ids(&diags),
        vec!["USH0017", "USH0019", "USH0020"],
        "got {:?}",
        diags
    );
    assert_eq!(lines_of(&diags, "USH0020"), vec![4]);
}

#[test]
fn scenario_structure_rules() {
    let source = "class MyBehaviour : UdonSharpBehaviour { }\n";
    let diags = analyse("Wrong.cs", source);
    assert_eq!(ids(&diags), vec!["USH0044", "USH0045"], "got {:?}", diags);
    let mismatch = diags.iter().find(|d| d.rule_id == "USH0045").unwrap();
    assert!(mismatch.message.contains("'MyBehaviour'"));
    assert!(mismatch.message.contains("'Wrong'"));
}

#[test]
fn property_numeric_aliases_do_not_mismatch() {
    for (param_ty, arg) in [
        ("System.Int32", "5"),
        ("int", "5"),
        ("float", "5"),
        ("System.Single", "2.5f"),
        ("long", "5"),
        ("double", "5"),
    ] {
        let source = format!(
            "namespace Demo {{\n\
             class A : UdonSharpBehaviour {{\n\
             [NetworkCallable] public void Count({} n) {{ }}\n\
             void Go() {{ SendCustomNetworkEvent(NetworkEventTarget.All, nameof(Count), {}); }}\n\
             }}\n\
             }}\n",
            param_ty, arg
        );
        let diags = analyse("A.cs", &source);
        assert!(
            !ids(&diags).contains(&"USH0005".to_string()),
            "USH0005 fired for {} <- {}: {:?}",
            param_ty,
            arg,
            diags
        );
    }
}

#[test]
fn property_actual_mismatch_still_fires() {
    let source = "namespace Demo {\n\
                  class A : UdonSharpBehaviour {\n\
                  [NetworkCallable] public void Count(int n) { }\n\
                  void Go() { SendCustomNetworkEvent(NetworkEventTarget.All, nameof(Count), \"text\"); }\n\
                  }\n\
                  }\n";
    let diags = analyse("A.cs", source);
    assert_eq!(ids(&diags), vec!["USH0005"]);
}

#[test]
fn property_strict_profile_never_lowers_severity() {
    let repo = repository();
    let latest = Settings::default();
    let strict = Settings {
        profile: "strict_experimental".to_string(),
        ..Settings::default()
    };
    for def in repo.all_rules() {
        let id = &def.descriptor.id;
        let base = repo.get_severity(id, &latest).unwrap();
        let raised = repo.get_severity(id, &strict).unwrap();
        assert!(
            raised >= base,
            "{} went from {} to {} under strict_experimental",
            id,
            base,
            raised
        );
    }
}

#[test]
fn property_off_override_eliminates_rule() {
    let mut settings = Settings::default();
    settings
        .rule_overrides
        .insert("USH0043".to_string(), Severity::Hidden);

    let sources = [
        "namespace Demo {\n\
         class A : UdonSharpBehaviour {\n\
         public void Foo() { }\n\
         void Go() { SendCustomEvent(\"Foo\"); }\n\
         }\n\
         }\n",
        "namespace Demo {\n\
         class A : UdonSharpBehaviour {\n\
         public void Foo() { }\n\
         void Go() { SendCustomEventDelayedSeconds(\"Foo\", 1.0f); }\n\
         }\n\
         }\n",
    ];
    for source in sources {
        let diags = analyse_files(&[("A.cs", source)], "A.cs", &settings);
        assert!(
            !ids(&diags).contains(&"USH0043".to_string()),
            "USH0043 survived the off override: {:?}",
            diags
        );
    }
}

#[test]
fn fallback_without_type_never_reports_missing_target() {
    // the receiver's type cannot be identified anywhere, so USH0001 must
    // not fire even though the method clearly does not exist
    let source = "namespace Demo {\n\
                  class A : UdonSharpBehaviour {\n\
                  void Go(Mystery other) { other.SendCustomEvent(\"Nothing\"); }\n\
                  }\n\
                  }\n";
    let diags = analyse("A.cs", source);
    assert!(
        !ids(&diags).contains(&"USH0001".to_string()),
        "USH0001 fired without an identified target type: {:?}",
        diags
    );
    // the nameof advisory still applies to the literal
    assert!(ids(&diags).contains(&"USH0043".to_string()));
}

#[test]
fn syntax_fallback_resolves_same_file_type_via_nameof() {
    // Receiver type is unknowable, but nameof(Receiver.Hit) names a type
    // declared in the same file; the degraded path still checks it.
    let source = "namespace Demo {\n\
                  class Receiver : UdonSharpBehaviour {\n\
                  private void Hit() { }\n\
                  }\n\
                  class Sender : UdonSharpBehaviour {\n\
                  void Go(Mystery other) { other.SendCustomNetworkEvent(NetworkEventTarget.All, nameof(Receiver.Hit)); }\n\
                  }\n\
                  }\n";
    let diags = analyse_files(&[("Sender.cs", source)], "Sender.cs", &Settings::default());
    assert!(
        ids(&diags).contains(&"USH0002".to_string()),
        "expected the private-target finding via the fallback: {:?}",
        diags
    );
}

#[test]
fn closing_semantics_every_diagnostic_id_is_catalogued() {
    let source = "class Chaos : UdonSharpBehaviour {\n\
                  static int counter;\n\
                  int? maybe;\n\
                  public Chaos() { }\n\
                  void Go() {\n\
                  int[,] grid = null;\n\
                  var x = a?.b;\n\
                  goto end;\n\
                  end: return;\n\
                  }\n\
                  }\n";
    let diags = analyse("Mess.cs", source);
    assert!(!diags.is_empty());
    let repo = repository();
    for d in &diags {
        assert!(
            repo.get_rule(&d.rule_id).is_some(),
            "{} missing from catalogue",
            d.rule_id
        );
        assert_eq!(
            Some(d.severity),
            repo.get_severity(&d.rule_id, &Settings::default())
        );
    }
}
