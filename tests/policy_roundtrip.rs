//! Policy pack loading against the bundled pack on disk

use std::path::{Path, PathBuf};
use ushlint::diagnostic::Severity;
use ushlint::policy::{load_catalog, PolicyRepository};
use ushlint::settings::Settings;

fn bundled_pack_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("PolicyPacks")
}

#[test]
fn bundled_pack_covers_every_rule() {
    let catalog = load_catalog(Some(&bundled_pack_dir()), &[]);
    assert_eq!(catalog.len(), 45);
    for i in 1..=45 {
        let id = format!("USH{:04}", i);
        assert!(catalog.contains_key(&id), "{} missing", id);
    }
}

#[test]
fn bundled_pack_documentation_resolves() {
    let repo = PolicyRepository::new(load_catalog(Some(&bundled_pack_dir()), &[]));

    let en = repo.get_documentation("USH0001", "en-US").unwrap();
    assert_eq!(en.locale, "en-US");
    assert!(en.markdown.contains("SendCustomEvent"));

    let ja = repo.get_documentation("ush0001", "ja-JP").unwrap();
    assert_eq!(ja.locale, "ja-JP");

    // locales without a body fall back to en-US
    let fallback = repo.get_documentation("USH0001", "fr-FR").unwrap();
    assert_eq!(fallback.locale, "en-US");
}

#[test]
fn bundled_profiles_resolve_in_order() {
    let repo = PolicyRepository::new(load_catalog(Some(&bundled_pack_dir()), &[]));

    let latest = Settings::default();
    assert_eq!(
        repo.get_severity("USH0043", &latest),
        Some(Severity::Information)
    );

    let strict = Settings {
        profile: "strict_experimental".into(),
        ..Settings::default()
    };
    assert_eq!(
        repo.get_severity("USH0043", &strict),
        Some(Severity::Warning)
    );
    assert_eq!(repo.get_severity("USH0044", &strict), Some(Severity::Error));

    let legacy = Settings {
        profile: "legacy_0.x".into(),
        ..Settings::default()
    };
    assert_eq!(repo.get_severity("USH0044", &legacy), Some(Severity::Hidden));

    // unknown profiles fall back to the rule default
    let unknown = Settings {
        profile: "bespoke".into(),
        ..Settings::default()
    };
    assert_eq!(
        repo.get_severity("USH0043", &unknown),
        Some(Severity::Information)
    );
}

#[test]
fn user_pack_overrides_bundled_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let extra = dir.path().join("override.json");
    std::fs::write(
        &extra,
        r#"{ "rules": [ {
            "id": "USH0043",
            "title": "House style: nameof required",
            "message": "Use nameof for '{0}'",
            "category": "network",
            "defaultSeverity": "error"
        } ] }"#,
    )
    .unwrap();

    let repo = PolicyRepository::new(load_catalog(Some(&bundled_pack_dir()), &[extra]));
    let def = repo.get_rule("USH0043").unwrap();
    assert_eq!(def.descriptor.title, "House style: nameof required");
    assert_eq!(def.descriptor.default_severity, Severity::Error);
    // the replacement dropped the bundled profile map with it
    assert!(def.profiles.is_empty());
    assert_eq!(repo.all_rules().len(), 45);
}
