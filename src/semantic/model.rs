//! Declaration binder
//!
//! Builds a symbol index over every parsed tree in the compilation. Type
//! resolution is by simple name: open documents first, then the well-known
//! runtime surface when stub references are present. Rules that cannot get
//! a symbol from here fall back to syntax-only reasoning.

use crate::syntax::{MethodDecl, PropertyDecl, SyntaxTree, TypeDecl};
use std::collections::HashMap;
use std::sync::Arc;
use tower_lsp::lsp_types::Url;

/// One parsed document as seen by a compilation snapshot
#[derive(Debug)]
pub struct DocumentSnapshot {
    pub uri: Url,
    pub text: Arc<str>,
    pub tree: Arc<SyntaxTree>,
    pub version: i32,
}

/// Marker base type of every UdonSharp script
pub const UDON_SHARP_BEHAVIOUR: &str = "UdonSharpBehaviour";

/// Methods UdonSharpBehaviour itself declares, for method-hiding checks and
/// target resolution against the marker base. `(name, parameter types)`.
pub const UDON_SHARP_BEHAVIOUR_METHODS: &[(&str, &[&str])] = &[
    ("SendCustomEvent", &["string"]),
    ("SendCustomEventDelayedSeconds", &["string", "float"]),
    ("SendCustomEventDelayedFrames", &["string", "int"]),
    ("SendCustomNetworkEvent", &["NetworkEventTarget", "string"]),
    ("RequestSerialization", &[]),
    ("OnDeserialization", &[]),
    ("OnPreSerialization", &[]),
    ("OnPostSerialization", &["SerializationResult"]),
    ("Interact", &[]),
    ("OnPickup", &[]),
    ("OnDrop", &[]),
    ("OnPickupUseDown", &[]),
    ("OnPickupUseUp", &[]),
    ("OnStationEntered", &["VRCPlayerApi"]),
    ("OnStationExited", &["VRCPlayerApi"]),
    ("OnOwnershipTransferred", &["VRCPlayerApi"]),
    ("OnPlayerJoined", &["VRCPlayerApi"]),
    ("OnPlayerLeft", &["VRCPlayerApi"]),
    ("OnSpawn", &[]),
    ("DisableInteractive", &[]),
];

/// Well-known runtime/engine type names contributed by stub references
pub const WELL_KNOWN_TYPES: &[&str] = &[
    UDON_SHARP_BEHAVIOUR,
    "GameObject",
    "Component",
    "Behaviour",
    "MonoBehaviour",
    "Transform",
    "Rigidbody",
    "Collider",
    "Animator",
    "AudioSource",
    "Vector2",
    "Vector3",
    "Vector4",
    "Quaternion",
    "Color",
    "Color32",
    "VRCPlayerApi",
    "NetworkEventTarget",
];

/// Behaviour replication mode, from the `UdonBehaviourSyncMode` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    NoSync,
    Continuous,
    Manual,
    NoVariableSync,
}

impl SyncMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "None" => Some(SyncMode::NoSync),
            "Continuous" => Some(SyncMode::Continuous),
            "Manual" => Some(SyncMode::Manual),
            "NoVariableSync" => Some(SyncMode::NoVariableSync),
            _ => None,
        }
    }
}

/// A resolved type symbol: its declaration plus where it came from
#[derive(Debug, Clone, Copy)]
pub struct TypeHandle<'a> {
    pub uri: &'a Url,
    pub decl: &'a TypeDecl,
    pub in_namespace: bool,
}

/// Symbol index over one compilation snapshot
#[derive(Debug)]
pub struct SemanticModel {
    docs: Vec<Arc<DocumentSnapshot>>,
    /// simple type name -> (document index, position in that tree's type list)
    index: HashMap<String, Vec<(usize, usize)>>,
    /// Whether stub references back the well-known API surface
    pub has_api_surface: bool,
}

impl SemanticModel {
    pub fn build(docs: Vec<Arc<DocumentSnapshot>>, has_api_surface: bool) -> Self {
        let mut index: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
        for (doc_idx, doc) in docs.iter().enumerate() {
            for (type_idx, (decl, _)) in doc.tree.types().iter().enumerate() {
                index
                    .entry(decl.name.clone())
                    .or_default()
                    .push((doc_idx, type_idx));
            }
        }
        Self {
            docs,
            index,
            has_api_surface,
        }
    }

    /// Resolve a type declared in the compilation by simple name
    pub fn resolve_type(&self, name: &str) -> Option<TypeHandle<'_>> {
        let &(doc_idx, type_idx) = self.index.get(name)?.first()?;
        let doc = &self.docs[doc_idx];
        // types() ordering is deterministic, so re-walking is stable
        let &(decl, in_namespace) = doc.tree.types().get(type_idx)?;
        Some(TypeHandle {
            uri: &doc.uri,
            decl,
            in_namespace,
        })
    }

    /// Whether a name denotes a type known to the compilation: declared in
    /// an open document, or part of the stub-backed API surface.
    pub fn knows_type(&self, name: &str) -> bool {
        self.index.contains_key(name)
            || (self.has_api_surface && WELL_KNOWN_TYPES.contains(&name))
    }

    /// Walk the base-class chain from a declaration, innermost first.
    /// Stops on unresolved bases and guards against cycles.
    pub fn base_chain<'a>(&'a self, decl: &'a TypeDecl) -> Vec<TypeHandle<'a>> {
        let mut chain = Vec::new();
        let mut seen = vec![decl.name.clone()];
        let mut current = decl;
        while let Some(base) = current.base_list.first() {
            if seen.contains(&base.name) {
                break;
            }
            match self.resolve_type(&base.name) {
                Some(handle) => {
                    seen.push(base.name.clone());
                    chain.push(handle);
                    current = handle.decl;
                }
                None => break,
            }
        }
        chain
    }

    /// Whether the inheritance chain reaches `UdonSharpBehaviour`
    pub fn inherits_behaviour(&self, decl: &TypeDecl) -> bool {
        if decl
            .base_list
            .first()
            .is_some_and(|b| b.name == UDON_SHARP_BEHAVIOUR)
        {
            return true;
        }
        self.base_chain(decl).iter().any(|handle| {
            handle
                .decl
                .base_list
                .first()
                .is_some_and(|b| b.name == UDON_SHARP_BEHAVIOUR)
        })
    }

    /// All methods with the given name on a type or its resolvable bases.
    /// Does not include the `UdonSharpBehaviour` built-ins.
    pub fn find_methods<'a>(&'a self, decl: &'a TypeDecl, name: &str) -> Vec<&'a MethodDecl> {
        let mut found: Vec<&MethodDecl> = decl.methods().filter(|m| m.name == name).collect();
        for base in self.base_chain(decl) {
            found.extend(base.decl.methods().filter(|m| m.name == name));
        }
        found
    }

    /// A property with the given name on a type or its resolvable bases
    pub fn find_property<'a>(&'a self, decl: &'a TypeDecl, name: &str) -> Option<&'a PropertyDecl> {
        if let Some(prop) = decl.properties().find(|p| p.name == name) {
            return Some(prop);
        }
        self.base_chain(decl)
            .into_iter()
            .find_map(|base| base.decl.properties().find(|p| p.name == name))
    }

    /// Whether any base (resolvable or built-in) declares a method with
    /// this name, for the method-hiding check.
    pub fn base_declares_method(&self, decl: &TypeDecl, name: &str) -> bool {
        for base in self.base_chain(decl) {
            if base.decl.methods().any(|m| m.name == name) {
                return true;
            }
        }
        if self.inherits_behaviour(decl) {
            return UDON_SHARP_BEHAVIOUR_METHODS.iter().any(|(n, _)| *n == name);
        }
        false
    }

    pub fn documents(&self) -> &[Arc<DocumentSnapshot>] {
        &self.docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn doc(uri: &str, source: &str) -> Arc<DocumentSnapshot> {
        let url = Url::parse(uri).unwrap();
        let stem = url
            .path_segments()
            .and_then(|s| s.last())
            .and_then(|n| n.split('.').next())
            .unwrap_or("Test")
            .to_string();
        Arc::new(DocumentSnapshot {
            uri: url,
            text: Arc::from(source),
            tree: Arc::new(parse(source, &stem)),
            version: 1,
        })
    }

    #[test]
    fn test_resolve_across_documents() {
        let model = SemanticModel::build(
            vec![
                doc("file:///A.cs", "class A : UdonSharpBehaviour { }"),
                doc("file:///B.cs", "class B : A { public void Go() { } }"),
            ],
            false,
        );
        assert!(model.resolve_type("A").is_some());
        assert!(model.resolve_type("B").is_some());
        assert!(model.resolve_type("C").is_none());
    }

    #[test]
    fn test_inheritance_chain() {
        let model = SemanticModel::build(
            vec![
                doc("file:///A.cs", "class A : UdonSharpBehaviour { public void Hello() { } }"),
                doc("file:///B.cs", "class B : A { }"),
                doc("file:///C.cs", "class C { }"),
            ],
            false,
        );
        let b = model.resolve_type("B").unwrap();
        assert!(model.inherits_behaviour(b.decl));
        let c = model.resolve_type("C").unwrap();
        assert!(!model.inherits_behaviour(c.decl));

        // method lookup walks bases
        assert_eq!(model.find_methods(b.decl, "Hello").len(), 1);
        assert!(model.base_declares_method(b.decl, "Hello"));
        assert!(model.base_declares_method(b.decl, "Interact"));
        assert!(!model.base_declares_method(c.decl, "Interact"));
    }

    #[test]
    fn test_cyclic_bases_terminate() {
        let model = SemanticModel::build(
            vec![doc("file:///X.cs", "class X : Y { } class Y : X { }")],
            false,
        );
        let x = model.resolve_type("X").unwrap();
        assert!(!model.inherits_behaviour(x.decl));
        assert!(model.find_methods(x.decl, "Nope").is_empty());
    }

    #[test]
    fn test_well_known_surface_gated_by_references() {
        let docs = vec![doc("file:///A.cs", "class A { }")];
        let with = SemanticModel::build(docs.clone(), true);
        assert!(with.knows_type("GameObject"));
        assert!(with.knows_type("A"));

        let without = SemanticModel::build(docs, false);
        assert!(!without.knows_type("GameObject"));
        assert!(without.knows_type("A"));
    }

    #[test]
    fn test_sync_mode_names() {
        assert_eq!(SyncMode::from_name("None"), Some(SyncMode::NoSync));
        assert_eq!(SyncMode::from_name("Manual"), Some(SyncMode::Manual));
        assert_eq!(
            SyncMode::from_name("NoVariableSync"),
            Some(SyncMode::NoVariableSync)
        );
        assert_eq!(SyncMode::from_name("Both"), None);
    }
}
