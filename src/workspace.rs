//! Workspace state: open documents and the compilation context
//!
//! All mutation goes through a single writer lock; analyses capture an
//! immutable [`Snapshot`] and never observe partial updates. Document
//! changes invalidate only the snapshot (trees are reused); reference
//! changes rebuild everything.

use crate::references::{resolve_references, ReferenceSet};
use crate::semantic::{DocumentSnapshot, SemanticModel};
use crate::settings::Settings;
use crate::syntax::parse;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tower_lsp::lsp_types::Url;

/// Parse/compilation options of the logical project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Language level of the target dialect
    pub language_level: &'static str,
    pub allow_unsafe: bool,
    pub deterministic: bool,
    pub overflow_checks: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            language_level: "latest",
            allow_unsafe: false,
            deterministic: false,
            overflow_checks: true,
        }
    }
}

/// Immutable view of the compilation, captured at analysis start
pub struct Snapshot {
    pub documents: Vec<Arc<DocumentSnapshot>>,
    pub references: ReferenceSet,
    pub options: CompileOptions,
    pub model: SemanticModel,
}

impl Snapshot {
    pub fn document(&self, uri: &Url) -> Option<&Arc<DocumentSnapshot>> {
        self.documents.iter().find(|d| &d.uri == uri)
    }
}

struct State {
    documents: BTreeMap<Url, Arc<DocumentSnapshot>>,
    references: ReferenceSet,
    options: CompileOptions,
    snapshot: Option<Arc<Snapshot>>,
}

/// Owns the logical project and the URI -> document mapping
pub struct WorkspaceManager {
    state: RwLock<State>,
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                documents: BTreeMap::new(),
                references: ReferenceSet::default(),
                options: CompileOptions::default(),
                snapshot: None,
            }),
        }
    }

    /// Rebuild the project with fresh references. Open document texts are
    /// preserved across the rebuild.
    pub fn initialise(&self, settings: &Settings, base_dir: &Path) {
        let references = resolve_references(settings, base_dir);
        let mut state = self.write();
        if state.references != references {
            tracing::info!(
                assemblies = references.assemblies.len(),
                api_surface = references.has_api_surface,
                "rebuilding compilation references"
            );
        }
        state.references = references;
        state.snapshot = None;
    }

    /// Insert or replace a document, returning its handle
    pub fn open_or_update(&self, uri: Url, text: &str, version: i32) -> Arc<DocumentSnapshot> {
        let stem = file_stem(&uri);
        let tree = parse(text, &stem);
        for error in &tree.errors {
            tracing::debug!(uri = %uri, error, "parse note");
        }
        let doc = Arc::new(DocumentSnapshot {
            uri: uri.clone(),
            text: Arc::from(text),
            tree: Arc::new(tree),
            version,
        });
        let mut state = self.write();
        state.documents.insert(uri, Arc::clone(&doc));
        state.snapshot = None;
        doc
    }

    pub fn remove(&self, uri: &Url) {
        let mut state = self.write();
        if state.documents.remove(uri).is_some() {
            state.snapshot = None;
        }
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<DocumentSnapshot>> {
        self.read().documents.get(uri).cloned()
    }

    pub fn open_uris(&self) -> Vec<Url> {
        self.read().documents.keys().cloned().collect()
    }

    /// Current compilation snapshot, rebuilt lazily after any mutation
    pub fn snapshot(&self) -> Arc<Snapshot> {
        if let Some(snapshot) = &self.read().snapshot {
            return Arc::clone(snapshot);
        }
        let mut state = self.write();
        // raced rebuild: another writer may have filled it in
        if let Some(snapshot) = &state.snapshot {
            return Arc::clone(snapshot);
        }
        let documents: Vec<Arc<DocumentSnapshot>> = state.documents.values().cloned().collect();
        let model = SemanticModel::build(documents.clone(), state.references.has_api_surface);
        let snapshot = Arc::new(Snapshot {
            documents,
            references: state.references.clone(),
            options: state.options.clone(),
            model,
        });
        state.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().expect("workspace lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().expect("workspace lock poisoned")
    }
}

/// Base name of the document without its extension, for structural rules
fn file_stem(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|segments| segments.last())
        .map(|name| name.strip_suffix(".cs").unwrap_or(name))
        .unwrap_or("Untitled")
        .to_string()
}
