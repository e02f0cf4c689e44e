//! The UdonSharp language server
//!
//! One `Backend` owns the workspace, the policy repository and the settings
//! snapshot. Document events re-run analysis; a newer change for the same
//! URI cancels the in-flight run, so diagnostics are published in arrival
//! order and later updates supersede earlier ones.

use super::convert;
use super::requests::{self, DocumentationParams, DocumentationResponse, RuleListEntry, ServerStatus};
use crate::analysis::{analyze, CancelToken};
use crate::policy::{load_catalog, PolicyRepository};
use crate::settings::Settings;
use crate::telemetry::Telemetry;
use crate::workspace::WorkspaceManager;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

/// Directory of bundled policy packs, relative to the executable
pub const POLICY_PACK_DIR: &str = "PolicyPacks";

/// How long shutdown waits for in-flight analyses to quiesce
const SHUTDOWN_QUIESCE: Duration = Duration::from_secs(2);

pub struct Backend {
    client: Client,
    workspace: Arc<WorkspaceManager>,
    policy: Arc<PolicyRepository>,
    settings: RwLock<Arc<Settings>>,
    telemetry: Arc<Telemetry>,
    /// Directory the bundled PolicyPacks/ and Stubs/ trees live under
    base_dir: PathBuf,
    /// Extra packs from the command line, loaded after the settings packs
    cli_packs: Vec<PathBuf>,
    workspace_root: RwLock<Option<PathBuf>>,
    /// In-flight analysis per URI; a replacement cancels its predecessor
    inflight: DashMap<Url, CancelToken>,
    active_analyses: Arc<AtomicUsize>,
}

impl Backend {
    pub fn new(client: Client, base_dir: PathBuf, cli_packs: Vec<PathBuf>) -> Self {
        Self {
            client,
            workspace: Arc::new(WorkspaceManager::new()),
            policy: Arc::new(PolicyRepository::new(load_catalog(None, &[]))),
            settings: RwLock::new(Arc::new(Settings::default())),
            telemetry: Arc::new(Telemetry::new()),
            base_dir,
            cli_packs,
            workspace_root: RwLock::new(None),
            inflight: DashMap::new(),
            active_analyses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pack load order: bundled directory, then settings paths, then the
    /// command line; later loads win by ID.
    fn pack_paths(&self, settings: &Settings) -> Vec<PathBuf> {
        let mut paths = settings.policy_pack_paths.clone();
        paths.extend(self.cli_packs.iter().cloned());
        paths
    }

    fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings.read().expect("settings lock poisoned"))
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root
            .read()
            .expect("root lock poisoned")
            .clone()
    }

    /// Apply a resolved settings snapshot: reload policy packs, rebuild
    /// references when the surface changed, swap atomically.
    fn apply_settings(&self, new: Settings) -> bool {
        let old = self.settings();
        if *old == new {
            return false;
        }
        let surface_changed = old.unity_api_surface != new.unity_api_surface
            || old.custom_stub_path != new.custom_stub_path;

        self.policy.reload(load_catalog(
            Some(&self.base_dir.join(POLICY_PACK_DIR)),
            &self.pack_paths(&new),
        ));
        self.telemetry.apply_mode(new.telemetry);

        let new = Arc::new(new);
        *self.settings.write().expect("settings lock poisoned") = Arc::clone(&new);

        if surface_changed {
            self.workspace.initialise(&new, &self.base_dir);
        }
        true
    }

    /// Run analysis for one document and publish the result, unless a newer
    /// change supersedes this run first.
    async fn reanalyze(&self, uri: Url) {
        let cancel = CancelToken::new();
        if let Some(previous) = self.inflight.insert(uri.clone(), cancel.clone()) {
            previous.cancel();
        }

        let snapshot = self.workspace.snapshot();
        let settings = self.settings();
        let policy = Arc::clone(&self.policy);
        let counter = Arc::clone(&self.active_analyses);
        let task_uri = uri.clone();
        let task_cancel = cancel.clone();

        counter.fetch_add(1, Ordering::SeqCst);
        let outcome = tokio::task::spawn_blocking(move || {
            analyze(&snapshot, &task_uri, &settings, &policy, &task_cancel)
        })
        .await;
        counter.fetch_sub(1, Ordering::SeqCst);

        let diagnostics = match outcome {
            Ok(diagnostics) => diagnostics,
            Err(err) => {
                tracing::error!(uri = %uri, error = %err, "analysis task failed");
                return;
            }
        };
        if cancel.is_cancelled() {
            return;
        }
        self.telemetry.record_analysis(diagnostics.len());
        self.client
            .publish_diagnostics(uri, convert::to_lsp_diagnostics(&diagnostics), None)
            .await;
    }

    async fn reanalyze_all(&self) {
        for uri in self.workspace.open_uris() {
            self.reanalyze(uri).await;
        }
    }

    // ---- custom methods --------------------------------------------------

    pub async fn rules_list(&self) -> Result<Vec<RuleListEntry>> {
        Ok(requests::rules_list(&self.policy))
    }

    pub async fn rule_documentation(
        &self,
        params: DocumentationParams,
    ) -> Result<DocumentationResponse> {
        Ok(requests::rule_documentation(&self.policy, &params))
    }

    pub async fn server_status(&self) -> Result<ServerStatus> {
        Ok(requests::server_status(&self.policy, &self.settings()))
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "initializing");

        let root = params
            .root_uri
            .as_ref()
            .and_then(|uri| uri.to_file_path().ok());
        *self.workspace_root.write().expect("root lock poisoned") = root.clone();

        let settings =
            Settings::resolve(params.initialization_options.as_ref(), root.as_deref());
        self.policy.reload(load_catalog(
            Some(&self.base_dir.join(POLICY_PACK_DIR)),
            &self.pack_paths(&settings),
        ));
        self.telemetry.apply_mode(settings.telemetry);
        self.workspace.initialise(&settings, &self.base_dir);
        *self.settings.write().expect("settings lock poisoned") = Arc::new(settings);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        will_save: None,
                        will_save_wait_until: None,
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                    },
                )),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: "ushlint".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("server ready");
        self.client
            .log_message(MessageType::INFO, "UdonSharp linter ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down");
        let deadline = tokio::time::Instant::now() + SHUTDOWN_QUIESCE;
        while self.active_analyses.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("aborting in-flight analyses on shutdown");
                for entry in self.inflight.iter() {
                    entry.value().cancel();
                }
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        self.telemetry.log_summary();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!(uri = %uri, "document opened");
        self.workspace.open_or_update(
            uri.clone(),
            &params.text_document.text,
            params.text_document.version,
        );
        self.reanalyze(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // full sync: the last change carries the complete text
        if let Some(change) = params.content_changes.into_iter().last() {
            self.workspace
                .open_or_update(uri.clone(), &change.text, params.text_document.version);
            self.reanalyze(uri).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(text) = params.text {
            if let Some(doc) = self.workspace.get(&uri) {
                self.workspace.open_or_update(uri.clone(), &text, doc.version);
            } else {
                self.workspace.open_or_update(uri.clone(), &text, 0);
            }
        }
        self.reanalyze(uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!(uri = %uri, "document closed");
        if let Some((_, cancel)) = self.inflight.remove(&uri) {
            cancel.cancel();
        }
        self.workspace.remove(&uri);
        // exactly one empty publish clears the client's diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let root = self.workspace_root();
        let settings = Settings::resolve(Some(&params.settings), root.as_deref());
        if self.apply_settings(settings) {
            tracing::info!("configuration changed; republishing diagnostics");
            self.reanalyze_all().await;
        }
    }
}

/// Build the LSP service with the custom `udonsharp/*` methods registered.
/// Unknown methods get the standard -32601 from the JSON-RPC layer.
pub fn build_service(
    base_dir: PathBuf,
    cli_packs: Vec<PathBuf>,
) -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::build(move |client| Backend::new(client, base_dir, cli_packs))
        .custom_method("udonsharp/rules/list", Backend::rules_list)
        .custom_method("udonsharp/rules/documentation", Backend::rule_documentation)
        .custom_method("udonsharp/server/status", Backend::server_status)
        // legacy alias, resolves identically
        .custom_method("udonsharp/status", Backend::server_status)
        .finish()
}
