//! ushlint - static-analysis language server for UdonSharp
//!
//! The server speaks LSP over stdio, re-analyses open `.cs` documents on
//! every change, and publishes diagnostics (USH0001-USH0045) that mirror
//! the UdonSharp compiler's acceptance rules.
//!
//! # Architecture
//!
//! ```text
//! LSP client -> lsp::Backend -> WorkspaceManager -> Snapshot
//!                                   |                  |
//!                             PolicyRepository -> analysis::analyze
//! ```
//!
//! The workspace serialises mutation behind one writer and hands analyses
//! immutable snapshots; the policy repository is an atomically swapped
//! catalogue; rules are isolated so one fault cannot silence the rest.

pub mod analysis;
pub mod descriptors;
pub mod diagnostic;
pub mod lsp;
pub mod policy;
pub mod references;
pub mod semantic;
pub mod settings;
pub mod syntax;
pub mod telemetry;
pub mod workspace;

pub use analysis::{analyze, CancelToken};
pub use descriptors::{builtin_descriptors, RuleCategory, RuleDescriptor};
pub use diagnostic::{Diagnostic, Pos, Severity, Span};
pub use lsp::{build_service, Backend};
pub use policy::{load_catalog, PolicyRepository, RuleDefinition};
pub use references::{resolve_references, ReferenceSet};
pub use settings::{ApiSurface, Settings, TelemetryMode};
pub use workspace::{Snapshot, WorkspaceManager};
