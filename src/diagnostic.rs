//! Diagnostic types for analysis results

use serde::{Deserialize, Serialize};
use std::fmt;
use tower_lsp::lsp_types::Url;

/// Severity level for diagnostics
///
/// `Hidden` means the rule still runs and reports, but the engine suppresses
/// the result before publishing ("off" on the wire).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hidden,
    Information,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Information => write!(f, "information"),
            Severity::Hidden => write!(f, "hidden"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    /// Normalises the wire forms: {error, warn|warning, info|information,
    /// hidden|off} map onto the four levels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" | "err" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "information" | "info" => Ok(Severity::Information),
            "hidden" | "off" | "none" => Ok(Severity::Hidden),
            _ => Err(()),
        }
    }
}

impl Severity {
    /// LSP DiagnosticSeverity number (Error=1 .. Hint=4)
    pub fn lsp_code(self) -> u8 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Information => 3,
            Severity::Hidden => 4,
        }
    }
}

/// A position in a source document (0-based line and column, LSP convention)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// A source span: start/end positions within one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    /// Synthetic span used when a diagnostic has no real location
    pub fn zero() -> Self {
        Self::default()
    }

    /// Smallest span covering both inputs
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos >= self.start && pos <= self.end
    }
}

/// An analysis diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Rule ID that produced this diagnostic (always upper-case, e.g. "USH0001")
    pub rule_id: String,
    /// Severity after profile/override resolution
    pub severity: Severity,
    /// Formatted message
    pub message: String,
    /// Document the diagnostic belongs to; `None` for synthetic results
    pub uri: Option<Url>,
    /// Location within the document; `None` clamps to (0,0)-(0,0) on the wire
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(rule_id: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_ascii_uppercase(),
            severity,
            message: message.into(),
            uri: None,
            span: None,
        }
    }

    pub fn with_location(mut self, uri: Url, span: Span) -> Self {
        self.uri = Some(uri);
        self.span = Some(span);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Effective span, clamped to the synthetic zero span when absent
    pub fn span_or_zero(&self) -> Span {
        self.span.unwrap_or_else(Span::zero)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Source tag attached to every published diagnostic
pub const SOURCE_TAG: &str = "UdonSharp";

/// Expand `{0}`-style positional placeholders in a message template
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut out = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", i), arg);
    }
    out
}
