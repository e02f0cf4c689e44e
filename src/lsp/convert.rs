//! Conversion from internal diagnostics to the LSP wire shape

use crate::diagnostic::{Diagnostic, Severity, SOURCE_TAG};
use tower_lsp::lsp_types::{
    Diagnostic as LspDiagnostic, DiagnosticSeverity, NumberOrString, Position, Range,
};

fn severity_to_lsp(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hidden => DiagnosticSeverity::HINT,
    }
}

/// Convert one diagnostic. Locations clamp to `(0,0)-(0,0)` when absent.
pub fn to_lsp_diagnostic(diagnostic: &Diagnostic) -> LspDiagnostic {
    let span = diagnostic.span_or_zero();
    LspDiagnostic {
        range: Range {
            start: Position {
                line: span.start.line,
                character: span.start.col,
            },
            end: Position {
                line: span.end.line,
                character: span.end.col,
            },
        },
        severity: Some(severity_to_lsp(diagnostic.severity)),
        code: Some(NumberOrString::String(diagnostic.rule_id.clone())),
        code_description: None,
        source: Some(SOURCE_TAG.to_string()),
        message: diagnostic.message.clone(),
        related_information: None,
        tags: None,
        data: None,
    }
}

pub fn to_lsp_diagnostics(diagnostics: &[Diagnostic]) -> Vec<LspDiagnostic> {
    diagnostics.iter().map(to_lsp_diagnostic).collect()
}
