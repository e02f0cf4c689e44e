//! In-process telemetry aggregation
//!
//! Counts analyses and published diagnostics for the session summary that
//! is logged on shutdown. Nothing leaves the process. Disabled entirely by
//! `telemetry = "off"` or `UDONSHARP_LINTER_TELEMETRY=0`.

use crate::settings::TelemetryMode;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub const TELEMETRY_ENV: &str = "UDONSHARP_LINTER_TELEMETRY";

#[derive(Debug, Default)]
pub struct Telemetry {
    disabled: AtomicBool,
    analyses: AtomicU64,
    diagnostics: AtomicU64,
}

impl Telemetry {
    pub fn new() -> Self {
        let telemetry = Self::default();
        if std::env::var(TELEMETRY_ENV).as_deref() == Ok("0") {
            telemetry.disabled.store(true, Ordering::Relaxed);
        }
        telemetry
    }

    /// Apply the configured mode; the environment kill switch wins
    pub fn apply_mode(&self, mode: TelemetryMode) {
        let env_off = std::env::var(TELEMETRY_ENV).as_deref() == Ok("0");
        self.disabled
            .store(env_off || mode == TelemetryMode::Off, Ordering::Relaxed);
    }

    pub fn record_analysis(&self, diagnostics_published: usize) {
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        self.analyses.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .fetch_add(diagnostics_published as u64, Ordering::Relaxed);
    }

    pub fn analyses(&self) -> u64 {
        self.analyses.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        tracing::info!(
            analyses = self.analyses.load(Ordering::Relaxed),
            diagnostics = self.diagnostics.load(Ordering::Relaxed),
            "session telemetry"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let telemetry = Telemetry::default();
        telemetry.record_analysis(3);
        telemetry.record_analysis(0);
        assert_eq!(telemetry.analyses(), 2);
    }

    #[test]
    fn test_off_mode_stops_counting() {
        let telemetry = Telemetry::default();
        telemetry.apply_mode(TelemetryMode::Off);
        telemetry.record_analysis(3);
        assert_eq!(telemetry.analyses(), 0);

        telemetry.apply_mode(TelemetryMode::Minimal);
        telemetry.record_analysis(3);
        assert_eq!(telemetry.analyses(), 1);
    }
}
