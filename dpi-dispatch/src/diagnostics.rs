//! Diagnostic reports for unresolved imports
//!
//! When a declared import has no implementation, the dispatcher emits one
//! `DiagnosticReport` per call to the environment's `DiagnosticSink`. Sinks
//! must not block or fail the caller.

use crate::types::{CallerSite, Timestamp};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Category code: declared import, implementation not found
pub const UNRESOLVED_IMPORT: &str = "DPI-DIFNF";

/// A structured, non-fatal report of an unresolved call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    /// Category code (see [`UNRESOLVED_IMPORT`])
    pub category: &'static str,
    /// Where the import was called from
    pub site: CallerSite,
    /// Reserved context slots; always zero
    pub context: [usize; 2],
    /// Name of the declared import
    pub symbol: &'static str,
    /// When the report was produced
    pub reported_at: Timestamp,
}

impl DiagnosticReport {
    /// Report for a call to `symbol` that found no implementation
    pub fn unresolved(symbol: &'static str, site: CallerSite) -> Self {
        Self {
            category: UNRESOLVED_IMPORT,
            site,
            context: [0, 0],
            symbol,
            reported_at: Utc::now(),
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: declared import `{}` has no implementation; call ignored",
            self.category, self.site, self.symbol
        )
    }
}

/// Receiver of diagnostic reports
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, report: &DiagnosticReport);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn report(&self, report: &DiagnosticReport) {
        (**self).report(report)
    }
}

/// Sink that writes reports to the `log` facade at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, report: &DiagnosticReport) {
        log::error!(target: "dpi_dispatch::diagnostics", "{}", report);
    }
}

/// Sink that keeps every report in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<DiagnosticReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored; the vector is plain data.
    fn lock(&self) -> MutexGuard<'_, Vec<DiagnosticReport>> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all reports so far, in arrival order
    pub fn reports(&self) -> Vec<DiagnosticReport> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of reports naming `symbol`
    pub fn count_for(&self, symbol: &str) -> usize {
        self.lock().iter().filter(|r| r.symbol == symbol).count()
    }

    /// Reports naming `symbol`, in arrival order
    pub fn reports_for(&self, symbol: &str) -> Vec<DiagnosticReport> {
        self.lock().iter().filter(|r| r.symbol == symbol).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, report: &DiagnosticReport) {
        self.lock().push(report.clone());
    }
}

/// Sink that keeps only a report count per import
#[derive(Debug, Default)]
pub struct CountingSink {
    counts: Mutex<BTreeMap<&'static str, usize>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<&'static str, usize>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count per import name, sorted by name
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        self.lock().clone()
    }

    pub fn count_for(&self, symbol: &str) -> usize {
        self.lock().get(symbol).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.lock().values().sum()
    }
}

impl DiagnosticSink for CountingSink {
    fn report(&self, report: &DiagnosticReport) {
        *self.lock().entry(report.symbol).or_insert(0) += 1;
    }
}

/// Sink that forwards every report to several sinks in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a sink
    pub fn with(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DiagnosticSink for FanoutSink {
    fn report(&self, report: &DiagnosticReport) {
        for sink in &self.sinks {
            sink.report(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_report_fields() {
        let report = DiagnosticReport::unresolved("print_cycles", CallerSite::new("testbench.sv", 88));
        assert_eq!(report.category, "DPI-DIFNF");
        assert_eq!(report.context, [0, 0]);
        assert_eq!(report.symbol, "print_cycles");
        assert_eq!(report.site.line, 88);
    }

    #[test]
    fn test_report_display() {
        let report = DiagnosticReport::unresolved("print_close", CallerSite::new("testbench.sv", 120));
        assert_eq!(
            report.to_string(),
            "[DPI-DIFNF] testbench.sv:120: declared import `print_close` has no implementation; call ignored"
        );
    }

    #[test]
    fn test_memory_sink_counts() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.report(&DiagnosticReport::unresolved("print_reg", CallerSite::new("a.sv", 1)));
        sink.report(&DiagnosticReport::unresolved("print_reg", CallerSite::new("a.sv", 2)));
        sink.report(&DiagnosticReport::unresolved("print_stage", CallerSite::new("a.sv", 3)));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count_for("print_reg"), 2);
        assert_eq!(sink.count_for("print_membus"), 0);
        assert_eq!(sink.reports_for("print_stage")[0].site.line, 3);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_counting_sink_keeps_totals() {
        let sink = CountingSink::new();
        for line in 0..1000 {
            sink.report(&DiagnosticReport::unresolved("print_membus", CallerSite::new("a.sv", line)));
        }
        sink.report(&DiagnosticReport::unresolved("print_close", CallerSite::new("a.sv", 7)));

        assert_eq!(sink.total(), 1001);
        assert_eq!(sink.count_for("print_membus"), 1000);
        assert_eq!(sink.count_for("print_header"), 0);
        assert_eq!(
            sink.counts().into_iter().collect::<Vec<_>>(),
            vec![("print_close", 1), ("print_membus", 1000)]
        );
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(LogSink));

        fanout.report(&DiagnosticReport::unresolved("print_header", CallerSite::new("a.sv", 9)));

        assert_eq!(fanout.len(), 3);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = DiagnosticReport::unresolved("print_membus", CallerSite::new("mem.sv", 5));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["category"], "DPI-DIFNF");
        assert_eq!(json["site"]["file"], "mem.sv");
        assert_eq!(json["symbol"], "print_membus");
    }
}
