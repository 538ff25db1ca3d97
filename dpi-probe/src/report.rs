//! Probe report generation (text and JSON)

use anyhow::Result;
use chrono::{DateTime, Utc};
use dpi_dispatch::{DiagnosticReport, ResolutionState};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct CallbackStatus {
    pub name: &'static str,
    pub state: ResolutionState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub generated_at: DateTime<Utc>,
    pub callbacks: Vec<CallbackStatus>,
    pub calls: usize,
    /// Diagnostic count per import name
    pub diagnostic_counts: BTreeMap<&'static str, usize>,
    /// Individual reports; only collected for JSON output
    pub diagnostics: Vec<DiagnosticReport>,
}

impl ProbeReport {
    pub fn new(
        resolution: Vec<(&'static str, ResolutionState)>,
        calls: usize,
        diagnostic_counts: BTreeMap<&'static str, usize>,
        diagnostics: Vec<DiagnosticReport>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            callbacks: resolution
                .into_iter()
                .map(|(name, state)| CallbackStatus { name, state })
                .collect(),
            calls,
            diagnostic_counts,
            diagnostics,
        }
    }

    pub fn bound(&self) -> usize {
        self.callbacks
            .iter()
            .filter(|c| c.state == ResolutionState::Present)
            .count()
    }

    pub fn total_diagnostics(&self) -> usize {
        self.diagnostic_counts.values().sum()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Declared imports:\n");
        for status in &self.callbacks {
            out.push_str(&format!("  {:<14} {}\n", status.name, status.state));
        }
        out.push_str(&format!(
            "\n{} of {} bound\n",
            self.bound(),
            self.callbacks.len()
        ));

        if self.calls > 0 {
            out.push_str(&format!(
                "{} calls made, {} diagnostics\n",
                self.calls,
                self.total_diagnostics()
            ));
            for (symbol, count) in &self.diagnostic_counts {
                out.push_str(&format!("  {:<14} {}\n", symbol, count));
            }
        }
        out
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpi_dispatch::CallerSite;

    fn sample() -> ProbeReport {
        ProbeReport::new(
            vec![
                ("print_header", ResolutionState::Present),
                ("print_cycles", ResolutionState::Absent),
            ],
            4,
            BTreeMap::from([("print_cycles", 2)]),
            vec![
                DiagnosticReport::unresolved("print_cycles", CallerSite::new("tb.sv", 3)),
                DiagnosticReport::unresolved("print_cycles", CallerSite::new("tb.sv", 4)),
            ],
        )
    }

    #[test]
    fn test_text_report() {
        let text = sample().render_text();
        assert!(text.contains("print_header   present"));
        assert!(text.contains("1 of 2 bound"));
        assert!(text.contains("4 calls made, 2 diagnostics"));
    }

    #[test]
    fn test_json_report() {
        let json: serde_json::Value = serde_json::from_str(&sample().render_json().unwrap()).unwrap();
        assert_eq!(json["callbacks"][1]["state"], "absent");
        assert_eq!(json["diagnostics"][0]["category"], "DPI-DIFNF");
    }

    #[test]
    fn test_text_report_uses_counts_only() {
        let report = ProbeReport::new(
            vec![("print_close", ResolutionState::Absent)],
            50_000,
            BTreeMap::from([("print_close", 50_000)]),
            Vec::new(),
        );
        let text = report.render_text();
        assert!(text.contains("50000 calls made, 50000 diagnostics"));
        assert!(text.contains("print_close    50000"));
    }
}
