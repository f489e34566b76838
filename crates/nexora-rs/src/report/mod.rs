//! Report synthesis. Reports are projections of a persisted run, never a
//! second source of truth: both formats can be regenerated at any time from
//! the same `ScanRun`.

mod json;
mod pdf;

pub use json::to_json;
pub use pdf::to_pdf;

use crate::models::{Finding, ScanRun, Severity, Tool, ToolOutcome};

/// Render order for findings inside a report section: severity descending
/// (Critical first), ties broken by title lexical order for determinism.
pub fn sorted_findings(outcome: &ToolOutcome) -> Vec<&Finding> {
    let mut findings: Vec<&Finding> = outcome.findings.iter().collect();
    findings.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.title.cmp(&b.title)));
    findings
}

/// Severity order used by summaries, most severe first.
pub const SEVERITY_ORDER: [Severity; 5] = [
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
    Severity::Info,
];

#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummaryCounts {
    pub total_findings: usize,
    pub by_severity: Vec<(Severity, usize)>,
    pub by_tool: Vec<(Tool, usize)>,
}

pub fn summarize(run: &ScanRun) -> RunSummaryCounts {
    let all: Vec<&Finding> = run.outcomes.iter().flat_map(|o| o.findings.iter()).collect();
    let by_severity = SEVERITY_ORDER
        .into_iter()
        .map(|sev| (sev, all.iter().filter(|f| f.severity == sev).count()))
        .collect();
    let by_tool = run
        .outcomes
        .iter()
        .map(|o| (o.tool, o.findings.len()))
        .collect();
    RunSummaryCounts {
        total_findings: all.len(),
        by_severity,
        by_tool,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::{OutcomeStatus, RunStatus, ScanMode, Target, TargetKind};
    use chrono::{TimeZone, Utc};

    pub fn finding(tool: Tool, severity: Severity, title: &str) -> Finding {
        Finding {
            tool,
            severity,
            title: title.to_string(),
            description: format!("description of {title}"),
            evidence: None,
            port: None,
            service: None,
        }
    }

    /// Deterministic run (fixed timestamps and id) for byte-stability tests.
    pub fn fixed_run() -> ScanRun {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let outcome = ToolOutcome {
            tool: Tool::Nmap,
            status: OutcomeStatus::Ok,
            findings: vec![
                finding(Tool::Nmap, Severity::High, "B"),
                finding(Tool::Nmap, Severity::High, "A"),
                finding(Tool::Nmap, Severity::Critical, "Z"),
            ],
            raw_log: "raw nmap output".to_string(),
            started_at: created,
            finished_at: created,
            error_detail: None,
        };
        ScanRun {
            id: uuid::Uuid::nil(),
            target: Target {
                raw: "192.0.2.10".to_string(),
                kind: TargetKind::Ip,
            },
            mode: ScanMode::Balanced,
            selection: vec![Tool::Nmap],
            outcomes: vec![outcome, ToolOutcome::skipped(Tool::Zap, "install zap")],
            created_at: created,
            status: RunStatus::Completed,
        }
    }
}
