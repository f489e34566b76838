use serde::Serialize;

use crate::errors::Result;
use crate::models::{RunStatus, ScanMode, ScanRun, Severity, TargetKind, Tool, ToolOutcome};

use super::{summarize, RunSummaryCounts};

/// Canonical JSON projection of a run. Field order is fixed by the struct
/// definitions, so serializing the same persisted run twice yields
/// byte-identical output.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    schema_version: &'static str,
    run_id: String,
    target: &'a str,
    target_kind: TargetKind,
    mode: ScanMode,
    selection: &'a [Tool],
    status: RunStatus,
    created_at: String,
    summary: SummaryBlock,
    outcomes: &'a [ToolOutcome],
}

#[derive(Debug, Serialize)]
struct SummaryBlock {
    total_findings: usize,
    by_severity: Vec<SeverityCount>,
    by_tool: Vec<ToolCount>,
}

#[derive(Debug, Serialize)]
struct SeverityCount {
    severity: Severity,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ToolCount {
    tool: Tool,
    count: usize,
}

impl From<RunSummaryCounts> for SummaryBlock {
    fn from(counts: RunSummaryCounts) -> Self {
        Self {
            total_findings: counts.total_findings,
            by_severity: counts
                .by_severity
                .into_iter()
                .map(|(severity, count)| SeverityCount { severity, count })
                .collect(),
            by_tool: counts
                .by_tool
                .into_iter()
                .map(|(tool, count)| ToolCount { tool, count })
                .collect(),
        }
    }
}

pub fn to_json(run: &ScanRun) -> Result<Vec<u8>> {
    let report = JsonReport {
        schema_version: "1",
        run_id: run.id.to_string(),
        target: &run.target.raw,
        target_kind: run.target.kind,
        mode: run.mode,
        selection: &run.selection,
        status: run.status,
        created_at: run.created_at.to_rfc3339(),
        summary: summarize(run).into(),
        outcomes: &run.outcomes,
    };
    let mut bytes = serde_json::to_vec_pretty(&report)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::fixed_run;
    use super::*;

    #[test]
    fn projection_is_idempotent() {
        let run = fixed_run();
        let first = to_json(&run).unwrap();
        let second = to_json(&run).unwrap();
        assert_eq!(first, second, "same run must project to identical bytes");
    }

    #[test]
    fn document_carries_metadata_summary_and_outcomes() {
        let run = fixed_run();
        let value: serde_json::Value =
            serde_json::from_slice(&to_json(&run).unwrap()).unwrap();

        assert_eq!(value["schema_version"], "1");
        assert_eq!(value["target"], "192.0.2.10");
        assert_eq!(value["target_kind"], "ip");
        assert_eq!(value["mode"], "balanced");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["summary"]["total_findings"], 3);
        assert_eq!(value["summary"]["by_severity"][0]["severity"], "critical");
        assert_eq!(value["summary"]["by_severity"][0]["count"], 1);

        let outcomes = value["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0]["tool"], "nmap");
        // findings keep adapter insertion order in the JSON projection
        assert_eq!(outcomes[0]["findings"][0]["title"], "B");
        assert_eq!(outcomes[1]["status"], "skipped");
    }
}
