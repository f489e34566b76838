use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// How a raw target string was classified. The kind is decided once by the
/// classifier and never re-checked downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetKind {
    Ip,
    Domain,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub raw: String,
    pub kind: TargetKind,
}

impl Target {
    /// Host portion suitable for network tools: the URL host for URL
    /// targets, the raw value otherwise.
    pub fn host(&self) -> Option<String> {
        match self.kind {
            TargetKind::Url => url::Url::parse(&self.raw)
                .ok()
                .and_then(|u| u.host_str().map(ToString::to_string)),
            _ => Some(self.raw.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanMode {
    Quick,
    Balanced,
    Deep,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tool {
    Nmap,
    Zap,
    Arachni,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Nmap, Tool::Zap, Tool::Arachni];
}

/// Shared five-level scale every adapter maps its native ratings into.
/// Variant order is the severity order, so `Ord` sorts Info < … < Critical.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// One normalized observation, the contract every adapter satisfies
/// regardless of its tool's native output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub tool: Tool,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutcomeStatus {
    Ok,
    Skipped,
    Simulated,
    Failed,
}

/// Result of one adapter invocation. Built exactly once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: Tool,
    pub status: OutcomeStatus,
    pub findings: Vec<Finding>,
    pub raw_log: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ToolOutcome {
    pub fn skipped(tool: Tool, hint: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            tool,
            status: OutcomeStatus::Skipped,
            findings: Vec::new(),
            raw_log: String::new(),
            started_at: now,
            finished_at: now,
            error_detail: Some(hint.into()),
        }
    }

    pub fn failed(tool: Tool, detail: impl Into<String>, raw_log: String) -> Self {
        let now = Utc::now();
        Self {
            tool,
            status: OutcomeStatus::Failed,
            findings: Vec::new(),
            raw_log,
            started_at: now,
            finished_at: now,
            error_detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    CompletedWithErrors,
}

/// One end-to-end scan request and its aggregated result. Owns its outcomes
/// and, transitively, their findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    pub id: Uuid,
    pub target: Target,
    pub mode: ScanMode,
    pub selection: Vec<Tool>,
    pub outcomes: Vec<ToolOutcome>,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
}

impl ScanRun {
    pub fn new(target: Target, mode: ScanMode, selection: Vec<Tool>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            mode,
            selection,
            outcomes: Vec::new(),
            created_at: Utc::now(),
            status: RunStatus::Running,
        }
    }

    /// Completed iff no outcome failed; skipped and simulated outcomes do
    /// not count as errors.
    pub fn aggregate_status(outcomes: &[ToolOutcome]) -> RunStatus {
        if outcomes.iter().any(|o| o.status == OutcomeStatus::Failed) {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        }
    }

    pub fn finding_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.findings.len()).sum()
    }
}

/// Listing projection returned by `Store::list_recent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub target: String,
    pub target_kind: TargetKind,
    pub mode: ScanMode,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
}
