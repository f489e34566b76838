//! Tool adapters: one per external scanner, polymorphic over `probe`.
//! An adapter never returns an error outward — availability problems,
//! timeouts and process failures are all folded into the returned
//! `ToolOutcome`, so one misbehaving tool can never abort its siblings.

mod arachni;
mod nmap;
mod zap;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use arachni::ArachniAdapter;
pub use nmap::NmapAdapter;
pub use zap::ZapAdapter;

use crate::config::AppConfig;
use crate::models::{Finding, OutcomeStatus, Severity, Target, Tool, ToolOutcome};
use crate::planner::ToolOptions;

#[async_trait::async_trait]
pub trait ToolAdapter: Send + Sync {
    fn tool(&self) -> Tool;

    /// Runs the underlying tool against `target` with the planned options.
    /// All failure modes are reported through `ToolOutcome::status`.
    async fn probe(&self, target: &Target, options: &ToolOptions) -> ToolOutcome;
}

pub fn adapter_for(tool: Tool, config: Arc<AppConfig>) -> Box<dyn ToolAdapter> {
    match tool {
        Tool::Nmap => Box::new(NmapAdapter::new(config)),
        Tool::Zap => Box::new(ZapAdapter::new(config)),
        Tool::Arachni => Box::new(ArachniAdapter::new(config)),
    }
}

pub(crate) fn outcome(
    tool: Tool,
    status: OutcomeStatus,
    findings: Vec<Finding>,
    raw_log: String,
    started_at: DateTime<Utc>,
    error_detail: Option<String>,
) -> ToolOutcome {
    ToolOutcome {
        tool,
        status,
        findings,
        raw_log,
        started_at,
        finished_at: Utc::now(),
        error_detail,
    }
}

/// Dry-run outcome: representative placeholder findings, clearly tagged as
/// non-authoritative, with no process spawned.
pub(crate) fn simulated_outcome(
    tool: Tool,
    target: &Target,
    started_at: DateTime<Utc>,
) -> ToolOutcome {
    let placeholder = |severity: Severity, title: &str, description: &str| Finding {
        tool,
        severity,
        title: format!("[simulated] {title}"),
        description: format!("{description} (dry run against {}, not authoritative)", target.raw),
        evidence: None,
        port: None,
        service: None,
    };

    let findings = match tool {
        Tool::Nmap => vec![
            placeholder(Severity::Info, "Open port 80/tcp", "Representative open-port result"),
            placeholder(
                Severity::Medium,
                "Outdated service banner",
                "Representative vulners NSE result",
            ),
        ],
        Tool::Zap => vec![placeholder(
            Severity::Medium,
            "Missing security headers",
            "Representative passive-scan result",
        )],
        Tool::Arachni => vec![placeholder(
            Severity::High,
            "Reflected XSS",
            "Representative audit result",
        )],
    };

    outcome(
        tool,
        OutcomeStatus::Simulated,
        findings,
        "simulated run, no process spawned".to_string(),
        started_at,
        None,
    )
}
