use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::models::{OutcomeStatus, Target, TargetKind, Tool, ToolOutcome};
use crate::parser::parse_arachni_json;
use crate::planner::ToolOptions;
use crate::security::{resolve_binary, run_command};

use super::{outcome, simulated_outcome, ToolAdapter};

const INSTALL_HINT: &str =
    "Arachni not found; install the arachni framework (arachni and arachni_reporter on PATH) or set arachni_path / NEXORA_ARACHNI_PATH";

/// Arachni writes a binary AFR report; a second `arachni_reporter` pass
/// converts it to JSON. Both binaries must resolve for the adapter to run.
pub struct ArachniAdapter {
    config: Arc<AppConfig>,
}

impl ArachniAdapter {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    fn scan_args(url: &str, afr_path: &Path) -> Vec<String> {
        vec![
            url.to_string(),
            "--report-save-path".to_string(),
            afr_path.display().to_string(),
            "--output-only-positives".to_string(),
        ]
    }

    fn reporter_args(afr_path: &Path, json_path: &Path) -> Vec<String> {
        vec![
            afr_path.display().to_string(),
            format!("--reporter=json:outfile={}", json_path.display()),
        ]
    }
}

#[async_trait::async_trait]
impl ToolAdapter for ArachniAdapter {
    fn tool(&self) -> Tool {
        Tool::Arachni
    }

    async fn probe(&self, target: &Target, options: &ToolOptions) -> ToolOutcome {
        let started_at = Utc::now();

        if target.kind != TargetKind::Url {
            return ToolOutcome::skipped(
                Tool::Arachni,
                "Arachni only applies to URL targets; provide an http(s) URL",
            );
        }
        let scanner = resolve_binary(self.config.arachni_path.as_deref(), &["arachni"]);
        let reporter = resolve_binary(
            self.config.arachni_reporter_path.as_deref(),
            &["arachni_reporter"],
        );
        let (Some(scanner), Some(reporter)) = (scanner, reporter) else {
            return ToolOutcome::skipped(Tool::Arachni, INSTALL_HINT);
        };
        if self.config.simulate {
            return simulated_outcome(Tool::Arachni, target, started_at);
        }

        let workdir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => {
                return ToolOutcome::failed(
                    Tool::Arachni,
                    format!("could not create work directory: {e}"),
                    String::new(),
                )
            }
        };
        let afr_path = workdir.path().join("scan.afr");
        let json_path = workdir.path().join("scan.json");

        let scan = match run_command(
            &scanner,
            &Self::scan_args(&target.raw, &afr_path),
            options.timeout,
        )
        .await
        {
            Ok(r) => r,
            Err(e) => {
                return ToolOutcome::failed(
                    Tool::Arachni,
                    format!("failed to spawn arachni: {e}"),
                    String::new(),
                )
            }
        };

        let mut raw_log = scan.combined_log();
        if scan.timed_out {
            return outcome(
                Tool::Arachni,
                OutcomeStatus::Failed,
                Vec::new(),
                raw_log,
                started_at,
                Some(format!(
                    "arachni timed out after {}s",
                    options.timeout.as_secs()
                )),
            );
        }
        if !afr_path.exists() {
            return outcome(
                Tool::Arachni,
                OutcomeStatus::Failed,
                Vec::new(),
                raw_log,
                started_at,
                Some(format!(
                    "arachni exited with {:?} and wrote no report",
                    scan.exit_code
                )),
            );
        }

        // Export pass is short; it only converts the already-written AFR.
        let export = match run_command(
            &reporter,
            &Self::reporter_args(&afr_path, &json_path),
            options.timeout,
        )
        .await
        {
            Ok(r) => r,
            Err(e) => {
                return ToolOutcome::failed(
                    Tool::Arachni,
                    format!("failed to spawn arachni_reporter: {e}"),
                    raw_log,
                )
            }
        };
        if !export.stderr.is_empty() {
            raw_log.push_str("\n--- reporter ---\n");
            raw_log.push_str(export.stderr.trim());
        }

        let report = std::fs::read_to_string(&json_path).unwrap_or_default();
        match parse_arachni_json(&report) {
            Ok(findings) => {
                debug!(count = findings.len(), "arachni findings normalized");
                outcome(
                    Tool::Arachni,
                    OutcomeStatus::Ok,
                    findings,
                    raw_log,
                    started_at,
                    None,
                )
            }
            Err(e) => {
                warn!(error = %e, "arachni report did not parse, keeping raw log");
                outcome(
                    Tool::Arachni,
                    OutcomeStatus::Ok,
                    Vec::new(),
                    raw_log,
                    started_at,
                    None,
                )
            }
        }
    }
}
