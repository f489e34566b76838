use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::models::{OutcomeStatus, Target, TargetKind, Tool, ToolOutcome};
use crate::parser::parse_zap_json;
use crate::planner::ToolOptions;
use crate::security::{resolve_binary, run_command};

use super::{outcome, simulated_outcome, ToolAdapter};

const INSTALL_HINT: &str =
    "OWASP ZAP not found; install it (zap.sh or zaproxy must be on PATH) or set zap_path / NEXORA_ZAP_PATH";

pub struct ZapAdapter {
    config: Arc<AppConfig>,
}

impl ZapAdapter {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    fn build_args(url: &str, report_path: &str, options: &ToolOptions) -> Vec<String> {
        let mut args = vec![
            "-cmd".to_string(),
            "-quickurl".to_string(),
            url.to_string(),
            "-quickout".to_string(),
            report_path.to_string(),
            "-quickprogress".to_string(),
        ];
        if !options.active {
            // Baseline profile: spider plus passive rules only.
            args.push("-config".to_string());
            args.push("scanner.attackOnStart=false".to_string());
        }
        args
    }
}

#[async_trait::async_trait]
impl ToolAdapter for ZapAdapter {
    fn tool(&self) -> Tool {
        Tool::Zap
    }

    async fn probe(&self, target: &Target, options: &ToolOptions) -> ToolOutcome {
        let started_at = Utc::now();

        if target.kind != TargetKind::Url {
            return ToolOutcome::skipped(
                Tool::Zap,
                "OWASP ZAP only applies to URL targets; provide an http(s) URL",
            );
        }
        let Some(bin) = resolve_binary(self.config.zap_path.as_deref(), &["zap.sh", "zaproxy"])
        else {
            return ToolOutcome::skipped(Tool::Zap, INSTALL_HINT);
        };
        if self.config.simulate {
            return simulated_outcome(Tool::Zap, target, started_at);
        }

        let workdir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => {
                return ToolOutcome::failed(
                    Tool::Zap,
                    format!("could not create work directory: {e}"),
                    String::new(),
                )
            }
        };
        let report_path = workdir.path().join("zap-report.json");

        let args = Self::build_args(&target.raw, &report_path.display().to_string(), options);
        let result = match run_command(&bin, &args, options.timeout).await {
            Ok(r) => r,
            Err(e) => {
                return ToolOutcome::failed(Tool::Zap, format!("failed to spawn zap: {e}"), String::new())
            }
        };

        let raw_log = result.combined_log();
        if result.timed_out {
            return outcome(
                Tool::Zap,
                OutcomeStatus::Failed,
                Vec::new(),
                raw_log,
                started_at,
                Some(format!("zap timed out after {}s", options.timeout.as_secs())),
            );
        }

        let report = std::fs::read_to_string(&report_path).unwrap_or_default();
        match parse_zap_json(&report) {
            Ok(findings) => {
                debug!(count = findings.len(), "zap findings normalized");
                outcome(Tool::Zap, OutcomeStatus::Ok, findings, raw_log, started_at, None)
            }
            Err(e) if result.success() || !report.trim().is_empty() => {
                warn!(error = %e, "zap report did not parse, keeping raw log");
                outcome(Tool::Zap, OutcomeStatus::Ok, Vec::new(), raw_log, started_at, None)
            }
            Err(_) => outcome(
                Tool::Zap,
                OutcomeStatus::Failed,
                Vec::new(),
                raw_log,
                started_at,
                Some(format!(
                    "zap exited with {:?} and wrote no report",
                    result.exit_code
                )),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options(active: bool) -> ToolOptions {
        ToolOptions {
            timeout: Duration::from_secs(60),
            port_scope: crate::planner::PortScope::Top(100),
            service_detection: false,
            vuln_scripts: false,
            active,
        }
    }

    #[tokio::test]
    async fn non_url_target_is_skipped_before_any_lookup() {
        let adapter = ZapAdapter::new(Arc::new(AppConfig::default()));
        let target = Target {
            raw: "192.0.2.10".to_string(),
            kind: TargetKind::Ip,
        };
        let out = adapter.probe(&target, &options(false)).await;
        assert_eq!(out.status, OutcomeStatus::Skipped);
        assert!(out
            .error_detail
            .as_deref()
            .unwrap_or("")
            .contains("URL targets"));
    }

    #[tokio::test]
    async fn missing_binary_skips_with_installation_hint() {
        let config = Arc::new(AppConfig {
            zap_path: Some("/nonexistent/zap.sh".to_string()),
            ..AppConfig::default()
        });
        let adapter = ZapAdapter::new(config);
        let target = Target {
            raw: "https://example.com".to_string(),
            kind: TargetKind::Url,
        };
        let out = adapter.probe(&target, &options(false)).await;
        assert_eq!(out.status, OutcomeStatus::Skipped);
        assert!(out.error_detail.as_deref().unwrap_or("").contains("ZAP"));
    }

    #[test]
    fn passive_profile_disables_active_scanning() {
        let passive = ZapAdapter::build_args("https://example.com", "/tmp/r.json", &options(false));
        assert!(passive.contains(&"scanner.attackOnStart=false".to_string()));

        let active = ZapAdapter::build_args("https://example.com", "/tmp/r.json", &options(true));
        assert!(!active.contains(&"scanner.attackOnStart=false".to_string()));
        assert!(active.contains(&"-quickurl".to_string()));
    }
}
