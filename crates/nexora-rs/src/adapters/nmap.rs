use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::models::{OutcomeStatus, Target, Tool, ToolOutcome};
use crate::parser::parse_nmap_xml;
use crate::planner::{PortScope, ToolOptions};
use crate::security::{resolve_binary, run_command};

use super::{outcome, simulated_outcome, ToolAdapter};

const INSTALL_HINT: &str =
    "nmap binary not found; install it (e.g. `apt install nmap`) or set nmap_path / NEXORA_NMAP_PATH";

pub struct NmapAdapter {
    config: Arc<AppConfig>,
}

impl NmapAdapter {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    fn build_args(host: &str, options: &ToolOptions) -> Vec<String> {
        let mut args = vec!["-oX".to_string(), "-".to_string()];
        match options.port_scope {
            PortScope::Top(n) => {
                args.push("--top-ports".to_string());
                args.push(n.to_string());
            }
            PortScope::Full => args.push("-p-".to_string()),
        }
        if options.service_detection {
            args.push("-sV".to_string());
        }
        if options.vuln_scripts {
            args.push("--script".to_string());
            args.push("vulners".to_string());
        }
        args.push(host.to_string());
        args
    }
}

#[async_trait::async_trait]
impl ToolAdapter for NmapAdapter {
    fn tool(&self) -> Tool {
        Tool::Nmap
    }

    async fn probe(&self, target: &Target, options: &ToolOptions) -> ToolOutcome {
        let started_at = Utc::now();

        let Some(bin) = resolve_binary(self.config.nmap_path.as_deref(), &["nmap"]) else {
            return ToolOutcome::skipped(Tool::Nmap, INSTALL_HINT);
        };
        if self.config.simulate {
            return simulated_outcome(Tool::Nmap, target, started_at);
        }

        // URL targets are scanned by host; nmap has no use for the path part.
        let Some(host) = target.host() else {
            return ToolOutcome::failed(
                Tool::Nmap,
                format!("could not extract a host from '{}'", target.raw),
                String::new(),
            );
        };

        let args = Self::build_args(&host, options);
        let result = match run_command(&bin, &args, options.timeout).await {
            Ok(r) => r,
            Err(e) => {
                return ToolOutcome::failed(Tool::Nmap, format!("failed to spawn nmap: {e}"), String::new())
            }
        };

        let raw_log = result.combined_log();
        if result.timed_out {
            return outcome(
                Tool::Nmap,
                OutcomeStatus::Failed,
                Vec::new(),
                raw_log,
                started_at,
                Some(format!("nmap timed out after {}s", options.timeout.as_secs())),
            );
        }

        match parse_nmap_xml(&result.stdout) {
            Ok(findings) => {
                debug!(count = findings.len(), host = %host, "nmap findings normalized");
                outcome(Tool::Nmap, OutcomeStatus::Ok, findings, raw_log, started_at, None)
            }
            // Garbled output still carries informational value in the raw
            // log, so a parse failure only degrades to zero findings —
            // unless the process also failed and left nothing usable.
            Err(e) if result.success() || !result.stdout.trim().is_empty() => {
                warn!(error = %e, "nmap output did not parse, keeping raw log");
                outcome(Tool::Nmap, OutcomeStatus::Ok, Vec::new(), raw_log, started_at, None)
            }
            Err(_) => outcome(
                Tool::Nmap,
                OutcomeStatus::Failed,
                Vec::new(),
                raw_log,
                started_at,
                Some(format!(
                    "nmap exited with {:?} and produced no usable output",
                    result.exit_code
                )),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetKind;
    use std::time::Duration;

    fn url_target() -> Target {
        Target {
            raw: "https://example.com/app".to_string(),
            kind: TargetKind::Url,
        }
    }

    fn options(port_scope: PortScope, service_detection: bool, vuln_scripts: bool) -> ToolOptions {
        ToolOptions {
            timeout: Duration::from_secs(60),
            port_scope,
            service_detection,
            vuln_scripts,
            active: false,
        }
    }

    #[test]
    fn quick_args_have_no_scripts() {
        let args = NmapAdapter::build_args("192.0.2.10", &options(PortScope::Top(100), false, false));
        assert_eq!(
            args,
            vec!["-oX", "-", "--top-ports", "100", "192.0.2.10"]
        );
    }

    #[test]
    fn deep_args_cover_full_range_with_vulners() {
        let args = NmapAdapter::build_args("example.com", &options(PortScope::Full, true, true));
        assert_eq!(
            args,
            vec!["-oX", "-", "-p-", "-sV", "--script", "vulners", "example.com"]
        );
    }

    #[tokio::test]
    async fn missing_binary_skips_with_hint_and_spawns_nothing() {
        let config = Arc::new(AppConfig {
            nmap_path: Some("/nonexistent/nmap".to_string()),
            ..AppConfig::default()
        });
        let adapter = NmapAdapter::new(config);
        let out = adapter
            .probe(&url_target(), &options(PortScope::Top(100), false, false))
            .await;
        assert_eq!(out.status, OutcomeStatus::Skipped);
        assert!(out.error_detail.as_deref().unwrap_or("").contains("nmap"));
        assert!(out.findings.is_empty());
        assert!(out.raw_log.is_empty());
    }

    #[tokio::test]
    async fn simulate_config_yields_tagged_placeholders() {
        let sh = which::which("sh").unwrap();
        let config = Arc::new(AppConfig {
            nmap_path: Some(sh.display().to_string()),
            simulate: true,
            ..AppConfig::default()
        });
        let adapter = NmapAdapter::new(config);
        let out = adapter
            .probe(&url_target(), &options(PortScope::Top(100), false, false))
            .await;
        assert_eq!(out.status, OutcomeStatus::Simulated);
        assert!(out.findings.iter().all(|f| f.title.starts_with("[simulated]")));
    }
}
