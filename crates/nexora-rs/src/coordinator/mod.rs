use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::adapters::{adapter_for, ToolAdapter};
use crate::config::AppConfig;
use crate::models::{ScanRun, Tool, ToolOutcome};
use crate::planner::ExecutionPlan;

/// Drives every entry of an execution plan to an outcome. Adapter
/// invocations run concurrently under a bounded semaphore, but outcomes are
/// reassembled in plan order, so the run is deterministic regardless of
/// which tool finished first. One failed or skipped tool never prevents the
/// others from running.
pub struct Coordinator {
    config: Arc<AppConfig>,
    adapters: Vec<Arc<dyn ToolAdapter>>,
}

impl Coordinator {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let adapters = Tool::ALL
            .into_iter()
            .map(|tool| Arc::from(adapter_for(tool, config.clone())))
            .collect();
        Self { config, adapters }
    }

    /// Test seam: swap the real adapters for stubs.
    pub fn with_adapters(config: Arc<AppConfig>, adapters: Vec<Arc<dyn ToolAdapter>>) -> Self {
        Self { config, adapters }
    }

    fn adapter(&self, tool: Tool) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.iter().find(|a| a.tool() == tool).cloned()
    }

    /// Runs the plan against the run's target and returns the run in a
    /// terminal state. The run itself never fails: partial results are
    /// recorded and reflected in the aggregated status.
    pub async fn execute(
        &self,
        mut run: ScanRun,
        plan: ExecutionPlan,
        cancel: CancellationToken,
    ) -> ScanRun {
        let plan_tools: Vec<Tool> = plan.iter().map(|e| e.tool).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_tools));
        let target = Arc::new(run.target.clone());

        let mut set = JoinSet::new();
        for (idx, entry) in plan.into_iter().enumerate() {
            let Some(adapter) = self.adapter(entry.tool) else {
                continue;
            };
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let target = target.clone();
            set.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                if permit.is_err() || cancel.is_cancelled() {
                    return (idx, cancelled_outcome(entry.tool));
                }
                let outcome = tokio::select! {
                    out = adapter.probe(&target, &entry.options) => out,
                    () = cancel.cancelled() => cancelled_outcome(entry.tool),
                };
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<ToolOutcome>> = plan_tools.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => error!(run_id = %run.id, error = %e, "adapter task aborted"),
            }
        }

        run.outcomes = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    ToolOutcome::failed(plan_tools[idx], "adapter task aborted", String::new())
                })
            })
            .collect();
        run.status = ScanRun::aggregate_status(&run.outcomes);

        info!(
            run_id = %run.id,
            target = %run.target.raw,
            outcomes = run.outcomes.len(),
            findings = run.finding_count(),
            status = %run.status,
            "scan run finished"
        );
        run
    }
}

fn cancelled_outcome(tool: Tool) -> ToolOutcome {
    ToolOutcome::failed(tool, "cancelled by operator", String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutcomeStatus, RunStatus, Severity, Target, TargetKind};
    use crate::planner::{PlanEntry, PortScope, ToolOptions};
    use chrono::Utc;
    use std::time::Duration;

    struct StubAdapter {
        tool: Tool,
        delay: Duration,
        status: OutcomeStatus,
    }

    #[async_trait::async_trait]
    impl ToolAdapter for StubAdapter {
        fn tool(&self) -> Tool {
            self.tool
        }

        async fn probe(&self, _target: &Target, _options: &ToolOptions) -> ToolOutcome {
            tokio::time::sleep(self.delay).await;
            let now = Utc::now();
            ToolOutcome {
                tool: self.tool,
                status: self.status,
                findings: vec![crate::models::Finding {
                    tool: self.tool,
                    severity: Severity::Low,
                    title: format!("stub finding from {}", self.tool),
                    description: String::new(),
                    evidence: None,
                    port: None,
                    service: None,
                }],
                raw_log: String::new(),
                started_at: now,
                finished_at: now,
                error_detail: None,
            }
        }
    }

    fn entry(tool: Tool) -> PlanEntry {
        PlanEntry {
            tool,
            options: ToolOptions {
                timeout: Duration::from_secs(5),
                port_scope: PortScope::Top(100),
                service_detection: false,
                vuln_scripts: false,
                active: false,
            },
        }
    }

    fn run() -> ScanRun {
        ScanRun::new(
            Target {
                raw: "https://example.com".to_string(),
                kind: TargetKind::Url,
            },
            crate::models::ScanMode::Deep,
            vec![Tool::Nmap, Tool::Zap, Tool::Arachni],
        )
    }

    fn coordinator(adapters: Vec<Arc<dyn ToolAdapter>>) -> Coordinator {
        Coordinator::with_adapters(Arc::new(AppConfig::default()), adapters)
    }

    #[tokio::test]
    async fn outcomes_follow_plan_order_not_completion_order() {
        // nmap is the slowest by far; it must still come back first.
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(StubAdapter {
                tool: Tool::Nmap,
                delay: Duration::from_millis(150),
                status: OutcomeStatus::Ok,
            }),
            Arc::new(StubAdapter {
                tool: Tool::Zap,
                delay: Duration::from_millis(10),
                status: OutcomeStatus::Ok,
            }),
            Arc::new(StubAdapter {
                tool: Tool::Arachni,
                delay: Duration::ZERO,
                status: OutcomeStatus::Ok,
            }),
        ];
        let coord = coordinator(adapters);
        let plan = vec![entry(Tool::Nmap), entry(Tool::Zap), entry(Tool::Arachni)];
        let done = coord.execute(run(), plan, CancellationToken::new()).await;

        let order: Vec<Tool> = done.outcomes.iter().map(|o| o.tool).collect();
        assert_eq!(order, vec![Tool::Nmap, Tool::Zap, Tool::Arachni]);
        assert_eq!(done.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_siblings() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(StubAdapter {
                tool: Tool::Nmap,
                delay: Duration::ZERO,
                status: OutcomeStatus::Failed,
            }),
            Arc::new(StubAdapter {
                tool: Tool::Zap,
                delay: Duration::from_millis(20),
                status: OutcomeStatus::Ok,
            }),
        ];
        let coord = coordinator(adapters);
        let plan = vec![entry(Tool::Nmap), entry(Tool::Zap)];
        let done = coord.execute(run(), plan, CancellationToken::new()).await;

        assert_eq!(done.outcomes.len(), 2);
        assert_eq!(done.outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(done.outcomes[1].status, OutcomeStatus::Ok);
        assert_eq!(done.status, RunStatus::CompletedWithErrors);
    }

    #[tokio::test]
    async fn empty_plan_completes_with_zero_outcomes() {
        let coord = coordinator(vec![]);
        let done = coord.execute(run(), vec![], CancellationToken::new()).await;
        assert!(done.outcomes.is_empty());
        assert_eq!(done.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_converts_inflight_work_to_failed_outcomes() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(StubAdapter {
                tool: Tool::Nmap,
                delay: Duration::from_millis(5),
                status: OutcomeStatus::Ok,
            }),
            Arc::new(StubAdapter {
                tool: Tool::Zap,
                delay: Duration::from_secs(30),
                status: OutcomeStatus::Ok,
            }),
        ];
        let coord = coordinator(adapters);
        let plan = vec![entry(Tool::Nmap), entry(Tool::Zap)];
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            canceller.cancel();
        });

        let done = coord.execute(run(), plan, cancel).await;
        assert_eq!(done.outcomes.len(), 2);
        assert_eq!(done.outcomes[0].status, OutcomeStatus::Ok);
        assert_eq!(done.outcomes[1].status, OutcomeStatus::Failed);
        assert!(done.outcomes[1]
            .error_detail
            .as_deref()
            .unwrap_or("")
            .contains("cancelled"));
        assert_eq!(done.status, RunStatus::CompletedWithErrors);
    }
}
