use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::classifier::classify;
use crate::config::AppConfig;
use crate::coordinator::Coordinator;
use crate::errors::Result;
use crate::models::{RunSummary, ScanMode, ScanRun, Tool};
use crate::planner::plan;
use crate::report;
use crate::store::Store;

/// Boundary facade consumed by external collaborators (CLI today, a web
/// layer tomorrow). Owns the store and the coordinator; enforces the
/// single-writer-per-run discipline by being the only component that
/// persists a run after submission.
pub struct ScanService {
    config: Arc<AppConfig>,
    store: Store,
    coordinator: Arc<Coordinator>,
    active: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl ScanService {
    pub async fn new(config: Arc<AppConfig>) -> Result<Self> {
        let store = Store::connect(&config.database_url).await?;
        store.run_migrations().await?;
        let coordinator = Arc::new(Coordinator::new(config.clone()));
        Ok(Self {
            config,
            store,
            coordinator,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Validates and submits a scan. Returns the run id immediately; the
    /// scan proceeds on a background task and re-persists the run when it
    /// reaches a terminal status. Classification failures surface before
    /// any run is created.
    pub async fn submit_scan(
        &self,
        raw_target: &str,
        mode: ScanMode,
        selection: Vec<Tool>,
    ) -> Result<Uuid> {
        let target = classify(raw_target)?;
        let selection = normalize_selection(selection);
        let run = ScanRun::new(target, mode, selection);
        let id = run.id;
        let execution_plan = plan(mode, &run.selection, &self.config);

        self.store.save(&run).await?;
        info!(run_id = %id, target = %run.target.raw, mode = %mode, "scan submitted");

        let token = CancellationToken::new();
        self.active.lock().await.insert(id, token.clone());

        let coordinator = self.coordinator.clone();
        let store = self.store.clone();
        let active = self.active.clone();
        tokio::spawn(async move {
            let done = coordinator.execute(run, execution_plan, token).await;
            if let Err(e) = store.save(&done).await {
                error!(run_id = %id, error = %e, "failed to persist finished run");
            }
            active.lock().await.remove(&id);
        });

        Ok(id)
    }

    /// Synchronous variant used by the CLI: submits, executes and persists
    /// in the caller's task, returning the terminal run.
    pub async fn run_to_completion(
        &self,
        raw_target: &str,
        mode: ScanMode,
        selection: Vec<Tool>,
    ) -> Result<ScanRun> {
        let target = classify(raw_target)?;
        let selection = normalize_selection(selection);
        let run = ScanRun::new(target, mode, selection);
        let execution_plan = plan(mode, &run.selection, &self.config);

        self.store.save(&run).await?;
        let token = CancellationToken::new();
        self.active.lock().await.insert(run.id, token.clone());

        let done = self.coordinator.execute(run, execution_plan, token).await;
        self.store.save(&done).await?;
        self.active.lock().await.remove(&done.id);
        Ok(done)
    }

    pub async fn get_run(&self, id: Uuid) -> Result<ScanRun> {
        self.store.get(id).await
    }

    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunSummary>> {
        self.store.list_recent(limit).await
    }

    /// Requests cancellation of a running scan. In-flight tool processes
    /// are terminated; already-completed outcomes are persisted by the
    /// owning task. Returns false when the run is not currently executing.
    pub async fn cancel_run(&self, id: Uuid) -> bool {
        match self.active.lock().await.get(&id) {
            Some(token) => {
                info!(run_id = %id, "cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn report_json(&self, id: Uuid) -> Result<Vec<u8>> {
        let run = self.store.get(id).await?;
        report::to_json(&run)
    }

    pub async fn report_pdf(&self, id: Uuid) -> Result<Vec<u8>> {
        let run = self.store.get(id).await?;
        report::to_pdf(&run)
    }
}

/// Deduplicates the user's selection into the fixed nmap, zap, arachni
/// order the planner expects.
fn normalize_selection(selection: Vec<Tool>) -> Vec<Tool> {
    Tool::ALL
        .into_iter()
        .filter(|tool| selection.contains(tool))
        .collect()
}
