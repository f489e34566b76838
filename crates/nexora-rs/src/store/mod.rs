use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{EngineError, Result};
use crate::models::{
    Finding, OutcomeStatus, RunStatus, RunSummary, ScanMode, ScanRun, Severity, Target, Tool,
    ToolOutcome,
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// The sole long-lived owner of scan runs. Writes are scoped to one run id
/// (single writer per run), so no cross-run locking is needed. Outcome and
/// finding ordering is preserved through explicit position columns.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // In-memory databases are per-connection; keep the pool at one so
        // every query sees the same database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Idempotent on run id: re-saving replaces the stored run and all of
    /// its outcomes and findings in one transaction.
    pub async fn save(&self, run: &ScanRun) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM scan_runs WHERE id = ?")
            .bind(run.id.to_string())
            .execute(&mut *tx)
            .await?;

        let selection = run
            .selection
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        sqlx::query(
            "INSERT INTO scan_runs (id, target, target_kind, mode, selection, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.id.to_string())
        .bind(&run.target.raw)
        .bind(run.target.kind.to_string())
        .bind(run.mode.to_string())
        .bind(selection)
        .bind(run.status.to_string())
        .bind(run.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, outcome) in run.outcomes.iter().enumerate() {
            let outcome_id: i64 = sqlx::query(
                "INSERT INTO tool_outcomes
                 (run_id, position, tool, status, raw_log, error_detail, started_at, finished_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(run.id.to_string())
            .bind(position as i64)
            .bind(outcome.tool.to_string())
            .bind(outcome.status.to_string())
            .bind(&outcome.raw_log)
            .bind(&outcome.error_detail)
            .bind(outcome.started_at.to_rfc3339())
            .bind(outcome.finished_at.to_rfc3339())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            for (fpos, finding) in outcome.findings.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO findings
                     (outcome_id, position, tool, severity, title, description, evidence, port, service)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(outcome_id)
                .bind(fpos as i64)
                .bind(finding.tool.to_string())
                .bind(finding.severity.to_string())
                .bind(&finding.title)
                .bind(&finding.description)
                .bind(&finding.evidence)
                .bind(finding.port.map(i64::from))
                .bind(&finding.service)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<ScanRun> {
        let row = sqlx::query(
            "SELECT target, target_kind, mode, selection, status, created_at
             FROM scan_runs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(EngineError::RunNotFound(id))?;

        let target = Target {
            raw: row.get::<String, _>("target"),
            kind: parse_enum(&row.get::<String, _>("target_kind"))?,
        };
        let mode: ScanMode = parse_enum(&row.get::<String, _>("mode"))?;
        let status: RunStatus = parse_enum(&row.get::<String, _>("status"))?;
        let created_at = parse_timestamp(&row.get::<String, _>("created_at"))?;
        let selection = row
            .get::<String, _>("selection")
            .split(',')
            .filter(|s| !s.is_empty())
            .map(parse_enum::<Tool>)
            .collect::<Result<Vec<_>>>()?;

        let outcome_rows = sqlx::query(
            "SELECT id, tool, status, raw_log, error_detail, started_at, finished_at
             FROM tool_outcomes WHERE run_id = ? ORDER BY position",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut outcomes = Vec::with_capacity(outcome_rows.len());
        for orow in outcome_rows {
            let outcome_id: i64 = orow.get("id");
            let finding_rows = sqlx::query(
                "SELECT tool, severity, title, description, evidence, port, service
                 FROM findings WHERE outcome_id = ? ORDER BY position",
            )
            .bind(outcome_id)
            .fetch_all(&self.pool)
            .await?;

            let mut findings = Vec::with_capacity(finding_rows.len());
            for frow in finding_rows {
                findings.push(Finding {
                    tool: parse_enum(&frow.get::<String, _>("tool"))?,
                    severity: parse_enum::<Severity>(&frow.get::<String, _>("severity"))?,
                    title: frow.get("title"),
                    description: frow.get("description"),
                    evidence: frow.get("evidence"),
                    port: frow.get::<Option<i64>, _>("port").map(|p| p as u16),
                    service: frow.get("service"),
                });
            }

            outcomes.push(ToolOutcome {
                tool: parse_enum(&orow.get::<String, _>("tool"))?,
                status: parse_enum::<OutcomeStatus>(&orow.get::<String, _>("status"))?,
                findings,
                raw_log: orow.get("raw_log"),
                error_detail: orow.get("error_detail"),
                started_at: parse_timestamp(&orow.get::<String, _>("started_at"))?,
                finished_at: parse_timestamp(&orow.get::<String, _>("finished_at"))?,
            });
        }

        Ok(ScanRun {
            id,
            target,
            mode,
            selection,
            outcomes,
            created_at,
            status,
        })
    }

    pub async fn list_recent(&self, limit: u32) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            "SELECT id, target, target_kind, mode, status, created_at
             FROM scan_runs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let id_text: String = row.get("id");
            summaries.push(RunSummary {
                id: Uuid::parse_str(&id_text)
                    .map_err(|e| EngineError::Corrupt(format!("bad run id {id_text}: {e}")))?,
                target: row.get("target"),
                target_kind: parse_enum(&row.get::<String, _>("target_kind"))?,
                mode: parse_enum(&row.get::<String, _>("mode"))?,
                status: parse_enum(&row.get::<String, _>("status"))?,
                created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            });
        }
        Ok(summaries)
    }
}

fn parse_enum<T: std::str::FromStr>(text: &str) -> Result<T> {
    text.parse()
        .map_err(|_| EngineError::Corrupt(format!("unknown enum value '{text}' in store")))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| EngineError::Corrupt(format!("bad timestamp '{text}': {e}")))
}
