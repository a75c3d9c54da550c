use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::workflow::{EngineEvent, WorkflowHandle, WorkflowId, WorkflowKind, WorkflowPhase, WorkflowStatus};

/// How long an event for a never-recorded workflow is kept, in millis
const PARKED_EVENT_TTL_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Default)]
pub struct WorkflowFilters {
    pub namespace: Option<String>,
    pub kind: Option<WorkflowKind>,
    pub phase: Option<WorkflowPhase>,
}

/// Last-known status of every dispatched workflow.
#[derive(Clone)]
pub struct WorkflowLedger {
    pool: SqlitePool,
}

impl WorkflowLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record a freshly accepted workflow in the `pending` phase.
    ///
    /// An event the engine sent before this call is applied on the spot.
    pub async fn record(&self, handle: &WorkflowHandle) -> Result<()> {
        let id = handle.workflow_id.to_string();
        let submitted_at = handle.submitted_at.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workflows (id, kind, target_namespace, phase, submitted_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&id)
        .bind(handle.kind)
        .bind(&handle.target_namespace)
        .bind(WorkflowPhase::Pending)
        .bind(submitted_at)
        .bind(submitted_at)
        .execute(&mut *tx)
        .await?;

        let parked = sqlx::query_as::<_, (WorkflowPhase, Option<String>, i64)>(
            "SELECT phase, message, updated_at FROM parked_events WHERE id = ?",
        )
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((phase, message, updated_at)) = parked {
            sqlx::query(
                "UPDATE workflows
                 SET phase = ?, message = ?, updated_at = ?
                 WHERE id = ? AND phase NOT IN ('succeeded', 'failed')",
            )
            .bind(phase)
            .bind(message)
            .bind(updated_at)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM parked_events WHERE id = ?")
                .bind(&id)
                .execute(&mut *tx)
                .await?;

            debug!(workflow_id = %handle.workflow_id, ?phase, "Applied early engine event");
        }

        let cutoff = Utc::now().timestamp_millis() - PARKED_EVENT_TTL_MS;
        sqlx::query("DELETE FROM parked_events WHERE received_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, workflow_id: WorkflowId) -> Result<WorkflowStatus> {
        self.find(workflow_id)
            .await?
            .ok_or(OrchestratorError::WorkflowNotFound(workflow_id))
    }

    pub async fn find(&self, workflow_id: WorkflowId) -> Result<Option<WorkflowStatus>> {
        let row = sqlx::query_as::<_, WorkflowRow>("SELECT * FROM workflows WHERE id = ?")
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(WorkflowStatus::try_from).transpose()
    }

    /// List workflows, newest first
    pub async fn list(&self, filters: WorkflowFilters) -> Result<Vec<WorkflowStatus>> {
        let mut query = "SELECT * FROM workflows WHERE 1=1".to_string();

        if filters.namespace.is_some() {
            query.push_str(" AND target_namespace = ?");
        }
        if filters.kind.is_some() {
            query.push_str(" AND kind = ?");
        }
        if filters.phase.is_some() {
            query.push_str(" AND phase = ?");
        }

        query.push_str(" ORDER BY submitted_at DESC, rowid DESC");

        let mut q = sqlx::query_as::<_, WorkflowRow>(&query);

        if let Some(namespace) = &filters.namespace {
            q = q.bind(namespace);
        }
        if let Some(kind) = filters.kind {
            q = q.bind(kind);
        }
        if let Some(phase) = filters.phase {
            q = q.bind(phase);
        }

        let rows = q.fetch_all(&self.pool).await?;

        rows.into_iter().map(WorkflowStatus::try_from).collect()
    }

    /// Apply an engine event. Returns whether the stored status changed.
    ///
    /// A terminal phase is never replaced. Events for workflows not yet
    /// recorded are parked until [`record`](Self::record) applies them.
    pub async fn update_phase(&self, event: &EngineEvent) -> Result<bool> {
        let id = event.workflow_id.to_string();
        let message = (!event.message.is_empty()).then_some(event.message.as_str());
        let updated_at = event.timestamp.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE workflows
             SET phase = ?, message = ?, updated_at = ?
             WHERE id = ? AND phase NOT IN ('succeeded', 'failed')",
        )
        .bind(event.phase)
        .bind(message)
        .bind(updated_at)
        .bind(&id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            tx.commit().await?;
            return Ok(true);
        }

        let current = sqlx::query_as::<_, (WorkflowPhase,)>("SELECT phase FROM workflows WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await?;

        match current {
            Some((current,)) => debug!(
                workflow_id = %event.workflow_id,
                ?current,
                incoming = ?event.phase,
                "Ignoring event for finished workflow"
            ),
            None => {
                sqlx::query(
                    "INSERT INTO parked_events (id, phase, message, updated_at, received_at)
                     VALUES (?, ?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE
                     SET phase = excluded.phase, message = excluded.message, updated_at = excluded.updated_at
                     WHERE parked_events.phase NOT IN ('succeeded', 'failed')",
                )
                .bind(&id)
                .bind(event.phase)
                .bind(message)
                .bind(updated_at)
                .bind(Utc::now().timestamp_millis())
                .execute(&mut *tx)
                .await?;

                debug!(
                    workflow_id = %event.workflow_id,
                    phase = ?event.phase,
                    "Parking event for unrecorded workflow"
                );
            }
        }

        tx.commit().await?;
        Ok(false)
    }

    pub async fn latest_for_namespace(&self, namespace: &str) -> Result<Option<WorkflowStatus>> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            "SELECT * FROM workflows WHERE target_namespace = ?
             ORDER BY submitted_at DESC, rowid DESC LIMIT 1",
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkflowStatus::try_from).transpose()
    }

    /// The final status of a workflow, if it has already finished.
    pub async fn terminal_event(&self, workflow_id: WorkflowId) -> Result<Option<EngineEvent>> {
        Ok(self
            .find(workflow_id)
            .await?
            .filter(|status| status.phase.is_terminal())
            .map(|status| status.to_event()))
    }
}

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: String,
    kind: WorkflowKind,
    target_namespace: String,
    phase: WorkflowPhase,
    message: Option<String>,
    submitted_at: i64,
    updated_at: i64,
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| OrchestratorError::InvalidState(format!("Invalid stored timestamp {}", millis)))
}

impl TryFrom<WorkflowRow> for WorkflowStatus {
    type Error = OrchestratorError;

    fn try_from(row: WorkflowRow) -> Result<Self> {
        let workflow_id = Uuid::parse_str(&row.id).map_err(|e| {
            OrchestratorError::InvalidState(format!("Invalid stored workflow id {}: {}", row.id, e))
        })?;

        Ok(Self {
            workflow_id,
            kind: row.kind,
            target_namespace: row.target_namespace,
            phase: row.phase,
            message: row.message,
            submitted_at: from_millis(row.submitted_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}
