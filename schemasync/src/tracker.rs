//! One `sync_job` row per pipeline run. Terminal rows are never reopened.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::entity::sync_job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Totals discovered so far and how many of each were written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub total_databases: i32,
    pub processed_databases: i32,
    pub total_tables: i32,
    pub processed_tables: i32,
    pub total_columns: i32,
    pub processed_columns: i32,
}

impl JobCounts {
    /// Share of schemas finished, 0..=99. 100 is reserved for completion.
    pub fn percentage(&self) -> i32 {
        if self.total_databases <= 0 {
            return 0;
        }
        (self.processed_databases * 100 / self.total_databases).clamp(0, 99)
    }

    fn apply(&self, job: &mut sync_job::ActiveModel) {
        job.total_databases = Set(self.total_databases);
        job.processed_databases = Set(self.processed_databases);
        job.total_tables = Set(self.total_tables);
        job.processed_tables = Set(self.processed_tables);
        job.total_columns = Set(self.total_columns);
        job.processed_columns = Set(self.processed_columns);
    }
}

/// Status, percentage and message a finished job ends with.
fn terminal_state(
    counts: &JobCounts,
    error: Option<String>,
) -> (JobStatus, i32, Option<String>) {
    match error {
        None => (JobStatus::Completed, 100, None),
        Some(message) => (JobStatus::Failed, counts.percentage(), Some(message)),
    }
}

/// Record a new job and move it to `running`.
pub async fn start<C: ConnectionTrait>(
    db: &C,
    connection_id: Uuid,
    ai_analysis_enabled: bool,
) -> Result<sync_job::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let pending = sync_job::ActiveModel {
        id: Set(Uuid::now_v7()),
        connection_id: Set(connection_id),
        status: Set(JobStatus::Pending.as_str().to_string()),
        progress_percentage: Set(0),
        total_databases: Set(0),
        processed_databases: Set(0),
        total_tables: Set(0),
        processed_tables: Set(0),
        total_columns: Set(0),
        processed_columns: Set(0),
        ai_analysis_enabled: Set(ai_analysis_enabled),
        error_message: Set(None),
        started_at: Set(None),
        completed_at: Set(None),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    let mut running: sync_job::ActiveModel = pending.into();
    running.status = Set(JobStatus::Running.as_str().to_string());
    running.started_at = Set(Some(Utc::now().naive_utc()));
    let job = running.update(db).await?;

    tracing::info!(job_id = %job.id, connection_id = %connection_id, "sync job started");
    Ok(job)
}

pub async fn progress<C: ConnectionTrait>(
    db: &C,
    job_id: Uuid,
    counts: &JobCounts,
) -> Result<(), DbErr> {
    let mut job = sync_job::ActiveModel {
        id: Set(job_id),
        ..Default::default()
    };
    counts.apply(&mut job);
    job.progress_percentage = Set(counts.percentage());
    job.update(db).await?;
    Ok(())
}

/// Move a job to its terminal state. `error: None` means success.
pub async fn finish<C: ConnectionTrait>(
    db: &C,
    job_id: Uuid,
    counts: &JobCounts,
    error: Option<String>,
) -> Result<sync_job::Model, DbErr> {
    let mut job = sync_job::ActiveModel {
        id: Set(job_id),
        ..Default::default()
    };
    counts.apply(&mut job);
    let (status, percentage, message) = terminal_state(counts, error);
    job.status = Set(status.as_str().to_string());
    job.progress_percentage = Set(percentage);
    job.error_message = Set(message);
    job.completed_at = Set(Some(Utc::now().naive_utc()));
    let job = job.update(db).await?;

    tracing::info!(job_id = %job.id, status = %job.status, "sync job finished");
    Ok(job)
}

/// The terminal form of `job` without touching the store, for when the
/// final write itself fails.
pub fn concluded(
    mut job: sync_job::Model,
    counts: &JobCounts,
    error: Option<String>,
) -> sync_job::Model {
    let (status, percentage, message) = terminal_state(counts, error);
    job.status = status.as_str().to_string();
    job.progress_percentage = percentage;
    job.error_message = message;
    job.total_databases = counts.total_databases;
    job.processed_databases = counts.processed_databases;
    job.total_tables = counts.total_tables;
    job.processed_tables = counts.processed_tables;
    job.total_columns = counts.total_columns;
    job.processed_columns = counts.processed_columns;
    job.completed_at = Some(Utc::now().naive_utc());
    job
}

pub async fn get<C: ConnectionTrait>(db: &C, job_id: Uuid) -> Result<Option<sync_job::Model>, DbErr> {
    sync_job::Entity::find_by_id(job_id).one(db).await
}

/// Jobs for a connection, newest first.
pub async fn list_for_connection<C: ConnectionTrait>(
    db: &C,
    connection_id: Uuid,
) -> Result<Vec<sync_job::Model>, DbErr> {
    sync_job::Entity::find()
        .filter(sync_job::Column::ConnectionId.eq(connection_id))
        .order_by_desc(sync_job::Column::CreatedAt)
        .order_by_desc(sync_job::Column::Id)
        .all(db)
        .await
}
