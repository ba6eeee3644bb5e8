//! One sync run: connection → introspection → annotation → store → job record.
//!
//! Everything inside a run is sequential. Runs for different connections may
//! overlap; runs for the same connection are rejected by [`SyncLocks`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::annotate::gemini::GeminiClient;
use crate::annotate::{AnnotationStats, ColumnContext, SemanticAnnotator, TextGenerator};
use crate::config::Settings;
use crate::connection::ResolvedConnection;
use crate::crypto::SecretBox;
use crate::entity::{connection, sync_job};
use crate::introspect::gateway::{HttpGateway, QueryGateway};
use crate::introspect::{self, IntrospectionError};
use crate::store;
use crate::tracker::{self, JobCounts};

// ---------- errors ----------

#[derive(Debug)]
pub enum SyncError {
    ConnectionNotFound(Uuid),
    ConnectionInactive(Uuid),
    /// `job_id` is `None` while the other run is still creating its job.
    AlreadyRunning { job_id: Option<Uuid> },
    Configuration(String),
    UnsupportedDataSourceKind(String),
    IntrospectionFailed { target: String, message: String },
    StoreWriteFailed(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::ConnectionNotFound(id) => write!(f, "Connection not found: {id}"),
            SyncError::ConnectionInactive(id) => write!(f, "Connection is inactive: {id}"),
            SyncError::AlreadyRunning { job_id: Some(job_id) } => {
                write!(f, "Sync already in progress (job_id: {job_id})")
            }
            SyncError::AlreadyRunning { job_id: None } => write!(f, "Sync already in progress"),
            SyncError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            SyncError::UnsupportedDataSourceKind(kind) => {
                write!(f, "Unsupported data source kind: {kind}")
            }
            SyncError::IntrospectionFailed { target, message } => {
                write!(f, "Introspection of {target} failed: {message}")
            }
            SyncError::StoreWriteFailed(msg) => write!(f, "Store write failed: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<DbErr> for SyncError {
    fn from(e: DbErr) -> Self {
        SyncError::StoreWriteFailed(e.to_string())
    }
}

impl From<IntrospectionError> for SyncError {
    fn from(e: IntrospectionError) -> Self {
        match e {
            IntrospectionError::UnsupportedDataSourceKind(kind) => {
                SyncError::UnsupportedDataSourceKind(kind)
            }
            IntrospectionError::IntrospectionFailed { target, message } => {
                SyncError::IntrospectionFailed { target, message }
            }
        }
    }
}

// ---------- per-connection guard ----------

/// In-process registry of connections with a sync in flight.
#[derive(Clone, Default)]
pub struct SyncLocks {
    active: Arc<DashMap<Uuid, Option<Uuid>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Err carries the running job's id, if it has one yet.
    pub fn try_acquire(&self, connection_id: Uuid) -> Result<SyncGuard, Option<Uuid>> {
        match self.active.entry(connection_id) {
            Entry::Occupied(running) => Err(*running.get()),
            Entry::Vacant(slot) => {
                slot.insert(None);
                Ok(SyncGuard {
                    active: self.active.clone(),
                    connection_id,
                })
            }
        }
    }
}

/// Released on drop, whichever way the run ends.
pub struct SyncGuard {
    active: Arc<DashMap<Uuid, Option<Uuid>>>,
    connection_id: Uuid,
}

impl SyncGuard {
    fn set_job(&self, job_id: Uuid) {
        if let Some(mut slot) = self.active.get_mut(&self.connection_id) {
            *slot = Some(job_id);
        }
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.active.remove(&self.connection_id);
    }
}

// ---------- run inputs ----------

/// External clients for one run. Built fresh per run and dropped with it.
pub struct SyncServices {
    pub gateway: Arc<dyn QueryGateway>,
    /// `None` when no annotation credentials are configured.
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub annotation_delay: Duration,
}

impl SyncServices {
    pub fn from_settings(settings: &Settings) -> Result<Self, SyncError> {
        let gateway = HttpGateway::new(&settings.gateway)
            .map_err(|e| SyncError::Configuration(e.to_string()))?;
        let generator = GeminiClient::from_settings(&settings.annotation)
            .map_err(|e| SyncError::Configuration(e.to_string()))?
            .map(|g| Arc::new(g) as Arc<dyn TextGenerator>);
        Ok(Self {
            gateway: Arc::new(gateway),
            generator,
            annotation_delay: settings.annotation.delay,
        })
    }
}

/// Allow-lists for schemas and objects. Empty means everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    pub schemas: Vec<String>,
    pub tables: Vec<String>,
}

impl TargetFilter {
    pub fn allows_schema(&self, name: &str) -> bool {
        self.schemas.is_empty() || self.schemas.iter().any(|s| s == name)
    }

    pub fn allows_table(&self, name: &str) -> bool {
        self.tables.is_empty() || self.tables.iter().any(|t| t == name)
    }
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub connection_id: Uuid,
    pub ai_analysis_enabled: bool,
    pub targets: TargetFilter,
}

/// Outcome of a run that got as far as creating its job. A run that failed
/// midway still yields a report; `error` says why.
#[derive(Debug)]
pub struct SyncReport {
    pub job: sync_job::Model,
    pub counts: JobCounts,
    pub annotation: AnnotationStats,
    pub error: Option<SyncError>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ---------- orchestration ----------

/// Run one sync. `Err` means the run was refused or its job could not be
/// recorded; anything that goes wrong after that is in the report.
pub async fn run_sync(
    db: &DatabaseConnection,
    secrets: &SecretBox,
    locks: &SyncLocks,
    services: SyncServices,
    request: SyncRequest,
) -> Result<SyncReport, SyncError> {
    let connection_id = request.connection_id;
    let model = connection::Entity::find_by_id(connection_id)
        .one(db)
        .await?
        .ok_or(SyncError::ConnectionNotFound(connection_id))?;
    if !model.is_active {
        return Err(SyncError::ConnectionInactive(connection_id));
    }

    let guard = locks
        .try_acquire(connection_id)
        .map_err(|job_id| SyncError::AlreadyRunning { job_id })?;

    let job = tracker::start(db, connection_id, request.ai_analysis_enabled).await?;
    guard.set_job(job.id);

    let generator = if request.ai_analysis_enabled {
        if services.generator.is_none() {
            tracing::warn!(
                job_id = %job.id,
                "annotation requested but no credentials configured, using placeholders"
            );
        }
        services.generator.clone()
    } else {
        None
    };
    let mut annotator = SemanticAnnotator::new(db.clone(), generator, services.annotation_delay);

    let mut counts = JobCounts::default();
    let outcome = walk(
        db,
        secrets,
        &model,
        job.id,
        services.gateway.clone(),
        &mut annotator,
        &request.targets,
        &mut counts,
    )
    .await;

    let error_message = outcome.as_ref().err().map(ToString::to_string);
    if let Some(ref message) = error_message {
        tracing::error!(job_id = %job.id, connection_id = %connection_id, error = %message, "sync failed");
    }
    let job = record_finish(db, job, &counts, error_message).await;

    if outcome.is_ok() {
        let mut stamp: connection::ActiveModel = model.into();
        stamp.last_sync_at = Set(Some(Utc::now().naive_utc()));
        stamp.update(db).await?;
        tracing::info!(
            job_id = %job.id,
            databases = counts.processed_databases,
            tables = counts.processed_tables,
            columns = counts.processed_columns,
            "sync completed"
        );
    }

    drop(guard);
    Ok(SyncReport {
        job,
        counts,
        annotation: annotator.stats(),
        error: outcome.err(),
    })
}

/// Write the job's terminal state, retrying once. If the store stays
/// unavailable the report carries the terminal state built in memory so the
/// run's outcome is not lost.
async fn record_finish(
    db: &DatabaseConnection,
    job: sync_job::Model,
    counts: &JobCounts,
    error: Option<String>,
) -> sync_job::Model {
    for attempt in 1..=2 {
        match tracker::finish(db, job.id, counts, error.clone()).await {
            Ok(done) => return done,
            Err(e) => tracing::error!(
                job_id = %job.id,
                attempt,
                error = %e,
                "could not record sync job completion"
            ),
        }
    }
    tracker::concluded(job, counts, error)
}

#[allow(clippy::too_many_arguments)]
async fn walk(
    db: &DatabaseConnection,
    secrets: &SecretBox,
    model: &connection::Model,
    job_id: Uuid,
    gateway: Arc<dyn QueryGateway>,
    annotator: &mut SemanticAnnotator,
    targets: &TargetFilter,
    counts: &mut JobCounts,
) -> Result<(), SyncError> {
    let resolved = ResolvedConnection::resolve(model, secrets)
        .map_err(|e| SyncError::Configuration(e.to_string()))?;
    let introspector = introspect::create_introspector(&resolved, gateway)?;

    let schemas: Vec<String> = introspector
        .list_schemas()
        .await?
        .into_iter()
        .filter(|s| targets.allows_schema(s))
        .collect();
    counts.total_databases = schemas.len() as i32;
    tracker::progress(db, job_id, counts).await?;

    for schema in &schemas {
        tracing::info!(job_id = %job_id, schema = %schema, "syncing schema");
        let scope = introspector.annotation_scope(resolved.database(), schema);
        let schema_id = store::upsert_schema(
            db,
            model.id,
            schema,
            introspector.schema_type(),
            &serde_json::json!({}),
        )
        .await?;

        let objects: Vec<_> = introspector
            .list_objects(schema)
            .await?
            .into_iter()
            .filter(|o| targets.allows_table(&o.name))
            .collect();
        counts.total_tables += objects.len() as i32;

        for object in &objects {
            let object_id = store::upsert_object(db, schema_id, object).await?;
            let fields = introspector.describe_object(schema, &object.name).await?;
            counts.total_columns += fields.len() as i32;

            let ctx = ColumnContext {
                connection_id: model.id,
                database: scope.0,
                schema: scope.1,
                table: &object.name,
            };
            for field in &fields {
                let semantics = annotator.resolve(&ctx, field).await?;
                store::upsert_field(db, object_id, field, &semantics).await?;
                counts.processed_columns += 1;
            }
            counts.processed_tables += 1;
        }

        counts.processed_databases += 1;
        tracker::progress(db, job_id, counts).await?;
    }

    Ok(())
}

/// Sync every active connection, one after another. A failure of one
/// connection does not stop the others.
pub async fn run_all<F>(
    db: &DatabaseConnection,
    secrets: &SecretBox,
    locks: &SyncLocks,
    mut services: F,
    ai_analysis_enabled: bool,
    targets: &TargetFilter,
) -> Result<Vec<(Uuid, Result<SyncReport, SyncError>)>, SyncError>
where
    F: FnMut() -> Result<SyncServices, SyncError>,
{
    use sea_orm::{ColumnTrait, QueryFilter, QueryOrder};

    let connections = connection::Entity::find()
        .filter(connection::Column::IsActive.eq(true))
        .order_by_asc(connection::Column::CreatedAt)
        .all(db)
        .await?;

    let mut results = Vec::with_capacity(connections.len());
    for conn in connections {
        let result = match services() {
            Ok(services) => {
                run_sync(
                    db,
                    secrets,
                    locks,
                    services,
                    SyncRequest {
                        connection_id: conn.id,
                        ai_analysis_enabled,
                        targets: targets.clone(),
                    },
                )
                .await
            }
            Err(e) => Err(e),
        };
        results.push((conn.id, result));
    }
    Ok(results)
}
