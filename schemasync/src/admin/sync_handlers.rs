use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::pipeline::{self, SyncError, SyncRequest, SyncServices, TargetFilter};
use crate::tracker;

use super::{
    AppState, ApiErr,
    connection_handlers::find_connection,
    dto::{JobResponse, MetadataSummary, SyncRequestBody, SyncResponse},
    jwt::AuthClaims,
};

impl From<SyncError> for ApiErr {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::ConnectionNotFound(_) => ApiErr::not_found("Connection not found"),
            SyncError::ConnectionInactive(_) => ApiErr::unprocessable("Connection is inactive"),
            SyncError::AlreadyRunning { job_id } => {
                let err = ApiErr::conflict("Sync already in progress for this connection");
                match job_id {
                    Some(job_id) => err.with_details(format!("job_id: {job_id}")),
                    None => err,
                }
            }
            other => ApiErr::internal(other),
        }
    }
}

// ---------- POST /connections/{id}/sync ----------

/// Runs the sync to completion before responding.
pub async fn trigger_sync(
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<SyncRequestBody>>,
) -> Result<Json<SyncResponse>, ApiErr> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let services = SyncServices::from_settings(&state.settings)?;

    tracing::info!(connection_id = %id, requested_by = %claims.sub, "sync requested");
    let report = pipeline::run_sync(
        &state.db,
        &state.secrets,
        &state.locks,
        services,
        SyncRequest {
            connection_id: id,
            ai_analysis_enabled: body.ai_analysis_enabled,
            targets: TargetFilter {
                schemas: body.target_schemas,
                tables: body.target_tables,
            },
        },
    )
    .await?;

    if let Some(error) = &report.error {
        let details = report
            .job
            .error_message
            .clone()
            .unwrap_or_else(|| error.to_string());
        return Err(ApiErr::new(StatusCode::BAD_GATEWAY, "Sync failed").with_details(details));
    }

    Ok(Json(SyncResponse {
        success: true,
        job_id: report.job.id,
        metadata_summary: MetadataSummary {
            databases: report.counts.processed_databases,
            tables: report.counts.processed_tables,
            columns: report.counts.processed_columns,
        },
    }))
}

// ---------- GET /connections/{id}/jobs ----------

pub async fn list_jobs(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<JobResponse>>, ApiErr> {
    find_connection(&state, id).await?;
    let jobs = tracker::list_for_connection(&state.db, id)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

// ---------- GET /jobs/{job_id} ----------

pub async fn get_job(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiErr> {
    let job = tracker::get(&state.db, job_id)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Job not found"))?;
    Ok(Json(job.into()))
}
