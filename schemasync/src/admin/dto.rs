use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{field_semantics_history, sync_job};

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

// ---------- connection requests ----------

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    pub organization_id: Uuid,
    pub name: String,
    pub kind: String,
    /// Flat config object containing all fields (secret and non-secret).
    /// Backend splits them into config/secure_config using the type registry.
    pub config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConnectionRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    /// Flat config update: absent fields are preserved, empty-string secret fields kept as-is.
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListConnectionsQuery {
    pub organization_id: Option<Uuid>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

// ---------- connection responses ----------

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub kind: String,
    /// Non-secret config only (password/secrets are never returned).
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub last_sync_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------- sync ----------

#[derive(Debug, Deserialize, Default)]
pub struct SyncRequestBody {
    #[serde(default)]
    pub ai_analysis_enabled: bool,
    #[serde(default)]
    pub target_schemas: Vec<String>,
    #[serde(default)]
    pub target_tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MetadataSummary {
    pub databases: i32,
    pub tables: i32,
    pub columns: i32,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub metadata_summary: MetadataSummary,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub status: String,
    pub progress_percentage: i32,
    pub total_databases: i32,
    pub processed_databases: i32,
    pub total_tables: i32,
    pub processed_tables: i32,
    pub total_columns: i32,
    pub processed_columns: i32,
    pub ai_analysis_enabled: bool,
    pub error_message: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<sync_job::Model> for JobResponse {
    fn from(m: sync_job::Model) -> Self {
        Self {
            id: m.id,
            connection_id: m.connection_id,
            status: m.status,
            progress_percentage: m.progress_percentage,
            total_databases: m.total_databases,
            processed_databases: m.processed_databases,
            total_tables: m.total_tables,
            processed_tables: m.processed_tables,
            total_columns: m.total_columns,
            processed_columns: m.processed_columns,
            ai_analysis_enabled: m.ai_analysis_enabled,
            error_message: m.error_message,
            started_at: m.started_at,
            completed_at: m.completed_at,
            created_at: m.created_at,
        }
    }
}

// ---------- semantics ----------

#[derive(Debug, Deserialize)]
pub struct UpdateSemanticsRequest {
    pub description: Option<String>,
    /// Empty string clears the definition.
    pub business_definition: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryResponse {
    pub id: Uuid,
    pub field_id: Uuid,
    pub description: String,
    pub ai_description: Option<String>,
    pub business_definition: Option<String>,
    pub source: String,
    pub updated_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

impl From<field_semantics_history::Model> for HistoryEntryResponse {
    fn from(m: field_semantics_history::Model) -> Self {
        Self {
            id: m.id,
            field_id: m.field_id,
            description: m.description,
            ai_description: m.ai_description,
            business_definition: m.business_definition,
            source: m.source,
            updated_by: m.updated_by,
            created_at: m.created_at,
        }
    }
}
