pub mod ai_analysis_cache;
pub mod connection;
pub mod field_semantics_history;
pub mod metadata_field;
pub mod metadata_object;
pub mod metadata_schema;
pub mod sync_job;
