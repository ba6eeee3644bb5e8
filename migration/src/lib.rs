pub use sea_orm_migration::prelude::*;

mod m20260901_000001_create_connections;
mod m20260901_000002_create_metadata_tree;
mod m20260902_000003_create_field_semantics_history;
mod m20260902_000004_create_sync_jobs;
mod m20260903_000005_create_ai_analysis_cache;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260901_000001_create_connections::Migration),
            Box::new(m20260901_000002_create_metadata_tree::Migration),
            Box::new(m20260902_000003_create_field_semantics_history::Migration),
            Box::new(m20260902_000004_create_sync_jobs::Migration),
            Box::new(m20260903_000005_create_ai_analysis_cache::Migration),
        ]
    }
}
