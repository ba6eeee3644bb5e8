use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncJob::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncJob::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncJob::ConnectionId).uuid().not_null())
                    .col(
                        ColumnDef::new(SyncJob::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(SyncJob::ProgressPercentage)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(counter(SyncJob::TotalDatabases))
                    .col(counter(SyncJob::ProcessedDatabases))
                    .col(counter(SyncJob::TotalTables))
                    .col(counter(SyncJob::ProcessedTables))
                    .col(counter(SyncJob::TotalColumns))
                    .col(counter(SyncJob::ProcessedColumns))
                    .col(
                        ColumnDef::new(SyncJob::AiAnalysisEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SyncJob::ErrorMessage).text().null())
                    .col(ColumnDef::new(SyncJob::StartedAt).timestamp().null())
                    .col(ColumnDef::new(SyncJob::CompletedAt).timestamp().null())
                    .col(
                        ColumnDef::new(SyncJob::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SyncJob::Table, SyncJob::ConnectionId)
                            .to(Connection::Table, Connection::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_job_connection")
                    .table(SyncJob::Table)
                    .col(SyncJob::ConnectionId)
                    .col(SyncJob::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncJob::Table).to_owned())
            .await
    }
}

fn counter(col: SyncJob) -> ColumnDef {
    ColumnDef::new(col).integer().not_null().default(0).to_owned()
}

#[derive(Iden)]
enum Connection {
    Table,
    Id,
}

#[derive(Iden, Clone, Copy)]
enum SyncJob {
    Table,
    Id,
    ConnectionId,
    Status,
    ProgressPercentage,
    TotalDatabases,
    ProcessedDatabases,
    TotalTables,
    ProcessedTables,
    TotalColumns,
    ProcessedColumns,
    AiAnalysisEnabled,
    ErrorMessage,
    StartedAt,
    CompletedAt,
    CreatedAt,
}
