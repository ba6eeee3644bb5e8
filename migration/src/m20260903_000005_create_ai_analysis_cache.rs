use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AiAnalysisCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AiAnalysisCache::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AiAnalysisCache::ConnectionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiAnalysisCache::TableName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiAnalysisCache::ColumnName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiAnalysisCache::ColumnType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AiAnalysisCache::DatabaseName).string().null())
                    .col(ColumnDef::new(AiAnalysisCache::SchemaName).string().null())
                    .col(
                        ColumnDef::new(AiAnalysisCache::AiDefinition)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiAnalysisCache::ModelUsed)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AiAnalysisCache::ConfidenceScore)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AiAnalysisCache::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AiAnalysisCache::Table, AiAnalysisCache::ConnectionId)
                            .to(Connection::Table, Connection::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_ai_analysis_cache_signature")
                    .table(AiAnalysisCache::Table)
                    .col(AiAnalysisCache::ConnectionId)
                    .col(AiAnalysisCache::TableName)
                    .col(AiAnalysisCache::ColumnName)
                    .col(AiAnalysisCache::ColumnType)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AiAnalysisCache::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Connection {
    Table,
    Id,
}

#[derive(Iden)]
enum AiAnalysisCache {
    Table,
    Id,
    ConnectionId,
    TableName,
    ColumnName,
    ColumnType,
    DatabaseName,
    SchemaName,
    AiDefinition,
    ModelUsed,
    ConfidenceScore,
    CreatedAt,
}
