use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FieldSemanticsHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::FieldId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::Description)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::AiDescription)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::BusinessDefinition)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::Source)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::UpdatedBy)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FieldSemanticsHistory::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(FieldSemanticsHistory::Table, FieldSemanticsHistory::FieldId)
                            .to(MetadataField::Table, MetadataField::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_field_semantics_history_field")
                    .table(FieldSemanticsHistory::Table)
                    .col(FieldSemanticsHistory::FieldId)
                    .col(FieldSemanticsHistory::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FieldSemanticsHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MetadataField {
    Table,
    Id,
}

#[derive(Iden)]
enum FieldSemanticsHistory {
    Table,
    Id,
    FieldId,
    Description,
    AiDescription,
    BusinessDefinition,
    Source,
    UpdatedBy,
    CreatedAt,
}
