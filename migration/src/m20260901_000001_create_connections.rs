use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Connection::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Connection::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Connection::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Connection::Name).string().not_null())
                    .col(ColumnDef::new(Connection::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Connection::Config)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Connection::SecureConfig)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Connection::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Connection::CreatedBy).uuid().null())
                    .col(ColumnDef::new(Connection::LastSyncAt).timestamp().null())
                    .col(
                        ColumnDef::new(Connection::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Connection::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_connection_org_name")
                    .table(Connection::Table)
                    .col(Connection::OrganizationId)
                    .col(Connection::Name)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Connection::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Connection {
    Table,
    Id,
    OrganizationId,
    Name,
    Kind,
    Config,
    SecureConfig,
    IsActive,
    CreatedBy,
    LastSyncAt,
    CreatedAt,
    UpdatedAt,
}
