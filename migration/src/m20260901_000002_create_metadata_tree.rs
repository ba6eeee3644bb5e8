use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // metadata_schema
        manager
            .create_table(
                Table::create()
                    .table(MetadataSchema::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetadataSchema::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MetadataSchema::ConnectionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MetadataSchema::Name).string().not_null())
                    .col(
                        ColumnDef::new(MetadataSchema::SchemaType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MetadataSchema::Metadata)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MetadataSchema::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MetadataSchema::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(MetadataSchema::Table, MetadataSchema::ConnectionId)
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
                    .name("uq_metadata_schema_connection_name")
                    .table(MetadataSchema::Table)
                    .col(MetadataSchema::ConnectionId)
                    .col(MetadataSchema::Name)
                    .to_owned(),
            )
            .await?;

        // metadata_object
        manager
            .create_table(
                Table::create()
                    .table(MetadataObject::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetadataObject::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MetadataObject::SchemaId).uuid().not_null())
                    .col(ColumnDef::new(MetadataObject::Name).string().not_null())
                    .col(
                        ColumnDef::new(MetadataObject::ObjectType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MetadataObject::RowCount).big_integer().null())
                    .col(ColumnDef::new(MetadataObject::SizeBytes).big_integer().null())
                    .col(
                        ColumnDef::new(MetadataObject::Metadata)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MetadataObject::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MetadataObject::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(MetadataObject::Table, MetadataObject::SchemaId)
                            .to(MetadataSchema::Table, MetadataSchema::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_metadata_object_schema_name")
                    .table(MetadataObject::Table)
                    .col(MetadataObject::SchemaId)
                    .col(MetadataObject::Name)
                    .to_owned(),
            )
            .await?;

        // metadata_field
        manager
            .create_table(
                Table::create()
                    .table(MetadataField::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetadataField::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MetadataField::ObjectId).uuid().not_null())
                    .col(ColumnDef::new(MetadataField::Name).string().not_null())
                    .col(
                        ColumnDef::new(MetadataField::OrdinalPosition)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MetadataField::DataType).string().not_null())
                    .col(
                        ColumnDef::new(MetadataField::IsNullable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(MetadataField::DefaultType).string().null())
                    .col(ColumnDef::new(MetadataField::DefaultExpression).text().null())
                    .col(ColumnDef::new(MetadataField::Comment).text().null())
                    .col(ColumnDef::new(MetadataField::Description).text().not_null())
                    .col(
                        ColumnDef::new(MetadataField::DescriptionSource)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MetadataField::AiDescription).text().null())
                    .col(ColumnDef::new(MetadataField::BusinessDefinition).text().null())
                    .col(
                        ColumnDef::new(MetadataField::IsPrimaryKey)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MetadataField::IsIndexed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(MetadataField::DataQualityScore).double().null())
                    .col(ColumnDef::new(MetadataField::SampleValues).text().null())
                    .col(
                        ColumnDef::new(MetadataField::Metadata)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MetadataField::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MetadataField::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(MetadataField::Table, MetadataField::ObjectId)
                            .to(MetadataObject::Table, MetadataObject::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_metadata_field_object_name")
                    .table(MetadataField::Table)
                    .col(MetadataField::ObjectId)
                    .col(MetadataField::Name)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MetadataField::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MetadataObject::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MetadataSchema::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Connection {
    Table,
    Id,
}

#[derive(Iden)]
enum MetadataSchema {
    Table,
    Id,
    ConnectionId,
    Name,
    SchemaType,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum MetadataObject {
    Table,
    Id,
    SchemaId,
    Name,
    ObjectType,
    RowCount,
    SizeBytes,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum MetadataField {
    Table,
    Id,
    ObjectId,
    Name,
    OrdinalPosition,
    DataType,
    IsNullable,
    DefaultType,
    DefaultExpression,
    Comment,
    Description,
    DescriptionSource,
    AiDescription,
    BusinessDefinition,
    IsPrimaryKey,
    IsIndexed,
    DataQualityScore,
    SampleValues,
    Metadata,
    CreatedAt,
    UpdatedAt,
}
