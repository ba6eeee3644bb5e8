use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "metadata_object")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub schema_id: Uuid,
    pub name: String,
    /// "table", "view", "collection" or "endpoint"
    pub object_type: String,
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
    pub metadata: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::metadata_schema::Entity",
        from = "Column::SchemaId",
        to = "super::metadata_schema::Column::Id",
        on_delete = "Cascade"
    )]
    MetadataSchema,
    #[sea_orm(has_many = "super::metadata_field::Entity")]
    MetadataField,
}

impl Related<super::metadata_schema::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetadataSchema.def()
    }
}

impl Related<super::metadata_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetadataField.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
