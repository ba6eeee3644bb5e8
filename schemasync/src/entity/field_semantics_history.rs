use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Append-only. Each row holds the values a field's descriptive columns were
/// set to, tagged with who set them.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "field_semantics_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub field_id: Uuid,
    pub description: String,
    pub ai_description: Option<String>,
    pub business_definition: Option<String>,
    pub source: String,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::metadata_field::Entity",
        from = "Column::FieldId",
        to = "super::metadata_field::Column::Id",
        on_delete = "Cascade"
    )]
    MetadataField,
}

impl Related<super::metadata_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetadataField.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
