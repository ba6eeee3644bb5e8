use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "metadata_field")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub object_id: Uuid,
    pub name: String,
    pub ordinal_position: i32,
    pub data_type: String,
    pub is_nullable: bool,
    pub default_type: Option<String>,
    pub default_expression: Option<String>,
    /// Engine-native column comment, verbatim.
    pub comment: Option<String>,
    pub description: String,
    /// Who produced `description`: "engine", "ai", "fallback" or "user".
    pub description_source: String,
    pub ai_description: Option<String>,
    pub business_definition: Option<String>,
    pub is_primary_key: bool,
    pub is_indexed: bool,
    pub data_quality_score: Option<f64>,
    /// JSON array text.
    pub sample_values: Option<String>,
    pub metadata: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::metadata_object::Entity",
        from = "Column::ObjectId",
        to = "super::metadata_object::Column::Id",
        on_delete = "Cascade"
    )]
    MetadataObject,
    #[sea_orm(has_many = "super::field_semantics_history::Entity")]
    FieldSemanticsHistory,
}

impl Related<super::metadata_object::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetadataObject.def()
    }
}

impl Related<super::field_semantics_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FieldSemanticsHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
