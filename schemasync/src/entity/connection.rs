use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "connection")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Connection kind string as registered ("clickhouse", "mysql", ...).
    pub kind: String,
    /// JSON text: non-secret connection params (host, port, database, user, ...)
    pub config: String,
    /// AES-256-GCM encrypted base64: secret params (password, api keys, ...)
    pub secure_config: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub last_sync_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::metadata_schema::Entity")]
    MetadataSchema,
    #[sea_orm(has_many = "super::sync_job::Entity")]
    SyncJob,
}

impl Related<super::metadata_schema::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetadataSchema.def()
    }
}

impl Related<super::sync_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
