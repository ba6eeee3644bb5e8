//! Natural-key reconciliation of the schema → object → field tree.
//!
//! Every write here is atomic on its own; a sync run is not one transaction.
//! Field writes and their history rows share a transaction so the field's
//! descriptive columns always match its newest history row.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait, sea_query::OnConflict,
};
use serde_json::Value;
use uuid::Uuid;

use crate::annotate::{ResolvedSemantics, SemanticSource};
use crate::entity::{field_semantics_history, metadata_field, metadata_object, metadata_schema};
use crate::introspect::{FieldDescriptor, ObjectDescriptor};

// ---------- UUID v5 helpers for deterministic catalog IDs ----------

/// Namespace UUID for catalog fingerprints (UUID v5).
const CATALOG_NS: Uuid = Uuid::from_bytes([
    0x3c, 0x52, 0x0e, 0x91, 0x6a, 0x4d, 0x5b, 0x17,
    0x8e, 0x2f, 0xd0, 0x6b, 0x41, 0x93, 0xa7, 0x5c,
]);

pub fn catalog_schema_uuid(connection_id: Uuid, schema_name: &str) -> Uuid {
    let key = format!("{connection_id}:{schema_name}");
    Uuid::new_v5(&CATALOG_NS, key.as_bytes())
}

pub fn catalog_object_uuid(schema_id: Uuid, object_name: &str) -> Uuid {
    let key = format!("{schema_id}:{object_name}");
    Uuid::new_v5(&CATALOG_NS, key.as_bytes())
}

pub fn catalog_field_uuid(object_id: Uuid, field_name: &str) -> Uuid {
    let key = format!("{object_id}:{field_name}");
    Uuid::new_v5(&CATALOG_NS, key.as_bytes())
}

// ---------- schema / object ----------

/// Insert or update keyed on (connection_id, name). Updates touch only the
/// type, metadata and `updated_at`.
pub async fn upsert_schema<C: ConnectionTrait>(
    db: &C,
    connection_id: Uuid,
    name: &str,
    schema_type: &str,
    metadata: &Value,
) -> Result<Uuid, DbErr> {
    let now = Utc::now().naive_utc();
    let model = metadata_schema::ActiveModel {
        id: Set(catalog_schema_uuid(connection_id, name)),
        connection_id: Set(connection_id),
        name: Set(name.to_string()),
        schema_type: Set(schema_type.to_string()),
        metadata: Set(metadata.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    metadata_schema::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                metadata_schema::Column::ConnectionId,
                metadata_schema::Column::Name,
            ])
            .update_columns([
                metadata_schema::Column::SchemaType,
                metadata_schema::Column::Metadata,
                metadata_schema::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let row = metadata_schema::Entity::find()
        .filter(metadata_schema::Column::ConnectionId.eq(connection_id))
        .filter(metadata_schema::Column::Name.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("schema {name} after upsert")))?;
    Ok(row.id)
}

/// Insert or update keyed on (schema_id, name).
pub async fn upsert_object<C: ConnectionTrait>(
    db: &C,
    schema_id: Uuid,
    object: &ObjectDescriptor,
) -> Result<Uuid, DbErr> {
    let now = Utc::now().naive_utc();
    let model = metadata_object::ActiveModel {
        id: Set(catalog_object_uuid(schema_id, &object.name)),
        schema_id: Set(schema_id),
        name: Set(object.name.clone()),
        object_type: Set(object.object_type.clone()),
        row_count: Set(object.row_count),
        size_bytes: Set(object.size_bytes),
        metadata: Set(object.extra.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    metadata_object::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                metadata_object::Column::SchemaId,
                metadata_object::Column::Name,
            ])
            .update_columns([
                metadata_object::Column::ObjectType,
                metadata_object::Column::RowCount,
                metadata_object::Column::SizeBytes,
                metadata_object::Column::Metadata,
                metadata_object::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let row = metadata_object::Entity::find()
        .filter(metadata_object::Column::SchemaId.eq(schema_id))
        .filter(metadata_object::Column::Name.eq(object.name.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("object {} after upsert", object.name)))?;
    Ok(row.id)
}

// ---------- field ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldWrite {
    pub field_id: Uuid,
    pub created: bool,
    pub history_written: bool,
}

/// Insert or update keyed on (object_id, name).
///
/// Structural columns always follow the remote engine. Descriptive columns
/// follow `semantics` unless a user set the description last; when they
/// change, one history row with the new values is appended in the same
/// transaction. `business_definition` is never touched here.
pub async fn upsert_field(
    db: &DatabaseConnection,
    object_id: Uuid,
    field: &FieldDescriptor,
    semantics: &ResolvedSemantics,
) -> Result<FieldWrite, DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let existing = metadata_field::Entity::find()
        .filter(metadata_field::Column::ObjectId.eq(object_id))
        .filter(metadata_field::Column::Name.eq(field.name.as_str()))
        .one(&txn)
        .await?;

    let write = match existing {
        None => {
            let model = metadata_field::ActiveModel {
                id: Set(catalog_field_uuid(object_id, &field.name)),
                object_id: Set(object_id),
                name: Set(field.name.clone()),
                ordinal_position: Set(field.ordinal_position),
                data_type: Set(field.data_type.clone()),
                is_nullable: Set(field.is_nullable),
                default_type: Set(field.default_type.clone()),
                default_expression: Set(field.default_expression.clone()),
                comment: Set(field.comment.clone()),
                description: Set(semantics.description.clone()),
                description_source: Set(semantics.source.as_str().to_string()),
                ai_description: Set(semantics.ai_description.clone()),
                business_definition: Set(None),
                is_primary_key: Set(field.is_primary_key),
                is_indexed: Set(field.is_indexed),
                data_quality_score: Set(None),
                sample_values: Set(None),
                metadata: Set(field.extra.to_string()),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;

            append_history(&txn, &model, semantics.source, None).await?;
            FieldWrite {
                field_id: model.id,
                created: true,
                history_written: true,
            }
        }
        Some(current) => {
            let structural_changed = current.ordinal_position != field.ordinal_position
                || current.data_type != field.data_type
                || current.is_nullable != field.is_nullable
                || current.default_type != field.default_type
                || current.default_expression != field.default_expression
                || current.comment != field.comment
                || current.is_primary_key != field.is_primary_key
                || current.is_indexed != field.is_indexed
                || current.metadata != field.extra.to_string();

            let user_owned = current.description_source == SemanticSource::User.as_str();
            let semantics_changed = !user_owned
                && (current.description != semantics.description
                    || current.ai_description != semantics.ai_description);

            let field_id = current.id;
            if structural_changed || semantics_changed {
                let mut active: metadata_field::ActiveModel = current.into();
                active.ordinal_position = Set(field.ordinal_position);
                active.data_type = Set(field.data_type.clone());
                active.is_nullable = Set(field.is_nullable);
                active.default_type = Set(field.default_type.clone());
                active.default_expression = Set(field.default_expression.clone());
                active.comment = Set(field.comment.clone());
                active.is_primary_key = Set(field.is_primary_key);
                active.is_indexed = Set(field.is_indexed);
                active.metadata = Set(field.extra.to_string());
                if semantics_changed {
                    active.description = Set(semantics.description.clone());
                    active.description_source = Set(semantics.source.as_str().to_string());
                    active.ai_description = Set(semantics.ai_description.clone());
                }
                active.updated_at = Set(now);
                let updated = active.update(&txn).await?;

                if semantics_changed {
                    append_history(&txn, &updated, semantics.source, None).await?;
                }
            }

            FieldWrite {
                field_id,
                created: false,
                history_written: semantics_changed,
            }
        }
    };

    txn.commit().await?;
    Ok(write)
}

/// A user's edit of a field's descriptive text. `None` leaves a column as
/// is; an empty business definition clears it.
#[derive(Debug, Clone, Default)]
pub struct SemanticsEdit {
    pub description: Option<String>,
    pub business_definition: Option<String>,
}

/// Apply a user edit. Returns `None` when the field does not exist.
pub async fn apply_user_semantics(
    db: &DatabaseConnection,
    field_id: Uuid,
    edit: SemanticsEdit,
    updated_by: Option<Uuid>,
) -> Result<Option<metadata_field::Model>, DbErr> {
    let txn = db.begin().await?;

    let Some(current) = metadata_field::Entity::find_by_id(field_id).one(&txn).await? else {
        return Ok(None);
    };

    let new_description = edit.description.filter(|d| *d != current.description);
    let new_business = edit
        .business_definition
        .map(|b| Some(b).filter(|b| !b.trim().is_empty()))
        .filter(|b| *b != current.business_definition);

    if new_description.is_none() && new_business.is_none() {
        txn.commit().await?;
        return Ok(Some(current));
    }

    let mut active: metadata_field::ActiveModel = current.into();
    if let Some(description) = new_description {
        active.description = Set(description);
        active.description_source = Set(SemanticSource::User.as_str().to_string());
    }
    if let Some(business) = new_business {
        active.business_definition = Set(business);
    }
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&txn).await?;

    append_history(&txn, &updated, SemanticSource::User, updated_by).await?;
    txn.commit().await?;

    tracing::info!(field_id = %field_id, "field semantics edited");
    Ok(Some(updated))
}

async fn append_history<C: ConnectionTrait>(
    db: &C,
    field: &metadata_field::Model,
    source: SemanticSource,
    updated_by: Option<Uuid>,
) -> Result<(), DbErr> {
    field_semantics_history::ActiveModel {
        id: Set(Uuid::now_v7()),
        field_id: Set(field.id),
        description: Set(field.description.clone()),
        ai_description: Set(field.ai_description.clone()),
        business_definition: Set(field.business_definition.clone()),
        source: Set(source.as_str().to_string()),
        updated_by: Set(updated_by),
        created_at: Set(field.updated_at),
    }
    .insert(db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{NewConnection, create_connection};
    use crate::crypto::SecretBox;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, PaginatorTrait, QueryOrder};

    async fn setup() -> (DatabaseConnection, Uuid) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let conn = create_connection(
            &db,
            &SecretBox::new([0u8; 32]),
            NewConnection {
                organization_id: Uuid::now_v7(),
                name: "shop".to_string(),
                kind: "mysql".to_string(),
                config: serde_json::json!({
                    "host": "h", "database": "shop", "user": "u", "password": "p"
                }),
                created_by: None,
            },
        )
        .await
        .unwrap();
        (db, conn.id)
    }

    async fn orders(db: &DatabaseConnection, connection_id: Uuid) -> Uuid {
        let schema_id = upsert_schema(db, connection_id, "shop", "database", &serde_json::json!({}))
            .await
            .unwrap();
        upsert_object(
            db,
            schema_id,
            &ObjectDescriptor {
                name: "orders".to_string(),
                object_type: "table".to_string(),
                row_count: Some(10),
                size_bytes: None,
                extra: serde_json::json!({}),
            },
        )
        .await
        .unwrap()
    }

    fn column(name: &str, data_type: &str) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            data_type: data_type.to_string(),
            ordinal_position: 1,
            is_nullable: false,
            default_type: None,
            default_expression: None,
            comment: None,
            is_primary_key: false,
            is_indexed: false,
            extra: serde_json::json!({}),
        }
    }

    fn fallback(text: &str) -> ResolvedSemantics {
        ResolvedSemantics {
            description: text.to_string(),
            ai_description: None,
            source: SemanticSource::Fallback,
        }
    }

    async fn history(db: &DatabaseConnection, field_id: Uuid) -> Vec<field_semantics_history::Model> {
        field_semantics_history::Entity::find()
            .filter(field_semantics_history::Column::FieldId.eq(field_id))
            .order_by_asc(field_semantics_history::Column::CreatedAt)
            .order_by_asc(field_semantics_history::Column::Id)
            .all(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_schema_keeps_id_and_updates_type() {
        let (db, conn_id) = setup().await;
        let first = upsert_schema(&db, conn_id, "shop", "database", &serde_json::json!({}))
            .await
            .unwrap();
        let second = upsert_schema(&db, conn_id, "shop", "collection", &serde_json::json!({"k": 1}))
            .await
            .unwrap();
        assert_eq!(first, second);

        let rows = metadata_schema::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].schema_type, "collection");
        assert_eq!(rows[0].metadata, r#"{"k":1}"#);
    }

    #[tokio::test]
    async fn test_upsert_object_updates_row_count() {
        let (db, conn_id) = setup().await;
        let object_id = orders(&db, conn_id).await;
        let again = orders(&db, conn_id).await;
        assert_eq!(object_id, again);
        assert_eq!(metadata_object::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_new_field_gets_initial_history() {
        let (db, conn_id) = setup().await;
        let object_id = orders(&db, conn_id).await;

        let write = upsert_field(&db, object_id, &column("id", "int"), &fallback("Column id of type int"))
            .await
            .unwrap();
        assert!(write.created);
        assert!(write.history_written);

        let rows = history(&db, write.field_id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Column id of type int");
        assert_eq!(rows[0].source, "fallback");
    }

    #[tokio::test]
    async fn test_unchanged_field_writes_no_history() {
        let (db, conn_id) = setup().await;
        let object_id = orders(&db, conn_id).await;
        let semantics = fallback("Column id of type int");

        let first = upsert_field(&db, object_id, &column("id", "int"), &semantics).await.unwrap();
        let second = upsert_field(&db, object_id, &column("id", "int"), &semantics).await.unwrap();

        assert_eq!(first.field_id, second.field_id);
        assert!(!second.created);
        assert!(!second.history_written);
        assert_eq!(history(&db, first.field_id).await.len(), 1);
        assert_eq!(metadata_field::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_changed_description_appends_new_values() {
        let (db, conn_id) = setup().await;
        let object_id = orders(&db, conn_id).await;

        let write = upsert_field(&db, object_id, &column("status", "varchar"), &fallback("old"))
            .await
            .unwrap();
        let mut field = column("status", "varchar");
        field.comment = Some("order status".to_string());
        let engine = ResolvedSemantics {
            description: "order status".to_string(),
            ai_description: None,
            source: SemanticSource::Engine,
        };
        let second = upsert_field(&db, object_id, &field, &engine).await.unwrap();
        assert!(second.history_written);

        let rows = history(&db, write.field_id).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].description, "order status");
        assert_eq!(rows[1].source, "engine");

        let current = metadata_field::Entity::find_by_id(write.field_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.description, rows[1].description);
        assert_eq!(current.comment.as_deref(), Some("order status"));
    }

    #[tokio::test]
    async fn test_structural_change_alone_writes_no_history() {
        let (db, conn_id) = setup().await;
        let object_id = orders(&db, conn_id).await;
        let semantics = fallback("Column id of type int");

        let write = upsert_field(&db, object_id, &column("id", "int"), &semantics).await.unwrap();
        let mut widened = column("id", "int");
        widened.is_nullable = true;
        widened.is_primary_key = true;
        upsert_field(&db, object_id, &widened, &semantics).await.unwrap();

        assert_eq!(history(&db, write.field_id).await.len(), 1);
        let current = metadata_field::Entity::find_by_id(write.field_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(current.is_nullable);
        assert!(current.is_primary_key);
    }

    #[tokio::test]
    async fn test_user_edit_appends_one_history_row() {
        let (db, conn_id) = setup().await;
        let object_id = orders(&db, conn_id).await;
        let write = upsert_field(&db, object_id, &column("id", "int"), &fallback("Column id of type int"))
            .await
            .unwrap();
        let editor = Uuid::now_v7();

        let updated = apply_user_semantics(
            &db,
            write.field_id,
            SemanticsEdit {
                description: None,
                business_definition: Some("Order number shown to customers".to_string()),
            },
            Some(editor),
        )
        .await
        .unwrap()
        .unwrap();

        let rows = history(&db, write.field_id).await;
        assert_eq!(rows.len(), 2);
        let latest = rows.last().unwrap();
        assert_eq!(latest.source, "user");
        assert_eq!(latest.updated_by, Some(editor));
        assert_eq!(latest.business_definition, updated.business_definition);
        assert_eq!(updated.description, "Column id of type int");

        // Same edit again is a no-op.
        apply_user_semantics(
            &db,
            write.field_id,
            SemanticsEdit {
                description: None,
                business_definition: Some("Order number shown to customers".to_string()),
            },
            Some(editor),
        )
        .await
        .unwrap();
        assert_eq!(history(&db, write.field_id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_user_description_survives_resync() {
        let (db, conn_id) = setup().await;
        let object_id = orders(&db, conn_id).await;
        let semantics = fallback("Column id of type int");
        let write = upsert_field(&db, object_id, &column("id", "int"), &semantics).await.unwrap();

        apply_user_semantics(
            &db,
            write.field_id,
            SemanticsEdit {
                description: Some("Primary order number".to_string()),
                business_definition: Some("Order #".to_string()),
            },
            None,
        )
        .await
        .unwrap();

        let resync = upsert_field(&db, object_id, &column("id", "bigint"), &semantics).await.unwrap();
        assert!(!resync.history_written);

        let current = metadata_field::Entity::find_by_id(write.field_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.description, "Primary order number");
        assert_eq!(current.description_source, "user");
        assert_eq!(current.business_definition.as_deref(), Some("Order #"));
        assert_eq!(current.data_type, "bigint");
    }

    #[tokio::test]
    async fn test_edit_of_unknown_field() {
        let (db, _) = setup().await;
        let result = apply_user_semantics(&db, Uuid::now_v7(), SemanticsEdit::default(), None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_catalog_uuids_are_deterministic() {
        let conn = Uuid::now_v7();
        assert_eq!(catalog_schema_uuid(conn, "shop"), catalog_schema_uuid(conn, "shop"));
        assert_ne!(catalog_schema_uuid(conn, "shop"), catalog_schema_uuid(conn, "crm"));
        let object = catalog_object_uuid(catalog_schema_uuid(conn, "shop"), "orders");
        assert_ne!(catalog_field_uuid(object, "id"), catalog_field_uuid(object, "status"));
    }
}
