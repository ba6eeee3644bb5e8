//! Read side of the metadata tree: the catalog view and JSON export.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{connection, metadata_field, metadata_object, metadata_schema};

#[derive(Debug, Serialize)]
pub struct CatalogField {
    pub id: Uuid,
    pub name: String,
    pub ordinal_position: i32,
    pub data_type: String,
    pub is_nullable: bool,
    pub default_type: Option<String>,
    pub default_expression: Option<String>,
    pub comment: Option<String>,
    pub description: String,
    pub description_source: String,
    pub ai_description: Option<String>,
    pub business_definition: Option<String>,
    pub is_primary_key: bool,
    pub is_indexed: bool,
    pub data_quality_score: Option<f64>,
    pub sample_values: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
}

impl From<metadata_field::Model> for CatalogField {
    fn from(m: metadata_field::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            ordinal_position: m.ordinal_position,
            data_type: m.data_type,
            is_nullable: m.is_nullable,
            default_type: m.default_type,
            default_expression: m.default_expression,
            comment: m.comment,
            description: m.description,
            description_source: m.description_source,
            ai_description: m.ai_description,
            business_definition: m.business_definition,
            is_primary_key: m.is_primary_key,
            is_indexed: m.is_indexed,
            data_quality_score: m.data_quality_score,
            sample_values: m.sample_values.as_deref().and_then(|s| serde_json::from_str(s).ok()),
            metadata: parse_metadata(&m.metadata),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogObject {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
    pub metadata: serde_json::Value,
    pub fields: Vec<CatalogField>,
}

#[derive(Debug, Serialize)]
pub struct CatalogSchema {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub schema_type: String,
    pub metadata: serde_json::Value,
    pub objects: Vec<CatalogObject>,
}

fn parse_metadata(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({}))
}

/// Schema → object → field tree for one connection. Schemas and objects by
/// name, fields by ordinal position.
pub async fn load_catalog<C: ConnectionTrait>(
    db: &C,
    connection_id: Uuid,
) -> Result<Vec<CatalogSchema>, DbErr> {
    let schemas = metadata_schema::Entity::find()
        .filter(metadata_schema::Column::ConnectionId.eq(connection_id))
        .order_by_asc(metadata_schema::Column::Name)
        .all(db)
        .await?;
    let schema_ids: Vec<Uuid> = schemas.iter().map(|s| s.id).collect();

    let objects = metadata_object::Entity::find()
        .filter(metadata_object::Column::SchemaId.is_in(schema_ids))
        .order_by_asc(metadata_object::Column::Name)
        .all(db)
        .await?;
    let object_ids: Vec<Uuid> = objects.iter().map(|o| o.id).collect();

    let fields = metadata_field::Entity::find()
        .filter(metadata_field::Column::ObjectId.is_in(object_ids))
        .order_by_asc(metadata_field::Column::OrdinalPosition)
        .order_by_asc(metadata_field::Column::Name)
        .all(db)
        .await?;

    let mut fields_by_object: HashMap<Uuid, Vec<CatalogField>> = HashMap::new();
    for field in fields {
        fields_by_object
            .entry(field.object_id)
            .or_default()
            .push(field.into());
    }

    let mut objects_by_schema: HashMap<Uuid, Vec<CatalogObject>> = HashMap::new();
    for object in objects {
        objects_by_schema
            .entry(object.schema_id)
            .or_default()
            .push(CatalogObject {
                id: object.id,
                fields: fields_by_object.remove(&object.id).unwrap_or_default(),
                metadata: parse_metadata(&object.metadata),
                name: object.name,
                object_type: object.object_type,
                row_count: object.row_count,
                size_bytes: object.size_bytes,
            });
    }

    Ok(schemas
        .into_iter()
        .map(|schema| CatalogSchema {
            id: schema.id,
            objects: objects_by_schema.remove(&schema.id).unwrap_or_default(),
            metadata: parse_metadata(&schema.metadata),
            name: schema.name,
            schema_type: schema.schema_type,
        })
        .collect())
}

// ---------- export ----------

#[derive(Debug, Serialize)]
pub struct ExportedConnection {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub last_sync_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
pub struct CatalogExport {
    pub connection: ExportedConnection,
    pub exported_at: NaiveDateTime,
    pub schemas: Vec<CatalogSchema>,
}

/// Snapshot of one connection's catalog. Carries no connection parameters.
pub async fn export_catalog<C: ConnectionTrait>(
    db: &C,
    connection: &connection::Model,
) -> Result<CatalogExport, DbErr> {
    Ok(CatalogExport {
        connection: ExportedConnection {
            id: connection.id,
            name: connection.name.clone(),
            kind: connection.kind.clone(),
            last_sync_at: connection.last_sync_at,
        },
        exported_at: Utc::now().naive_utc(),
        schemas: load_catalog(db, connection.id).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{ResolvedSemantics, SemanticSource};
    use crate::connection::{NewConnection, create_connection};
    use crate::crypto::SecretBox;
    use crate::introspect::{FieldDescriptor, ObjectDescriptor};
    use crate::store;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection};

    fn column(name: &str, ordinal: i32) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            data_type: "String".to_string(),
            ordinal_position: ordinal,
            is_nullable: true,
            default_type: None,
            default_expression: None,
            comment: None,
            is_primary_key: false,
            is_indexed: false,
            extra: serde_json::json!({}),
        }
    }

    fn table(name: &str) -> ObjectDescriptor {
        ObjectDescriptor {
            name: name.to_string(),
            object_type: "table".to_string(),
            row_count: None,
            size_bytes: None,
            extra: serde_json::json!({"engine": "MergeTree"}),
        }
    }

    async fn seeded() -> (DatabaseConnection, connection::Model) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let conn = create_connection(
            &db,
            &SecretBox::new([0u8; 32]),
            NewConnection {
                organization_id: Uuid::now_v7(),
                name: "warehouse".to_string(),
                kind: "clickhouse".to_string(),
                config: serde_json::json!({"host": "ch", "password": "secret"}),
                created_by: None,
            },
        )
        .await
        .unwrap();

        let semantics = ResolvedSemantics {
            description: "d".to_string(),
            ai_description: None,
            source: SemanticSource::Fallback,
        };
        for schema in ["zeta", "alpha"] {
            let schema_id = store::upsert_schema(&db, conn.id, schema, "database", &serde_json::json!({}))
                .await
                .unwrap();
            for t in ["users", "events"] {
                let object_id = store::upsert_object(&db, schema_id, &table(t)).await.unwrap();
                store::upsert_field(&db, object_id, &column("b", 2), &semantics).await.unwrap();
                store::upsert_field(&db, object_id, &column("a", 1), &semantics).await.unwrap();
            }
        }
        (db, conn)
    }

    #[tokio::test]
    async fn test_catalog_is_ordered() {
        let (db, conn) = seeded().await;
        let catalog = load_catalog(&db, conn.id).await.unwrap();

        let schemas: Vec<&str> = catalog.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(schemas, vec!["alpha", "zeta"]);
        let objects: Vec<&str> = catalog[0].objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(objects, vec!["events", "users"]);
        let fields: Vec<&str> = catalog[0].objects[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["a", "b"]);
        assert_eq!(catalog[0].objects[0].metadata["engine"], "MergeTree");
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let (db, _) = seeded().await;
        assert!(load_catalog(&db, Uuid::now_v7()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_shape_has_no_secrets() {
        let (db, conn) = seeded().await;
        let export = export_catalog(&db, &conn).await.unwrap();
        let json = serde_json::to_value(&export).unwrap();

        assert_eq!(json["connection"]["name"], "warehouse");
        assert_eq!(json["schemas"][0]["type"], "database");
        assert_eq!(json["schemas"][0]["objects"][0]["fields"][0]["name"], "a");
        assert!(!json.to_string().contains("secret"));
    }
}
