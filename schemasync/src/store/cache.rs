use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::entity::ai_analysis_cache;

/// Signature under which a generated definition is reused within a connection.
#[derive(Debug, Clone, Copy)]
pub struct CacheKey<'a> {
    pub connection_id: Uuid,
    pub table_name: &'a str,
    pub column_name: &'a str,
    pub column_type: &'a str,
}

pub async fn lookup<C: ConnectionTrait>(db: &C, key: CacheKey<'_>) -> Result<Option<String>, DbErr> {
    let hit = ai_analysis_cache::Entity::find()
        .filter(ai_analysis_cache::Column::ConnectionId.eq(key.connection_id))
        .filter(ai_analysis_cache::Column::TableName.eq(key.table_name))
        .filter(ai_analysis_cache::Column::ColumnName.eq(key.column_name))
        .filter(ai_analysis_cache::Column::ColumnType.eq(key.column_type))
        .one(db)
        .await?;
    Ok(hit.map(|entry| entry.ai_definition))
}

pub struct CacheEntry<'a> {
    pub key: CacheKey<'a>,
    pub database_name: Option<&'a str>,
    pub schema_name: Option<&'a str>,
    pub ai_definition: &'a str,
    pub model_used: &'a str,
}

/// Insert, or refresh the definition if the signature is already present.
pub async fn store<C: ConnectionTrait>(db: &C, entry: CacheEntry<'_>) -> Result<(), DbErr> {
    let model = ai_analysis_cache::ActiveModel {
        id: Set(Uuid::now_v7()),
        connection_id: Set(entry.key.connection_id),
        table_name: Set(entry.key.table_name.to_string()),
        column_name: Set(entry.key.column_name.to_string()),
        column_type: Set(entry.key.column_type.to_string()),
        database_name: Set(entry.database_name.map(str::to_string)),
        schema_name: Set(entry.schema_name.map(str::to_string)),
        ai_definition: Set(entry.ai_definition.to_string()),
        model_used: Set(entry.model_used.to_string()),
        confidence_score: Set(None),
        created_at: Set(Utc::now().naive_utc()),
    };

    ai_analysis_cache::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                ai_analysis_cache::Column::ConnectionId,
                ai_analysis_cache::Column::TableName,
                ai_analysis_cache::Column::ColumnName,
                ai_analysis_cache::Column::ColumnType,
            ])
            .update_columns([
                ai_analysis_cache::Column::AiDefinition,
                ai_analysis_cache::Column::ModelUsed,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{NewConnection, create_connection};
    use crate::crypto::SecretBox;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection, PaginatorTrait};

    async fn setup() -> (DatabaseConnection, Uuid) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let conn = create_connection(
            &db,
            &SecretBox::new([0u8; 32]),
            NewConnection {
                organization_id: Uuid::now_v7(),
                name: "warehouse".to_string(),
                kind: "clickhouse".to_string(),
                config: serde_json::json!({"host": "ch"}),
                created_by: None,
            },
        )
        .await
        .unwrap();
        (db, conn.id)
    }

    fn key(connection_id: Uuid, column_type: &str) -> CacheKey<'_> {
        CacheKey {
            connection_id,
            table_name: "events",
            column_name: "ts",
            column_type,
        }
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let (db, conn_id) = setup().await;
        assert_eq!(lookup(&db, key(conn_id, "DateTime")).await.unwrap(), None);

        store(
            &db,
            CacheEntry {
                key: key(conn_id, "DateTime"),
                database_name: Some("analytics"),
                schema_name: Some("analytics"),
                ai_definition: "When the event happened.",
                model_used: "gemini-1.5-flash",
            },
        )
        .await
        .unwrap();

        assert_eq!(
            lookup(&db, key(conn_id, "DateTime")).await.unwrap().as_deref(),
            Some("When the event happened.")
        );
        // Type is part of the signature.
        assert_eq!(lookup(&db, key(conn_id, "String")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_same_signature_twice_keeps_one_row() {
        let (db, conn_id) = setup().await;
        for text in ["first", "second"] {
            store(
                &db,
                CacheEntry {
                    key: key(conn_id, "DateTime"),
                    database_name: None,
                    schema_name: None,
                    ai_definition: text,
                    model_used: "m",
                },
            )
            .await
            .unwrap();
        }

        let count = ai_analysis_cache::Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            lookup(&db, key(conn_id, "DateTime")).await.unwrap().as_deref(),
            Some("second")
        );
    }
}
