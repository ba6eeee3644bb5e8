//! Per-engine query text and row mapping.
//!
//! Every supported engine is one static [`Dialect`] entry; the match in
//! [`dialect_for`] is exhaustive over [`DataSourceKind`], so adding a kind
//! without deciding its dialect does not compile.

use std::str::FromStr;

use serde_json::Value;

use super::gateway::{cell_i64, cell_str};
use super::{FieldDescriptor, IntrospectionError, ObjectDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    ClickHouse,
    MySql,
    Postgres,
    MongoDb,
    Api,
}

impl DataSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceKind::ClickHouse => "clickhouse",
            DataSourceKind::MySql => "mysql",
            DataSourceKind::Postgres => "postgresql",
            DataSourceKind::MongoDb => "mongodb",
            DataSourceKind::Api => "api",
        }
    }
}

impl FromStr for DataSourceKind {
    type Err = IntrospectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clickhouse" => Ok(DataSourceKind::ClickHouse),
            "mysql" => Ok(DataSourceKind::MySql),
            "postgresql" | "postgres" => Ok(DataSourceKind::Postgres),
            "mongodb" => Ok(DataSourceKind::MongoDb),
            "api" => Ok(DataSourceKind::Api),
            _ => Err(IntrospectionError::UnsupportedDataSourceKind(s.to_string())),
        }
    }
}

/// How a dialect enumerates its top-level containers.
#[derive(Debug, Clone, Copy)]
pub enum SchemaListing {
    /// Run this query; the first column holds the names.
    Query(&'static str),
    /// No multi-schema concept: one fixed name, no remote call.
    Synthetic(&'static str),
}

/// Where a walked schema name sits in the database/schema pair given to the
/// annotator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationScope {
    /// The walked name is a database with no schema level below it.
    NameIsDatabase,
    /// The walked name lives inside the connection's configured database.
    NameInDatabase,
}

pub struct Dialect {
    pub kind: DataSourceKind,
    pub schema_type: &'static str,
    pub schemas: SchemaListing,
    pub scope: AnnotationScope,
    pub list_objects: fn(schema: &str) -> String,
    pub describe: fn(schema: &str, object: &str) -> String,
    pub map_object: fn(row: &[Value]) -> Option<ObjectDescriptor>,
    /// `index` is the row's position in the result, used when the engine does
    /// not report an ordinal.
    pub map_field: fn(index: usize, row: &[Value]) -> Option<FieldDescriptor>,
}

impl std::fmt::Debug for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialect")
            .field("kind", &self.kind)
            .field("schema_type", &self.schema_type)
            .field("schemas", &self.schemas)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Dialect {
    /// `(database, schema)` for a walked schema name. Engines without a
    /// schema level report `default`.
    pub fn annotation_scope<'a>(
        &self,
        configured_database: Option<&'a str>,
        walked: &'a str,
    ) -> (&'a str, &'a str) {
        match self.scope {
            AnnotationScope::NameIsDatabase => (walked, "default"),
            AnnotationScope::NameInDatabase => (configured_database.unwrap_or(walked), walked),
        }
    }
}

pub fn dialect_for(kind: DataSourceKind) -> Option<&'static Dialect> {
    match kind {
        DataSourceKind::ClickHouse => Some(&CLICKHOUSE),
        DataSourceKind::MySql => Some(&MYSQL),
        DataSourceKind::Postgres => Some(&POSTGRES),
        DataSourceKind::MongoDb => Some(&MONGODB),
        DataSourceKind::Api => None,
    }
}

/// Parse a stored kind string and look up its dialect.
pub fn dialect_for_kind(kind: &str) -> Result<&'static Dialect, IntrospectionError> {
    let parsed: DataSourceKind = kind.parse()?;
    dialect_for(parsed)
        .ok_or_else(|| IntrospectionError::UnsupportedDataSourceKind(kind.to_string()))
}

/// Engine bookkeeping catalogs that are never synced.
pub fn is_system_schema(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "system" | "information_schema" | "mysql" | "performance_schema" | "sys" | "pg_catalog"
    ) || lower.starts_with("pg_toast")
        || lower.starts_with("pg_temp")
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn cell(row: &[Value], idx: usize) -> Option<String> {
    row.get(idx).and_then(cell_str)
}

fn cell_num(row: &[Value], idx: usize) -> Option<i64> {
    row.get(idx).and_then(cell_i64)
}

fn is_yes(row: &[Value], idx: usize) -> bool {
    match row.get(idx) {
        Some(Value::Bool(b)) => *b,
        Some(v) => cell_str(v).is_some_and(|s| s.eq_ignore_ascii_case("yes") || s == "1"),
        None => false,
    }
}

fn view_or_table(kind: Option<&str>) -> &'static str {
    match kind {
        Some(k) if k.to_ascii_lowercase().contains("view") => "view",
        _ => "table",
    }
}

// ---------- ClickHouse ----------

static CLICKHOUSE: Dialect = Dialect {
    kind: DataSourceKind::ClickHouse,
    schema_type: "database",
    schemas: SchemaListing::Query("SHOW DATABASES"),
    scope: AnnotationScope::NameIsDatabase,
    list_objects: clickhouse_list_objects,
    describe: clickhouse_describe,
    map_object: clickhouse_object,
    map_field: clickhouse_field,
};

fn clickhouse_list_objects(schema: &str) -> String {
    format!(
        "SELECT name, engine, total_rows, total_bytes FROM system.tables \
         WHERE database = {} ORDER BY name",
        quote_literal(schema)
    )
}

fn clickhouse_describe(schema: &str, object: &str) -> String {
    format!(
        "DESCRIBE TABLE {}.{}",
        quote_backtick(schema),
        quote_backtick(object)
    )
}

fn clickhouse_object(row: &[Value]) -> Option<ObjectDescriptor> {
    let engine = cell(row, 1);
    Some(ObjectDescriptor {
        name: cell(row, 0)?,
        object_type: view_or_table(engine.as_deref()).to_string(),
        row_count: cell_num(row, 2),
        size_bytes: cell_num(row, 3),
        extra: match engine {
            Some(engine) => serde_json::json!({ "engine": engine }),
            None => serde_json::json!({}),
        },
    })
}

/// `DESCRIBE TABLE` columns: name, type, default_type, default_expression,
/// comment, codec_expression, ttl_expression.
fn clickhouse_field(index: usize, row: &[Value]) -> Option<FieldDescriptor> {
    let data_type = cell(row, 1)?;
    let mut extra = serde_json::Map::new();
    if let Some(codec) = cell(row, 5) {
        extra.insert("codec_expression".to_string(), Value::String(codec));
    }
    if let Some(ttl) = cell(row, 6) {
        extra.insert("ttl_expression".to_string(), Value::String(ttl));
    }
    Some(FieldDescriptor {
        name: cell(row, 0)?,
        ordinal_position: index as i32 + 1,
        is_nullable: data_type.contains("Nullable("),
        data_type,
        default_type: cell(row, 2),
        default_expression: cell(row, 3),
        comment: cell(row, 4),
        is_primary_key: false,
        is_indexed: false,
        extra: Value::Object(extra),
    })
}

// ---------- MySQL / PostgreSQL (information_schema) ----------

static MYSQL: Dialect = Dialect {
    kind: DataSourceKind::MySql,
    schema_type: "database",
    schemas: SchemaListing::Query(
        "SELECT schema_name FROM information_schema.schemata ORDER BY schema_name",
    ),
    scope: AnnotationScope::NameIsDatabase,
    list_objects: mysql_list_objects,
    describe: mysql_describe,
    map_object: information_schema_object,
    map_field: information_schema_field,
};

fn mysql_list_objects(schema: &str) -> String {
    format!(
        "SELECT table_name, table_type, table_rows, data_length \
         FROM information_schema.tables WHERE table_schema = {} ORDER BY table_name",
        quote_literal(schema)
    )
}

fn mysql_describe(schema: &str, object: &str) -> String {
    format!(
        "SELECT column_name, column_type, is_nullable, column_default, column_comment, \
         ordinal_position, column_key, extra \
         FROM information_schema.columns \
         WHERE table_schema = {} AND table_name = {} ORDER BY ordinal_position",
        quote_literal(schema),
        quote_literal(object)
    )
}

static POSTGRES: Dialect = Dialect {
    kind: DataSourceKind::Postgres,
    schema_type: "database",
    schemas: SchemaListing::Query(
        "SELECT schema_name FROM information_schema.schemata ORDER BY schema_name",
    ),
    scope: AnnotationScope::NameInDatabase,
    list_objects: postgres_list_objects,
    describe: postgres_describe,
    map_object: information_schema_object,
    map_field: information_schema_field,
};

fn postgres_list_objects(schema: &str) -> String {
    format!(
        "SELECT table_name, table_type FROM information_schema.tables \
         WHERE table_schema = {} ORDER BY table_name",
        quote_literal(schema)
    )
}

fn postgres_describe(schema: &str, object: &str) -> String {
    let schema = quote_literal(schema);
    let object = quote_literal(object);
    format!(
        "SELECT c.column_name, c.data_type, c.is_nullable, c.column_default, \
         col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, c.ordinal_position), \
         c.ordinal_position, \
         CASE WHEN EXISTS ( \
           SELECT 1 FROM information_schema.table_constraints tc \
           JOIN information_schema.key_column_usage k \
             ON k.constraint_name = tc.constraint_name AND k.table_schema = tc.table_schema \
           WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = c.table_schema \
             AND tc.table_name = c.table_name AND k.column_name = c.column_name \
         ) THEN 'PRI' ELSE '' END \
         FROM information_schema.columns c \
         WHERE c.table_schema = {schema} AND c.table_name = {object} ORDER BY c.ordinal_position"
    )
}

fn information_schema_object(row: &[Value]) -> Option<ObjectDescriptor> {
    let table_type = cell(row, 1);
    Some(ObjectDescriptor {
        name: cell(row, 0)?,
        object_type: view_or_table(table_type.as_deref()).to_string(),
        row_count: cell_num(row, 2),
        size_bytes: cell_num(row, 3),
        extra: serde_json::json!({}),
    })
}

/// Positions: name, type, is_nullable, default, comment, ordinal, key, extra.
fn information_schema_field(index: usize, row: &[Value]) -> Option<FieldDescriptor> {
    let default_expression = cell(row, 3);
    let key = cell(row, 6).unwrap_or_default();
    let extra = match cell(row, 7) {
        Some(extra) => serde_json::json!({ "extra": extra }),
        None => serde_json::json!({}),
    };
    Some(FieldDescriptor {
        name: cell(row, 0)?,
        data_type: cell(row, 1)?,
        ordinal_position: cell_num(row, 5)
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or(index as i32 + 1),
        is_nullable: is_yes(row, 2),
        default_type: default_expression.as_ref().map(|_| "DEFAULT".to_string()),
        default_expression,
        comment: cell(row, 4),
        is_primary_key: key == "PRI",
        is_indexed: !key.is_empty(),
        extra,
    })
}

// ---------- MongoDB ----------

static MONGODB: Dialect = Dialect {
    kind: DataSourceKind::MongoDb,
    schema_type: "collection",
    schemas: SchemaListing::Synthetic("default"),
    scope: AnnotationScope::NameInDatabase,
    list_objects: mongodb_list_objects,
    describe: mongodb_describe,
    map_object: mongodb_object,
    map_field: show_columns_field,
};

fn mongodb_list_objects(_schema: &str) -> String {
    "SHOW TABLES".to_string()
}

fn mongodb_describe(_schema: &str, object: &str) -> String {
    format!("SHOW COLUMNS FROM {}", quote_backtick(object))
}

fn mongodb_object(row: &[Value]) -> Option<ObjectDescriptor> {
    Some(ObjectDescriptor {
        name: cell(row, 0)?,
        object_type: "collection".to_string(),
        row_count: None,
        size_bytes: None,
        extra: serde_json::json!({}),
    })
}

/// `SHOW COLUMNS` positions: Field, Type, Null, Key, Default, Extra.
fn show_columns_field(index: usize, row: &[Value]) -> Option<FieldDescriptor> {
    let key = cell(row, 3).unwrap_or_default();
    let default_expression = cell(row, 4);
    Some(FieldDescriptor {
        name: cell(row, 0)?,
        data_type: cell(row, 1).unwrap_or_else(|| "unknown".to_string()),
        ordinal_position: index as i32 + 1,
        is_nullable: row.get(2).is_none() || is_yes(row, 2),
        default_type: default_expression.as_ref().map(|_| "DEFAULT".to_string()),
        default_expression,
        comment: None,
        is_primary_key: key == "PRI",
        is_indexed: !key.is_empty(),
        extra: serde_json::json!({}),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(values: Value) -> Vec<Value> {
        values.as_array().unwrap().clone()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("mysql".parse::<DataSourceKind>().unwrap(), DataSourceKind::MySql);
        assert_eq!("postgres".parse::<DataSourceKind>().unwrap(), DataSourceKind::Postgres);
        assert_eq!("PostgreSQL".parse::<DataSourceKind>().unwrap(), DataSourceKind::Postgres);
        let err = "oracle".parse::<DataSourceKind>().unwrap_err();
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_api_has_no_dialect() {
        assert!(dialect_for(DataSourceKind::Api).is_none());
        let err = dialect_for_kind("api").unwrap_err();
        assert!(matches!(err, IntrospectionError::UnsupportedDataSourceKind(ref k) if k == "api"));
    }

    #[test]
    fn test_every_other_kind_has_a_dialect() {
        for kind in [
            DataSourceKind::ClickHouse,
            DataSourceKind::MySql,
            DataSourceKind::Postgres,
            DataSourceKind::MongoDb,
        ] {
            let dialect = dialect_for(kind).unwrap();
            assert_eq!(dialect.kind, kind);
        }
    }

    #[test]
    fn test_system_schemas() {
        for name in ["system", "INFORMATION_SCHEMA", "mysql", "performance_schema", "pg_toast_temp_1"] {
            assert!(is_system_schema(name), "{name} should be excluded");
        }
        assert!(!is_system_schema("shop"));
        assert!(!is_system_schema("public"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
        assert_eq!(quote_backtick("we`ird"), "`we``ird`");
        assert_eq!(
            (CLICKHOUSE.describe)("analytics", "events"),
            "DESCRIBE TABLE `analytics`.`events`"
        );
        assert!((MYSQL.list_objects)("shop").contains("table_schema = 'shop'"));
    }

    #[test]
    fn test_clickhouse_describe_row() {
        let field = clickhouse_field(
            2,
            &row(json!(["user_id", "Nullable(UInt64)", "", "", "owning user", "ZSTD(1)", ""])),
        )
        .unwrap();
        assert_eq!(field.name, "user_id");
        assert_eq!(field.ordinal_position, 3);
        assert!(field.is_nullable);
        assert_eq!(field.default_type, None);
        assert_eq!(field.comment.as_deref(), Some("owning user"));
        assert_eq!(field.extra["codec_expression"], "ZSTD(1)");
        assert!(field.extra.get("ttl_expression").is_none());
    }

    #[test]
    fn test_wrapped_nullable_is_nullable() {
        let field = clickhouse_field(
            0,
            &row(json!(["country", "LowCardinality(Nullable(String))", "", "", "", "", ""])),
        )
        .unwrap();
        assert!(field.is_nullable);

        let field =
            clickhouse_field(0, &row(json!(["tags", "Array(String)", "", "", "", "", ""]))).unwrap();
        assert!(!field.is_nullable);
    }

    #[test]
    fn test_annotation_scope_per_engine() {
        assert_eq!(CLICKHOUSE.annotation_scope(Some("ignored"), "eu"), ("eu", "default"));
        assert_eq!(MYSQL.annotation_scope(None, "shop"), ("shop", "default"));
        assert_eq!(POSTGRES.annotation_scope(Some("shop"), "public"), ("shop", "public"));
        assert_eq!(POSTGRES.annotation_scope(None, "public"), ("public", "public"));
        assert_eq!(MONGODB.annotation_scope(Some("events"), "default"), ("events", "default"));
    }

    #[test]
    fn test_clickhouse_object_row() {
        let obj = clickhouse_object(&row(json!(["daily", "MaterializedView", null, null]))).unwrap();
        assert_eq!(obj.object_type, "view");
        assert_eq!(obj.row_count, None);

        let obj = clickhouse_object(&row(json!(["events", "MergeTree", "1200", 4096]))).unwrap();
        assert_eq!(obj.object_type, "table");
        assert_eq!(obj.row_count, Some(1200));
        assert_eq!(obj.size_bytes, Some(4096));
    }

    #[test]
    fn test_information_schema_row() {
        let field = information_schema_field(
            0,
            &row(json!(["id", "int", "NO", null, "", 1, "PRI", "auto_increment"])),
        )
        .unwrap();
        assert_eq!(field.data_type, "int");
        assert!(!field.is_nullable);
        assert!(field.is_primary_key);
        assert!(field.is_indexed);
        assert_eq!(field.comment, None, "empty comment reads as absent");
        assert_eq!(field.extra["extra"], "auto_increment");

        let field = information_schema_field(
            5,
            &row(json!(["status", "varchar(20)", "YES", "'new'", "order status", 2, "", ""])),
        )
        .unwrap();
        assert_eq!(field.ordinal_position, 2);
        assert!(field.is_nullable);
        assert_eq!(field.default_type.as_deref(), Some("DEFAULT"));
        assert_eq!(field.default_expression.as_deref(), Some("'new'"));
        assert_eq!(field.comment.as_deref(), Some("order status"));
    }

    #[test]
    fn test_row_without_name_is_skipped() {
        assert!(information_schema_field(0, &row(json!([null, "int"]))).is_none());
        assert!(clickhouse_object(&row(json!([]))).is_none());
    }

    #[test]
    fn test_mongodb_is_synthetic() {
        assert!(matches!(MONGODB.schemas, SchemaListing::Synthetic("default")));
        let field = show_columns_field(0, &row(json!(["_id", "ObjectId", "NO", "PRI", null, ""]))).unwrap();
        assert!(field.is_primary_key);
        assert_eq!(field.ordinal_position, 1);
    }
}
