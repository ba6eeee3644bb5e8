use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::connection::ResolvedConnection;

pub mod dialect;
pub mod gateway;

use dialect::{Dialect, SchemaListing};
use gateway::{GatewayError, QueryGateway};

// ---------- DTOs ----------

/// One column as reported by the remote engine, normalized across dialects.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub data_type: String,
    pub ordinal_position: i32,
    pub is_nullable: bool,
    pub default_type: Option<String>,
    pub default_expression: Option<String>,
    /// Engine-native comment. Empty strings are normalized to `None`.
    pub comment: Option<String>,
    pub is_primary_key: bool,
    pub is_indexed: bool,
    /// Engine-specific leftovers (codec, TTL, auto_increment, ...).
    pub extra: Value,
}

impl FieldDescriptor {
    /// The native comment, if it has any non-whitespace text.
    pub fn native_comment(&self) -> Option<&str> {
        self.comment.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub name: String,
    /// "table", "view" or "collection"
    pub object_type: String,
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
    pub extra: Value,
}

// ---------- errors ----------

#[derive(Debug)]
pub enum IntrospectionError {
    UnsupportedDataSourceKind(String),
    IntrospectionFailed { target: String, message: String },
}

impl fmt::Display for IntrospectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrospectionError::UnsupportedDataSourceKind(kind) => {
                write!(f, "Unsupported data source kind: {kind}")
            }
            IntrospectionError::IntrospectionFailed { target, message } => {
                write!(f, "Introspection of {target} failed: {message}")
            }
        }
    }
}

impl std::error::Error for IntrospectionError {}

fn failed(target: impl Into<String>, e: GatewayError) -> IntrospectionError {
    IntrospectionError::IntrospectionFailed {
        target: target.into(),
        message: e.to_string(),
    }
}

// ---------- trait ----------

#[async_trait::async_trait]
pub trait Introspector: Send + Sync {
    /// Kind of container `list_schemas` returns ("database", "collection").
    fn schema_type(&self) -> &'static str;

    /// `(database, schema)` naming a walked schema in annotation prompts.
    fn annotation_scope<'a>(
        &self,
        configured_database: Option<&'a str>,
        schema: &'a str,
    ) -> (&'a str, &'a str);

    /// Schema names, system catalogs excluded.
    async fn list_schemas(&self) -> Result<Vec<String>, IntrospectionError>;

    async fn list_objects(&self, schema: &str) -> Result<Vec<ObjectDescriptor>, IntrospectionError>;

    /// Fields in the engine's native column order.
    async fn describe_object(
        &self,
        schema: &str,
        object: &str,
    ) -> Result<Vec<FieldDescriptor>, IntrospectionError>;
}

// ---------- gateway-backed implementation ----------

pub struct GatewayIntrospector {
    gateway: Arc<dyn QueryGateway>,
    dialect: &'static Dialect,
    datasource: Value,
}

#[async_trait::async_trait]
impl Introspector for GatewayIntrospector {
    fn schema_type(&self) -> &'static str {
        self.dialect.schema_type
    }

    fn annotation_scope<'a>(
        &self,
        configured_database: Option<&'a str>,
        schema: &'a str,
    ) -> (&'a str, &'a str) {
        self.dialect.annotation_scope(configured_database, schema)
    }

    async fn list_schemas(&self) -> Result<Vec<String>, IntrospectionError> {
        let sql = match self.dialect.schemas {
            SchemaListing::Synthetic(name) => return Ok(vec![name.to_string()]),
            SchemaListing::Query(sql) => sql,
        };
        let rows = self
            .gateway
            .query(sql, &self.datasource)
            .await
            .map_err(|e| failed("schema list", e))?;

        Ok(rows
            .first_column()
            .into_iter()
            .filter(|name| !dialect::is_system_schema(name))
            .collect())
    }

    async fn list_objects(&self, schema: &str) -> Result<Vec<ObjectDescriptor>, IntrospectionError> {
        let sql = (self.dialect.list_objects)(schema);
        let rows = self
            .gateway
            .query(&sql, &self.datasource)
            .await
            .map_err(|e| failed(format!("schema {schema}"), e))?;

        Ok(rows
            .data
            .iter()
            .filter_map(|row| (self.dialect.map_object)(row))
            .collect())
    }

    async fn describe_object(
        &self,
        schema: &str,
        object: &str,
    ) -> Result<Vec<FieldDescriptor>, IntrospectionError> {
        let sql = (self.dialect.describe)(schema, object);
        let rows = self
            .gateway
            .query(&sql, &self.datasource)
            .await
            .map_err(|e| failed(format!("{schema}.{object}"), e))?;

        let mut fields: Vec<FieldDescriptor> = rows
            .data
            .iter()
            .enumerate()
            .filter_map(|(i, row)| (self.dialect.map_field)(i, row))
            .collect();
        // Stable: rows already in native order keep it.
        fields.sort_by_key(|f| f.ordinal_position);
        Ok(fields)
    }
}

// ---------- factory ----------

/// Pick the dialect for `connection.kind` and bind it to a gateway.
pub fn create_introspector(
    connection: &ResolvedConnection,
    gateway: Arc<dyn QueryGateway>,
) -> Result<Box<dyn Introspector>, IntrospectionError> {
    let dialect = dialect::dialect_for_kind(&connection.kind)?;
    Ok(Box::new(GatewayIntrospector {
        gateway,
        dialect,
        datasource: connection.datasource_context(),
    }))
}
