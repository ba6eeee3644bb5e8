//! Registered external data sources and the parameters needed to reach them.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::crypto::{CryptoError, SecretBox};
use crate::entity::connection;

pub mod types;

use types::ConfigError;

#[derive(Debug)]
pub enum RegistryError {
    Config(ConfigError),
    Crypto(CryptoError),
    /// Stored `config` column is not a JSON object.
    Corrupt(String),
    DuplicateName(String),
    Store(DbErr),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Config(e) => write!(f, "{e}"),
            RegistryError::Crypto(e) => write!(f, "{e}"),
            RegistryError::Corrupt(msg) => write!(f, "Corrupt connection config: {msg}"),
            RegistryError::DuplicateName(name) => {
                write!(f, "Connection name already exists: {name}")
            }
            RegistryError::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<ConfigError> for RegistryError {
    fn from(e: ConfigError) -> Self {
        RegistryError::Config(e)
    }
}

impl From<CryptoError> for RegistryError {
    fn from(e: CryptoError) -> Self {
        RegistryError::Crypto(e)
    }
}

impl From<DbErr> for RegistryError {
    fn from(e: DbErr) -> Self {
        RegistryError::Store(e)
    }
}

/// Whether a store error is a unique-constraint violation.
pub fn is_unique_violation(e: &DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE") || msg.contains("unique")
}

#[derive(Debug, Clone)]
pub struct NewConnection {
    pub organization_id: Uuid,
    pub name: String,
    pub kind: String,
    /// Flat parameters; secret fields are split out by the type registry.
    pub config: Value,
    pub created_by: Option<Uuid>,
}

/// Validate, split and seal a connection's parameters, then insert the row.
pub async fn create_connection<C: ConnectionTrait>(
    db: &C,
    secrets: &SecretBox,
    new: NewConnection,
) -> Result<connection::Model, RegistryError> {
    let (config, secure) = types::split_config(&new.kind, new.config)?;
    let secure_config = if secure.as_object().is_some_and(Map::is_empty) {
        String::new()
    } else {
        secrets.seal(&secure)?
    };

    let now = Utc::now().naive_utc();
    let model = connection::ActiveModel {
        id: Set(Uuid::now_v7()),
        organization_id: Set(new.organization_id),
        name: Set(new.name.clone()),
        kind: Set(new.kind),
        config: Set(config.to_string()),
        secure_config: Set(secure_config),
        is_active: Set(true),
        created_by: Set(new.created_by),
        last_sync_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RegistryError::DuplicateName(new.name)
        } else {
            RegistryError::Store(e)
        }
    })?;

    tracing::info!(connection_id = %model.id, kind = %model.kind, "connection registered");
    Ok(model)
}

/// Parse a stored non-secret config column.
pub fn stored_config(model: &connection::Model) -> Result<Value, RegistryError> {
    let value: Value =
        serde_json::from_str(&model.config).map_err(|e| RegistryError::Corrupt(e.to_string()))?;
    if !value.is_object() {
        return Err(RegistryError::Corrupt("expected a JSON object".to_string()));
    }
    Ok(value)
}

/// A connection with its secret parameters opened, ready to be handed to the
/// gateway. Lives only for the duration of one sync or test call.
#[derive(Clone)]
pub struct ResolvedConnection {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    params: Map<String, Value>,
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ResolvedConnection {
    pub fn resolve(model: &connection::Model, secrets: &SecretBox) -> Result<Self, RegistryError> {
        let mut params = match stored_config(model)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(secure) = secrets.open(&model.secure_config)? {
            params.extend(secure);
        }
        Ok(Self {
            id: model.id,
            name: model.name.clone(),
            kind: model.kind.clone(),
            params,
        })
    }

    /// The configured default database, when the kind has one.
    pub fn database(&self) -> Option<&str> {
        self.params.get("database").and_then(Value::as_str)
    }

    /// `{type, ...params}`: the datasource object the gateway expects in a
    /// query context. Carries the credentials verbatim.
    pub fn datasource_context(&self) -> Value {
        let mut ds = Map::with_capacity(self.params.len() + 1);
        ds.insert("type".to_string(), Value::String(self.kind.clone()));
        for (k, v) in &self.params {
            ds.insert(k.clone(), v.clone());
        }
        Value::Object(ds)
    }
}
