use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub enum FieldType {
    Text,
    Number,
    Select(Vec<&'static str>),
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub key: &'static str,
    pub label: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub is_secret: bool,
    pub default_value: Option<&'static str>,
}

impl FieldDef {
    fn text(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            field_type: FieldType::Text,
            required: true,
            is_secret: false,
            default_value: None,
        }
    }

    fn port(default: &'static str) -> Self {
        Self {
            key: "port",
            label: "Port",
            field_type: FieldType::Number,
            required: true,
            is_secret: false,
            default_value: Some(default),
        }
    }

    fn secret(key: &'static str, label: &'static str) -> Self {
        Self {
            is_secret: true,
            ..Self::text(key, label)
        }
    }

    fn optional(self) -> Self {
        Self {
            required: false,
            ..self
        }
    }

    fn defaulting_to(self, value: &'static str) -> Self {
        Self {
            default_value: Some(value),
            ..self
        }
    }
}

pub struct ConnectionTypeDef {
    pub kind: &'static str,
    pub label: &'static str,
    pub fields: Vec<FieldDef>,
}

static TYPE_DEFS: OnceLock<Vec<ConnectionTypeDef>> = OnceLock::new();

/// Every connection kind that can be registered. Registering a kind does not
/// imply it can be introspected (see `introspect::dialect`).
pub fn get_type_defs() -> &'static [ConnectionTypeDef] {
    TYPE_DEFS.get_or_init(|| {
        vec![
            ConnectionTypeDef {
                kind: "clickhouse",
                label: "ClickHouse",
                fields: vec![
                    FieldDef::text("host", "Host"),
                    FieldDef::port("8123"),
                    FieldDef::text("database", "Database").defaulting_to("default"),
                    FieldDef::text("user", "User").defaulting_to("default"),
                    FieldDef::secret("password", "Password").optional(),
                    FieldDef {
                        key: "protocol",
                        label: "Protocol",
                        field_type: FieldType::Select(vec!["http", "https", "native"]),
                        required: true,
                        is_secret: false,
                        default_value: Some("http"),
                    },
                ],
            },
            ConnectionTypeDef {
                kind: "mysql",
                label: "MySQL",
                fields: vec![
                    FieldDef::text("host", "Host"),
                    FieldDef::port("3306"),
                    FieldDef::text("database", "Database"),
                    FieldDef::text("user", "User"),
                    FieldDef::secret("password", "Password"),
                ],
            },
            ConnectionTypeDef {
                kind: "postgresql",
                label: "PostgreSQL",
                fields: vec![
                    FieldDef::text("host", "Host"),
                    FieldDef::port("5432"),
                    FieldDef::text("database", "Database"),
                    FieldDef::text("user", "User"),
                    FieldDef::secret("password", "Password"),
                    FieldDef {
                        key: "sslmode",
                        label: "SSL Mode",
                        field_type: FieldType::Select(vec!["disable", "prefer", "require"]),
                        required: true,
                        is_secret: false,
                        default_value: Some("require"),
                    },
                ],
            },
            ConnectionTypeDef {
                kind: "mongodb",
                label: "MongoDB",
                fields: vec![
                    FieldDef::text("host", "Host"),
                    FieldDef::port("27017"),
                    FieldDef::text("database", "Database"),
                    FieldDef::text("username", "Username").optional(),
                    FieldDef::secret("password", "Password").optional(),
                ],
            },
            ConnectionTypeDef {
                kind: "api",
                label: "HTTP API",
                fields: vec![
                    FieldDef::text("base_url", "Base URL"),
                    FieldDef::secret("api_key", "API Key").optional(),
                ],
            },
        ]
    })
}

pub fn get_type_def(kind: &str) -> Option<&'static ConnectionTypeDef> {
    get_type_defs().iter().find(|d| d.kind == kind)
}

#[derive(Debug)]
pub enum ConfigError {
    UnknownType(String),
    MissingRequiredField(String),
    InvalidInput(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownType(t) => write!(f, "Unknown connection type: {t}"),
            ConfigError::MissingRequiredField(k) => write!(f, "Missing required field: {k}"),
            ConfigError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Split a flat config input into (non_secret_config, secret_config).
/// Validates required fields are present (with defaults applied). Keys the
/// type does not declare are dropped.
pub fn split_config(
    kind: &str,
    config_input: serde_json::Value,
) -> Result<(serde_json::Value, serde_json::Value), ConfigError> {
    let type_def = get_type_def(kind).ok_or_else(|| ConfigError::UnknownType(kind.to_string()))?;

    let input = config_input
        .as_object()
        .ok_or_else(|| ConfigError::InvalidInput("config must be a JSON object".to_string()))?;

    let mut config = serde_json::Map::new();
    let mut secure = serde_json::Map::new();

    for field in &type_def.fields {
        let resolved = match input.get(field.key).cloned() {
            Some(serde_json::Value::Null) | None => match field.default_value {
                Some(default) => default_value(field, default)?,
                None if field.required => {
                    return Err(ConfigError::MissingRequiredField(field.key.to_string()));
                }
                None => continue,
            },
            Some(v) => v,
        };

        if let FieldType::Select(options) = &field.field_type {
            let chosen = resolved.as_str().unwrap_or_default();
            if !options.contains(&chosen) {
                return Err(ConfigError::InvalidInput(format!(
                    "'{}' must be one of {}",
                    field.key,
                    options.join(", ")
                )));
            }
        }

        if field.is_secret {
            secure.insert(field.key.to_string(), resolved);
        } else {
            config.insert(field.key.to_string(), resolved);
        }
    }

    Ok((
        serde_json::Value::Object(config),
        serde_json::Value::Object(secure),
    ))
}

fn default_value(field: &FieldDef, default: &str) -> Result<serde_json::Value, ConfigError> {
    match field.field_type {
        FieldType::Number => default
            .parse::<i64>()
            .map(serde_json::Value::from)
            .map_err(|_| {
                ConfigError::InvalidInput(format!(
                    "Default for '{}' is not a valid number",
                    field.key
                ))
            }),
        _ => Ok(serde_json::Value::String(default.to_string())),
    }
}

/// Merge an update input with existing config + secure_config.
/// Preserves existing values for fields not provided in update_input.
/// For secret fields: empty string means "keep existing".
pub fn merge_config(
    kind: &str,
    existing_config: serde_json::Value,
    existing_secure: serde_json::Value,
    update_input: serde_json::Value,
) -> Result<(serde_json::Value, serde_json::Value), ConfigError> {
    let type_def = get_type_def(kind).ok_or_else(|| ConfigError::UnknownType(kind.to_string()))?;

    let input = update_input
        .as_object()
        .ok_or_else(|| ConfigError::InvalidInput("config must be a JSON object".to_string()))?;

    let existing_cfg = existing_config.as_object().cloned().unwrap_or_default();
    let existing_sec = existing_secure.as_object().cloned().unwrap_or_default();

    let mut config = serde_json::Map::new();
    let mut secure = serde_json::Map::new();

    for field in &type_def.fields {
        let (target, existing) = if field.is_secret {
            (&mut secure, &existing_sec)
        } else {
            (&mut config, &existing_cfg)
        };

        let keep_existing = match input.get(field.key) {
            None => true,
            Some(v) => field.is_secret && v.as_str().is_some_and(str::is_empty),
        };

        if keep_existing {
            if let Some(existing_val) = existing.get(field.key).cloned() {
                target.insert(field.key.to_string(), existing_val);
            }
        } else if let Some(val) = input.get(field.key).cloned() {
            target.insert(field.key.to_string(), val);
        }
    }

    Ok((
        serde_json::Value::Object(config),
        serde_json::Value::Object(secure),
    ))
}

// ---------- API response types ----------

#[derive(Debug, Serialize)]
pub struct FieldDefResponse {
    pub key: String,
    pub label: String,
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub required: bool,
    pub is_secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTypeResponse {
    pub kind: String,
    pub label: String,
    /// Whether schema sync has a dialect for this kind.
    pub supports_sync: bool,
    pub fields: Vec<FieldDefResponse>,
}

impl From<&ConnectionTypeDef> for ConnectionTypeResponse {
    fn from(def: &ConnectionTypeDef) -> Self {
        Self {
            kind: def.kind.to_string(),
            label: def.label.to_string(),
            supports_sync: crate::introspect::dialect::dialect_for_kind(def.kind).is_ok(),
            fields: def
                .fields
                .iter()
                .map(|f| FieldDefResponse {
                    key: f.key.to_string(),
                    label: f.label.to_string(),
                    field_type: match &f.field_type {
                        FieldType::Text => "text".to_string(),
                        FieldType::Number => "number".to_string(),
                        FieldType::Select(_) => "select".to_string(),
                    },
                    options: match &f.field_type {
                        FieldType::Select(opts) => {
                            Some(opts.iter().map(|s| s.to_string()).collect())
                        }
                        _ => None,
                    },
                    required: f.required,
                    is_secret: f.is_secret,
                    default_value: f.default_value.map(|s| s.to_string()),
                })
                .collect(),
        }
    }
}
