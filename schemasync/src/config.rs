//! Process settings, read once at start-up and passed down explicitly.
//!
//! Nothing below `main` looks at the environment: the pipeline, the HTTP
//! clients and the API all receive the pieces of [`Settings`] they need, which
//! lets tests build them by hand and point them at fake services.

use std::time::Duration;

use rand_core::RngCore;

pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:47334/api/sql";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ANNOTATION_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub cors_allowed_origins: Vec<String>,
    pub jwt_secret: String,
    pub master_key: [u8; 32],
    pub gateway: GatewaySettings,
    pub annotation: AnnotationSettings,
}

/// How requests to the query-federation gateway authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayAuth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub auth: GatewayAuth,
    pub timeout: Duration,
}

impl GatewaySettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: GatewayAuth::None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationSettings {
    /// `None` disables generated descriptions entirely.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    /// Minimum gap between two generative-text calls in one run.
    pub delay: Duration,
}

impl AnnotationSettings {
    pub fn disabled() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            delay: DEFAULT_ANNOTATION_DELAY,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug)]
pub struct SettingsError(String);

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid settings: {}", self.0)
    }
}

impl std::error::Error for SettingsError {}

impl Settings {
    /// Build settings from process environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let master_key = match non_empty("SCHEMASYNC_ENCRYPTION_KEY") {
            Some(hex) => parse_hex_key(&hex)
                .map_err(|e| SettingsError(format!("SCHEMASYNC_ENCRYPTION_KEY: {e}")))?,
            None => {
                tracing::warn!(
                    "SCHEMASYNC_ENCRYPTION_KEY not set, using a random key. \
                     Stored connection secrets will be unreadable after restart."
                );
                random_key()
            }
        };

        let jwt_secret = non_empty("SCHEMASYNC_JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!(
                "SCHEMASYNC_JWT_SECRET not set, using a random secret. \
                 No externally issued token will validate."
            );
            random_key().iter().map(|b| format!("{b:02x}")).collect()
        });

        let gateway_auth = match (
            non_empty("SCHEMASYNC_GATEWAY_TOKEN"),
            non_empty("SCHEMASYNC_GATEWAY_USER"),
        ) {
            (Some(token), _) => GatewayAuth::Bearer(token),
            (None, Some(username)) => GatewayAuth::Basic {
                username,
                password: get("SCHEMASYNC_GATEWAY_PASSWORD").unwrap_or_default(),
            },
            (None, None) => GatewayAuth::None,
        };

        let gateway_timeout = parse_number(&non_empty, "SCHEMASYNC_GATEWAY_TIMEOUT_SECS", 60)?;
        let delay_ms = parse_number(&non_empty, "SCHEMASYNC_ANNOTATION_DELAY_MS", 500)?;

        Ok(Self {
            database_url: non_empty("SCHEMASYNC_DATABASE_URL")
                .unwrap_or_else(|| "sqlite://schemasync.db?mode=rwc".to_string()),
            bind_addr: non_empty("SCHEMASYNC_BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1:5480".to_string()),
            cors_allowed_origins: non_empty("SCHEMASYNC_CORS_ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            jwt_secret,
            master_key,
            gateway: GatewaySettings {
                base_url: non_empty("SCHEMASYNC_GATEWAY_URL")
                    .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
                auth: gateway_auth,
                timeout: Duration::from_secs(gateway_timeout),
            },
            annotation: AnnotationSettings {
                api_key: non_empty("GEMINI_API_KEY"),
                endpoint: non_empty("GEMINI_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
                model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                delay: Duration::from_millis(delay_ms),
            },
        })
    }
}

fn parse_number(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, SettingsError> {
    match get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| SettingsError(format!("{key} must be a non-negative integer, got {v:?}"))),
        None => Ok(default),
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a 64-char hex string into a 32-byte key.
pub fn parse_hex_key(hex: &str) -> Result<[u8; 32], String> {
    if hex.len() != 64 {
        return Err(format!(
            "expected 64 hex chars (32 bytes), got {}",
            hex.len()
        ));
    }
    let mut key = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte_str =
            std::str::from_utf8(chunk).map_err(|_| "invalid UTF-8 in hex string".to_string())?;
        key[i] = u8::from_str_radix(byte_str, 16)
            .map_err(|_| format!("invalid hex character at byte {i}"))?;
    }
    Ok(key)
}

fn random_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand_core::OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.gateway.base_url, DEFAULT_GATEWAY_URL);
        assert_eq!(settings.gateway.auth, GatewayAuth::None);
        assert_eq!(settings.annotation.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(settings.annotation.delay, Duration::from_millis(500));
        assert!(!settings.annotation.is_enabled());
    }

    #[test]
    fn test_bearer_token_wins_over_basic_credentials() {
        let settings = Settings::from_lookup(lookup(&[
            ("SCHEMASYNC_GATEWAY_TOKEN", "tok"),
            ("SCHEMASYNC_GATEWAY_USER", "mindsdb"),
            ("SCHEMASYNC_GATEWAY_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(settings.gateway.auth, GatewayAuth::Bearer("tok".to_string()));
    }

    #[test]
    fn test_basic_credentials() {
        let settings = Settings::from_lookup(lookup(&[
            ("SCHEMASYNC_GATEWAY_USER", "mindsdb"),
            ("SCHEMASYNC_GATEWAY_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(
            settings.gateway.auth,
            GatewayAuth::Basic {
                username: "mindsdb".to_string(),
                password: "pw".to_string()
            }
        );
    }

    #[test]
    fn test_annotation_enabled_by_api_key() {
        let settings = Settings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
            ("SCHEMASYNC_ANNOTATION_DELAY_MS", "0"),
        ]))
        .unwrap();
        assert!(settings.annotation.is_enabled());
        assert_eq!(settings.annotation.model, "gemini-1.5-pro");
        assert_eq!(settings.annotation.delay, Duration::ZERO);
    }

    #[test]
    fn test_invalid_encryption_key_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("SCHEMASYNC_ENCRYPTION_KEY", "abc")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("64 hex chars"), "got: {err}");
    }

    #[test]
    fn test_invalid_delay_is_rejected() {
        let result = Settings::from_lookup(lookup(&[("SCHEMASYNC_ANNOTATION_DELAY_MS", "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_hex_key() {
        let key = parse_hex_key(&"ab".repeat(32)).unwrap();
        assert_eq!(key, [0xab; 32]);
        assert!(parse_hex_key(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(split_list(" a, ,b ,"), vec!["a".to_string(), "b".to_string()]);
    }
}
