use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand_core::{OsRng, RngCore};

const NONCE_LEN: usize = 12;

#[derive(Debug)]
pub enum CryptoError {
    Encrypt(String),
    Decrypt(String),
    Decode(String),
    Json(serde_json::Error),
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoError::Encrypt(e) => write!(f, "Encryption error: {e}"),
            CryptoError::Decrypt(e) => write!(f, "Decryption error: {e}"),
            CryptoError::Decode(e) => write!(f, "Base64 decode error: {e}"),
            CryptoError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Seals the secret half of a connection's parameters (passwords, API keys)
/// for storage in `connection.secure_config`.
///
/// Sealed form: base64(12-byte nonce ‖ AES-256-GCM ciphertext+tag).
/// An empty stored string opens to `{}` so connections without secrets need
/// no ciphertext at all.
#[derive(Clone)]
pub struct SecretBox {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBox { .. }")
    }
}

impl SecretBox {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn seal(&self, secrets: &serde_json::Value) -> Result<String, CryptoError> {
        let plaintext = serde_json::to_vec(secrets).map_err(CryptoError::Json)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(&sealed))
    }

    pub fn open(&self, sealed: &str) -> Result<serde_json::Value, CryptoError> {
        if sealed.is_empty() {
            return Ok(serde_json::json!({}));
        }

        let data = STANDARD
            .decode(sealed)
            .map_err(|e| CryptoError::Decode(e.to_string()))?;
        if data.len() < NONCE_LEN {
            return Err(CryptoError::Decrypt(format!(
                "ciphertext too short (< {NONCE_LEN} bytes)"
            )));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        serde_json::from_slice(&plaintext).map_err(CryptoError::Json)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new((&self.key).into())
    }
}
