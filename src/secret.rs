use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::SecretError;

/// Resolves TSIG key material from wherever the host environment keeps
/// secrets (spec.md §6). The engine never reads secret bytes itself outside
/// this trait, and never logs them (§8 property 6).
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the raw bytes stored at `key` within the secret named `name`
    /// in `namespace`. No implicit base64 decoding: the bytes returned are
    /// used as the TSIG key verbatim.
    ///
    /// # Errors
    ///
    /// Will return `Err` if no secret named `name` exists in `namespace`, or
    /// the secret exists but has no value at `key`.
    async fn get_secret(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>, SecretError>;
}

/// A `SecretStore` backed by an in-memory map, for tests and for embedding
/// callers that already hold resolved secret material.
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<(String, String), HashMap<String, Vec<u8>>>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        StaticSecretStore::default()
    }

    pub fn insert(&mut self, namespace: impl Into<String>, name: impl Into<String>, key: impl Into<String>, value: Vec<u8>) {
        self.secrets
            .entry((namespace.into(), name.into()))
            .or_default()
            .insert(key.into(), value);
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>, SecretError> {
        let bucket = self
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        bucket.get(key).cloned().ok_or_else(|| SecretError::KeyMissing {
            name: name.to_string(),
            key: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_inserted_secret() {
        let mut store = StaticSecretStore::new();
        store.insert("ns", "tsig-key", "secret", b"hunter2".to_vec());
        let got = store.get_secret("ns", "tsig-key", "secret").await.unwrap();
        assert_eq!(got, b"hunter2");
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let store = StaticSecretStore::new();
        let err = store.get_secret("ns", "missing", "secret").await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_key_is_key_missing() {
        let mut store = StaticSecretStore::new();
        store.insert("ns", "tsig-key", "secret", b"hunter2".to_vec());
        let err = store.get_secret("ns", "tsig-key", "other").await.unwrap_err();
        assert!(matches!(err, SecretError::KeyMissing { .. }));
    }

    #[test]
    fn debug_does_not_print_secret_bytes() {
        let mut store = StaticSecretStore::new();
        store.insert("ns", "tsig-key", "secret", b"hunter2".to_vec());
        let rendered = format!("{store:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
