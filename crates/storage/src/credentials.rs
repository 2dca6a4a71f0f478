use std::sync::Arc;

use mentor_core::model::BearerToken;

use crate::TOKEN_KEY;
use crate::repository::{KeyValueStore, StorageError};

/// Reads and writes the bearer credential under the `token` key.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Current credential, if one is stored and non-blank.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn token(&self) -> Result<Option<BearerToken>, StorageError> {
        Ok(self.kv.get(TOKEN_KEY).await?.and_then(BearerToken::new))
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub async fn store_token(&self, token: &BearerToken) -> Result<(), StorageError> {
        self.kv.set(TOKEN_KEY, token.expose()).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.kv.remove(TOKEN_KEY).await
    }
}
