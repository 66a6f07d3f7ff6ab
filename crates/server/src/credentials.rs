//! Per-backend credential storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Principal used when a request does not name one.
pub const DEFAULT_PRINCIPAL: &str = "default";

/// Maps a principal to the token used for its upstream calls on one backend.
///
/// At most one token per principal; `set` replaces any previous value.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, principal: &str) -> Option<Arc<str>>;

    async fn set(&self, principal: &str, token: Arc<str>);
}

/// In-memory store. Readers see either the old or the new token, never a mix.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    tokens: RwLock<HashMap<String, Arc<str>>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `(principal, token)` pairs.
    #[must_use]
    pub fn from_pairs<I, P, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: AsRef<str>,
    {
        let tokens = pairs
            .into_iter()
            .map(|(p, t)| (p.into(), Arc::<str>::from(t.as_ref())))
            .collect();
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

impl std::fmt::Debug for InMemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut principals: Vec<String> = self.tokens.read().keys().cloned().collect();
        principals.sort();
        f.debug_struct("InMemoryCredentialStore")
            .field("principals", &principals)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, principal: &str) -> Option<Arc<str>> {
        self.tokens.read().get(principal).cloned()
    }

    async fn set(&self, principal: &str, token: Arc<str>) {
        self.tokens.write().insert(principal.to_string(), token);
    }
}
