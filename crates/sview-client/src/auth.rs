//! Bearer token storage.
//!
//! Owned by the client instance and shared across its requests. Rotation
//! is single-flight: callers that hit `401` with the same stale token
//! queue on the write lock, and only the first one talks to the backend.

use std::future::Future;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Access/refresh token pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl std::fmt::Debug for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokens")
            .field("access", &self.access.is_some())
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

/// Thread-safe token store with single-flight rotation.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: RwLock<Tokens>,
}

impl TokenStore {
    pub fn new(tokens: Tokens) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.access.is_some()
    }

    pub async fn set(&self, tokens: Tokens) {
        *self.tokens.write().await = tokens;
    }

    /// Forget both tokens.
    pub async fn clear(&self) {
        *self.tokens.write().await = Tokens::default();
    }

    /// Replace a rejected access token.
    ///
    /// `stale` is the token the caller sent. If another task already
    /// rotated it, the current token is returned without calling `refresh`.
    /// A failed rotation clears both tokens.
    pub async fn rotate<F, Fut>(&self, stale: Option<&str>, refresh: F) -> ClientResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ClientResult<String>>,
    {
        let mut tokens = self.tokens.write().await;

        // Double-check: another task may have rotated while we waited
        if let Some(current) = tokens.access.as_deref() {
            if Some(current) != stale {
                debug!("Access token already rotated by a concurrent request");
                return Ok(current.to_string());
            }
        }

        let Some(refresh_token) = tokens.refresh.clone() else {
            *tokens = Tokens::default();
            return Err(ClientError::Unauthorized);
        };

        match refresh(refresh_token).await {
            Ok(access) => {
                tokens.access = Some(access.clone());
                Ok(access)
            }
            Err(e) => {
                warn!("Token refresh failed, clearing session: {}", e);
                *tokens = Tokens::default();
                Err(ClientError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn store(access: &str, refresh: &str) -> TokenStore {
        TokenStore::new(Tokens {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        })
    }

    #[tokio::test]
    async fn test_rotate_replaces_stale_token() {
        let store = store("old", "r1");
        let fresh = store
            .rotate(Some("old"), |refresh| async move {
                assert_eq!(refresh, "r1");
                Ok("new".to_string())
            })
            .await
            .unwrap();
        assert_eq!(fresh, "new");
        assert_eq!(store.access_token().await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_rotate_skips_when_already_rotated() {
        let store = store("new", "r1");
        let calls = AtomicU32::new(0);
        let token = store
            .rotate(Some("old"), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("newer".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(token, "new");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_rotation_clears_session() {
        let store = store("old", "r1");
        let result = store
            .rotate(Some("old"), |_| async {
                Err(ClientError::Http {
                    status: 401,
                    message: None,
                })
            })
            .await;
        assert!(matches!(result, Err(ClientError::Unauthorized)));
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_rotate_without_refresh_token() {
        let store = TokenStore::new(Tokens { access: Some("old".into()), refresh: None });
        let result = store.rotate(Some("old"), |_| async { Ok("new".to_string()) }).await;
        assert!(matches!(result, Err(ClientError::Unauthorized)));
        assert_eq!(store.access_token().await, None);
    }
}
