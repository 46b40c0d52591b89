use std::{
    collections::HashMap,
    fmt::Debug,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use p256::ecdsa::VerifyingKey;
use serde_json::Value as Json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::jws::parse_p256_jwk;

/// Resolves the public key an issuer signed with.
#[async_trait]
pub trait IssuerKeyResolver: Debug {
    /// `kid` is the header key id, which may or may not already be qualified
    /// with the issuer identifier.
    async fn resolve(&self, issuer: &str, kid: &str) -> Result<VerifyingKey>;
}

/// An in-memory key registry.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<(String, String), VerifyingKey>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, issuer: &str, kid: &str, key: VerifyingKey) -> Self {
        self.insert(issuer, kid, key);
        self
    }

    pub fn insert(&mut self, issuer: &str, kid: &str, key: VerifyingKey) {
        self.keys.insert((issuer.to_owned(), kid.to_owned()), key);
    }

    pub fn insert_jwk(&mut self, issuer: &str, kid: &str, jwk: &Json) -> Result<()> {
        let key = parse_p256_jwk(jwk)?;
        self.insert(issuer, kid, key);
        Ok(())
    }
}

#[async_trait]
impl IssuerKeyResolver for StaticKeyResolver {
    async fn resolve(&self, issuer: &str, kid: &str) -> Result<VerifyingKey> {
        if let Some(key) = self.keys.get(&(issuer.to_owned(), kid.to_owned())) {
            return Ok(key.clone());
        }
        // A qualified kid such as `did:example:issuer#key-1`.
        if let Some((key_issuer, fragment)) = kid.split_once('#') {
            if key_issuer == issuer {
                if let Some(key) = self.keys.get(&(issuer.to_owned(), fragment.to_owned())) {
                    return Ok(key.clone());
                }
            }
        }
        bail!("no key '{kid}' registered for issuer '{issuer}'")
    }
}

/// Caches keys resolved by an inner resolver for a fixed time.
#[derive(Debug)]
pub struct CachingKeyResolver<R> {
    inner: R,
    ttl: Duration,
    cache: RwLock<HashMap<(String, String), (Instant, VerifyingKey)>>,
}

impl<R: IssuerKeyResolver> CachingKeyResolver<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<R: IssuerKeyResolver + Send + Sync> IssuerKeyResolver for CachingKeyResolver<R> {
    async fn resolve(&self, issuer: &str, kid: &str) -> Result<VerifyingKey> {
        let cache_key = (issuer.to_owned(), kid.to_owned());
        if let Some((fetched, key)) = self.cache.read().await.get(&cache_key) {
            if fetched.elapsed() < self.ttl {
                return Ok(key.clone());
            }
        }

        let key = self.inner.resolve(issuer, kid).await?;
        debug!("loaded key '{kid}' of issuer '{issuer}'");
        self.cache
            .write()
            .await
            .insert(cache_key, (Instant::now(), key.clone()));
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    #[derive(Debug)]
    struct Counting {
        key: VerifyingKey,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IssuerKeyResolver for Counting {
        async fn resolve(&self, _issuer: &str, _kid: &str) -> Result<VerifyingKey> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.key.clone())
        }
    }

    #[tokio::test]
    async fn static_resolution() {
        let key = SigningKey::random(&mut OsRng).verifying_key().clone();
        let resolver = StaticKeyResolver::new().with_key("did:example:issuer", "key-1", key.clone());

        assert_eq!(
            resolver.resolve("did:example:issuer", "key-1").await.unwrap(),
            key
        );
        assert_eq!(
            resolver
                .resolve("did:example:issuer", "did:example:issuer#key-1")
                .await
                .unwrap(),
            key
        );
        assert!(resolver.resolve("did:example:other", "key-1").await.is_err());
        assert!(resolver
            .resolve("did:example:other", "did:example:issuer#key-1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn caches_until_expiry() {
        let key = SigningKey::random(&mut OsRng).verifying_key().clone();
        let resolver = CachingKeyResolver::new(
            Counting {
                key: key.clone(),
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(300),
        );
        for _ in 0..3 {
            resolver.resolve("did:example:issuer", "key-1").await.unwrap();
        }
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 1);

        let uncached = CachingKeyResolver::new(
            Counting {
                key,
                calls: AtomicUsize::new(0),
            },
            Duration::ZERO,
        );
        for _ in 0..2 {
            uncached.resolve("did:example:issuer", "key-1").await.unwrap();
        }
        assert_eq!(uncached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
