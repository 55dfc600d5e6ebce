//! JSON Web Key Set retrieval with a short-TTL in-process cache.
//!
//! Keys are fetched from the tenant's OpenID configuration and kept for an
//! hour so that token validation does not hit the identity provider on
//! every request. A miss on a known-fresh set triggers one refresh, which
//! also covers provider key rotation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

const JWKS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: String,
}

struct CachedKeys {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

/// Shared cache of identity-provider signing keys, keyed by `kid`.
#[derive(Clone)]
pub struct JwksCache {
    inner: Arc<RwLock<Option<CachedKeys>>>,
}

impl JwksCache {
    pub fn new() -> Self {
        JwksCache {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Resolves a decoding key for a token's `kid`, refreshing the set when
    /// it is stale or does not contain the key.
    pub async fn decoding_key(
        &self,
        http: &reqwest::Client,
        tenant_id: &str,
        kid: &str,
    ) -> Result<DecodingKey> {
        if let Some(key) = self.lookup(kid, false).await {
            return Ok(key);
        }
        self.refresh(http, tenant_id).await?;
        self.lookup(kid, true)
            .await
            .ok_or_else(|| anyhow!("no signing key found for kid '{kid}'"))
    }

    async fn lookup(&self, kid: &str, allow_stale: bool) -> Option<DecodingKey> {
        let guard = self.inner.read().await;
        let cached = guard.as_ref()?;
        if !allow_stale && cached.fetched_at.elapsed() > JWKS_TTL {
            return None;
        }
        let jwk = cached.keys.get(kid)?;
        DecodingKey::from_jwk(jwk).ok()
    }

    async fn refresh(&self, http: &reqwest::Client, tenant_id: &str) -> Result<()> {
        let endpoint = format!(
            "https://login.microsoftonline.com/{tenant_id}/v2.0/.well-known/openid-configuration"
        );
        let configuration: OpenIdConfiguration = http
            .get(&endpoint)
            .send()
            .await
            .context("failed to fetch OpenID configuration")?
            .json()
            .await
            .context("malformed OpenID configuration")?;

        let jwks: JwkSet = http
            .get(&configuration.jwks_uri)
            .send()
            .await
            .context("failed to fetch JWKS")?
            .json()
            .await
            .context("malformed JWKS document")?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter_map(|jwk| jwk.common.key_id.clone().map(|kid| (kid, jwk)))
            .collect();
        debug!("Refreshed JWKS cache with {} keys", keys.len());

        let mut guard = self.inner.write().await;
        *guard = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new()
    }
}
