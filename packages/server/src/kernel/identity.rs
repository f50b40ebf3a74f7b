//! OpenID Connect ID token verification against the provider's JWKS.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::OAuthConfig;
use crate::kernel::{BaseIdentityVerifier, IdentityError, VerifiedIdentity};

const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

struct CachedKeys {
    fetched_at: Instant,
    keys: JwkSet,
}

/// Verifies RS256 ID tokens issued for the configured client.
pub struct JwksIdentityVerifier {
    config: OAuthConfig,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksIdentityVerifier {
    pub fn new(config: OAuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http,
            cache: RwLock::new(None),
        })
    }

    /// Start with `keys` already cached.
    pub fn with_keys(config: OAuthConfig, keys: JwkSet) -> anyhow::Result<Self> {
        let verifier = Self::new(config)?;
        *verifier.cache.try_write()? = Some(CachedKeys {
            fetched_at: Instant::now(),
            keys,
        });
        Ok(verifier)
    }

    async fn fetch_keys(&self) -> anyhow::Result<JwkSet> {
        let keys = self
            .http
            .get(&self.config.jwks_uri)
            .send()
            .await
            .context("JWKS request failed")?
            .error_for_status()
            .context("JWKS endpoint returned an error")?
            .json::<JwkSet>()
            .await
            .context("JWKS response is not a key set")?;

        info!(uri = %self.config.jwks_uri, keys = keys.keys.len(), "fetched provider signing keys");
        Ok(keys)
    }

    /// Key for `kid`, refetching once when it is unknown or the cache is stale.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let fresh = cached.fetched_at.elapsed() < self.config.jwks_ttl;
                if let Some(jwk) = cached.keys.find(kid).filter(|_| fresh) {
                    return DecodingKey::from_jwk(jwk)
                        .map_err(|e| IdentityError::Rejected(format!("unusable signing key: {e}")));
                }
            }
        }

        debug!(kid, "signing key not cached, refreshing JWKS");
        let keys = self.fetch_keys().await?;
        let key = keys
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(|e| IdentityError::Rejected(format!("unusable signing key: {e}")))?;
        *self.cache.write().await = Some(CachedKeys {
            fetched_at: Instant::now(),
            keys,
        });

        key.ok_or_else(|| IdentityError::Rejected(format!("no signing key with kid {kid:?}")))
    }

    fn validation(&self, client_id: &str) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(self.config.issuers.as_slice());
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = LEEWAY_SECS;
        validation
    }
}

#[async_trait]
impl BaseIdentityVerifier for JwksIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let Some(client_id) = self.config.client_id.as_deref() else {
            return Err(IdentityError::Rejected("federated login is not configured".into()));
        };

        let header = decode_header(id_token)
            .map_err(|e| IdentityError::Rejected(format!("malformed header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Rejected(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Rejected("missing kid".into()))?;

        let key = self.decoding_key(&kid).await?;
        let claims = decode::<IdTokenClaims>(id_token, &key, &self.validation(client_id))
            .map_err(|e| IdentityError::Rejected(e.to_string()))?
            .claims;

        let email = claims
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| IdentityError::Rejected("token carries no email".into()))?;
        if claims.email_verified != Some(true) {
            return Err(IdentityError::Rejected("provider has not verified the email".into()));
        }
        let name = claims
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email,
            name,
        })
    }
}
