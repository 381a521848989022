//! Service-account OAuth: sign a JWT assertion, trade it for an access token.

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ASSERTION_TTL_SECS, GOOGLE_SCOPES, TOKEN_REFRESH_MARGIN_SECS};
use crate::error::FetchError;
use crate::source::ensure_success;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The fields of a Google service-account key file that we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub async fn load(path: &str) -> Result<Self, FetchError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FetchError::Credentials(format!("{path}: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| FetchError::Credentials(format!("{path}: {e}")))
    }

    fn cache_key(&self) -> String {
        format!(
            "{}#{}",
            self.client_email,
            self.private_key_id.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Build the RS256 assertion Google expects for the jwt-bearer grant.
pub fn sign_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    now_secs: u64,
) -> Result<String, FetchError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: GOOGLE_SCOPES,
        aud: audience,
        iat: now_secs,
        exp: now_secs + ASSERTION_TTL_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_TTL_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at_secs: u64,
}

/// Access tokens keyed by service account and key id. Only the bearer token
/// is cached; roster data never is.
#[derive(Default)]
pub struct TokenCache {
    tokens: DashMap<String, CachedToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn access_token(
        &self,
        client: &reqwest::Client,
        key: &ServiceAccountKey,
        token_url: &str,
    ) -> Result<String, FetchError> {
        let cache_key = key.cache_key();
        let now = now_secs();

        let cached = self.tokens.get(&cache_key).map(|t| t.clone());
        if let Some(cached) = cached {
            if cached.expires_at_secs > now + TOKEN_REFRESH_MARGIN_SECS {
                debug!("Using cached access token for {}", key.client_email);
                return Ok(cached.access_token);
            }
            debug!("Cached access token for {} expired, evicting", key.client_email);
            self.tokens.remove(&cache_key);
        }

        let assertion = sign_assertion(key, token_url, now)?;
        let resp = client
            .post(token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let token: TokenResponse = ensure_success(resp).await?.json().await?;

        info!(
            "Obtained access token for {} (expires in {}s)",
            key.client_email, token.expires_in
        );
        self.tokens.insert(
            cache_key,
            CachedToken {
                access_token: token.access_token.clone(),
                expires_at_secs: now + token.expires_in,
            },
        );
        Ok(token.access_token)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
