use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use shared_config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Call token issuer is not configured")]
    NotConfigured,

    #[error("Malformed call token")]
    Malformed,

    #[error("Call token signature mismatch")]
    BadSignature,

    #[error("Call token expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTokenClaims {
    pub call_id: String,
    pub sub: Uuid,
    pub exp: i64,
    pub nonce: String,
}

/// Mints the transport authorization token handed to call participants.
#[async_trait]
pub trait CallTokenIssuer: Send + Sync {
    async fn issue(&self, call_id: &str, user_id: Uuid, now: DateTime<Utc>) -> Result<String, TokenError>;
}

/// HMAC-SHA256 signed, expiring tokens: `base64url(claims).base64url(signature)`.
#[derive(Clone)]
pub struct HmacCallTokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl HmacCallTokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_seconds: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.rtc_token_secret.as_bytes(), config.rtc_token_ttl_seconds)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::NotConfigured);
        }
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::NotConfigured)
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<CallTokenClaims, TokenError> {
        let (claims_b64, signature_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD.decode(claims_b64).map_err(|_| TokenError::Malformed)?;
        let claims: CallTokenClaims =
            serde_json::from_slice(&claims_json).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[async_trait]
impl CallTokenIssuer for HmacCallTokenIssuer {
    async fn issue(&self, call_id: &str, user_id: Uuid, now: DateTime<Utc>) -> Result<String, TokenError> {
        let mut mac = self.mac()?;

        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let claims = CallTokenClaims {
            call_id: call_id.to_string(),
            sub: user_id,
            exp: (now + self.ttl).timestamp(),
            nonce: URL_SAFE_NO_PAD.encode(nonce),
        };
        let claims_json = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);

        mac.update(claims_b64.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", claims_b64, signature))
    }
}
