use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

// Clock skew tolerated between this machine and the API server.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Bearer token used for every API call.
///
/// JWTs have their `exp` claim read so that a request with a dead token can be
/// refused locally. Opaque tokens are sent as-is and only the server decides.
#[derive(Clone)]
pub struct AccessToken {
    raw: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let expires_at = decode_jwt_expiry(&raw);
        Self { raw, expires_at }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now >= exp + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Short SHA-256 hex fingerprint, safe to put in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.as_bytes());
        let out = hasher.finalize();
        hex::encode(&out[..6])
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("fingerprint", &self.fingerprint())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn decode_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::<Utc>::from_timestamp(exp, 0)
}
