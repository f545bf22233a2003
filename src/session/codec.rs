//! Tamper-evident cookie codec.
//!
//! Values are serialized to JSON, base64url-encoded, and authenticated with
//! HMAC-SHA256 over the encoded payload. The wire form is
//! `<payload>.<tag>`, both segments unpadded base64url. Verification uses a
//! constant-time comparison and happens before the payload is parsed, so a
//! forged cookie never reaches serde.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cookie is not in payload.tag form")]
    Malformed,

    #[error("cookie signature mismatch")]
    Signature,

    #[error("cookie payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Signs and verifies cookie payloads with a single shared secret.
///
/// Used for both the session cookie and the tenant preference cookie; the
/// two carry different payload types, which is enough to keep one from
/// being replayed as the other (the JSON shapes do not overlap).
pub struct SessionCodec {
    key: Vec<u8>,
}

impl SessionCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    fn tag(&self, payload: &str) -> Vec<u8> {
        // HMAC accepts keys of any length, so construction cannot fail.
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Serialize and sign a value into cookie form.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        let json = serde_json::to_vec(value)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let tag = URL_SAFE_NO_PAD.encode(self.tag(&payload));
        Ok(format!("{payload}.{tag}"))
    }

    /// Verify and deserialize a cookie value.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, CodecError> {
        let (payload, tag) = token.split_once('.').ok_or(CodecError::Malformed)?;
        let provided = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| CodecError::Malformed)?;
        let expected = self.tag(payload);

        if !bool::from(provided.ct_eq(&expected)) {
            return Err(CodecError::Signature);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CodecError::Malformed)?;
        Ok(serde_json::from_slice(&json)?)
    }
}
