//! # Webhook signatures
//!
//! The indexing provider signs every notification with a shared secret. The signature is an HMAC-SHA256 over the
//! *exact* request body bytes, hex encoded, and sent in a request header. Some provider versions prefix the digest with
//! `sha256=`, so both forms are accepted:
//!
//! ```text
//!    x-alchemy-signature: 5d2a7c...e1
//!    x-alchemy-signature: sha256=5d2a7c...e1
//! ```
//!
//! The body must be verified before it is parsed. Parsing and re-serialising JSON changes whitespace and key order,
//! and the signature will no longer match.
//!
//! Comparison of the digests is constant-time (via [`Mac::verify_slice`]).
use chainpay_common::Secret;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No webhook secret has been configured, so no webhook can be authenticated")]
    SecretNotConfigured,
    #[error("The webhook signature header is missing")]
    MissingSignature,
    #[error("The webhook signature does not match the request body")]
    InvalidSignature,
}

#[derive(Clone, Debug, Default)]
pub struct WebhookVerifier {
    secret: Secret<String>,
}

impl WebhookVerifier {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_configured()
    }

    /// Authenticates `raw` against the signature taken from the request header.
    pub fn verify(&self, raw: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let mut mac = self.mac()?;
        let signature = signature.map(str::trim).filter(|s| !s.is_empty()).ok_or(SignatureError::MissingSignature)?;
        let digest = strip_prefix(signature);
        let supplied = hex::decode(digest).map_err(|e| {
            trace!("🔐️ Signature is not valid hex. {e}");
            SignatureError::InvalidSignature
        })?;
        mac.update(raw);
        mac.verify_slice(&supplied).map_err(|_| SignatureError::InvalidSignature)
    }

    /// The hex-encoded signature for `raw`, without the `sha256=` prefix.
    pub fn sign(&self, raw: &[u8]) -> Result<String, SignatureError> {
        let mut mac = self.mac()?;
        mac.update(raw);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha256, SignatureError> {
        if !self.secret.is_configured() {
            return Err(SignatureError::SecretNotConfigured);
        }
        HmacSha256::new_from_slice(self.secret.reveal().as_bytes()).map_err(|_| SignatureError::SecretNotConfigured)
    }
}

fn strip_prefix(signature: &str) -> &str {
    match signature.get(..SIGNATURE_PREFIX.len()) {
        Some(p) if p.eq_ignore_ascii_case(SIGNATURE_PREFIX) => &signature[SIGNATURE_PREFIX.len()..],
        _ => signature,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BODY: &[u8] = br#"{"webhookId":"wh_1","event":{"activity":[]}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(Secret::new("whsec_test".to_string()))
    }

    #[test]
    fn accepts_bare_and_prefixed_digests() {
        let v = verifier();
        let sig = v.sign(BODY).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(v.verify(BODY, Some(&sig)).is_ok());
        assert!(v.verify(BODY, Some(&format!("sha256={sig}"))).is_ok());
        assert!(v.verify(BODY, Some(&format!("SHA256={}", sig.to_uppercase()))).is_ok());
        assert!(v.verify(BODY, Some(&format!("  {sig}\n"))).is_ok());
    }

    #[test]
    fn rejects_tampered_bodies() {
        let v = verifier();
        let sig = v.sign(BODY).unwrap();
        // Same JSON, different bytes
        let reformatted = br#"{"webhookId": "wh_1", "event": {"activity": []}}"#;
        assert_eq!(v.verify(reformatted, Some(&sig)), Err(SignatureError::InvalidSignature));
        assert_eq!(v.verify(BODY, Some(&sig[..62])), Err(SignatureError::InvalidSignature));
        assert_eq!(v.verify(BODY, Some("not-hex")), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn missing_header_or_secret() {
        assert_eq!(verifier().verify(BODY, None), Err(SignatureError::MissingSignature));
        assert_eq!(verifier().verify(BODY, Some("  ")), Err(SignatureError::MissingSignature));
        let unconfigured = WebhookVerifier::default();
        assert!(!unconfigured.is_configured());
        assert_eq!(unconfigured.verify(BODY, Some("sha256=00")), Err(SignatureError::SecretNotConfigured));
    }

    #[test]
    fn wrong_secret_fails() {
        let sig = verifier().sign(BODY).unwrap();
        let other = WebhookVerifier::new(Secret::new("another".to_string()));
        assert_eq!(other.verify(BODY, Some(&sig)), Err(SignatureError::InvalidSignature));
    }
}
