//! Magic link payload codec, generation, and verification.
//!
//! A magic link is `<origin>/validate-magic-link?magic=<ciphertext>` where
//! the ciphertext is an encrypted JSON payload `{email, nonce, createdAt}`.
//! The payload is never persisted server-side; its validity window derives
//! entirely from the embedded `createdAt` timestamp, so a link cannot be
//! revoked early except by clearing the session nonce it is bound to.

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Links older than this are rejected. Deliberately not configurable.
const MAGIC_LINK_TTL_SECONDS: i64 = 5 * 60;

const AEAD_NONCE_LEN: usize = 12;

/// Payload carried inside the encrypted `magic` query parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkPayload {
    pub email: String,
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

/// Verification failures, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicLinkError {
    /// The `magic` query parameter is absent.
    MissingParam,
    /// Decryption failed (malformed, tampered, or forged ciphertext), or the
    /// embedded nonce does not match the session. Both cases share one
    /// message so an attacker cannot tell them apart.
    InvalidLink,
    /// Decryption succeeded but the plaintext is not a valid payload.
    InvalidPayload,
    /// The payload is older than the expiry window.
    Expired,
}

impl MagicLinkError {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingParam => "missing magic parameter",
            Self::InvalidLink => "invalid magic link",
            Self::InvalidPayload => "invalid magic link payload",
            Self::Expired => "magic link has expired",
        }
    }
}

/// Authenticated encryption for magic link payloads.
///
/// The 32-byte key is derived from the configured secret with SHA-256, so
/// operators can use an arbitrary-length secret string. Output format is
/// `base64url(nonce (12 bytes) || ciphertext)`.
#[derive(Clone)]
pub struct MagicLinkCodec {
    cipher: ChaCha20Poly1305,
}

impl MagicLinkCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.expose_secret().as_bytes());
        let key_bytes = hasher.finalize();
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        Self { cipher }
    }

    /// Encrypt a plaintext string into an opaque URL-safe token.
    ///
    /// # Errors
    /// Returns an error if encryption fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; AEAD_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failure: {e}"))?;

        let mut data = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        data.extend_from_slice(&nonce_bytes);
        data.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(data))
    }

    /// Decrypt a token produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    /// Returns an error on malformed base64, truncated input, or when the
    /// authentication tag does not verify (tampering, wrong key).
    pub fn decrypt(&self, token: &str) -> Result<String> {
        let data = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|e| anyhow!("Invalid token encoding: {e}"))?;
        if data.len() < AEAD_NONCE_LEN {
            return Err(anyhow!("Invalid ciphertext length"));
        }

        let (nonce_bytes, ciphertext) = data.split_at(AEAD_NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow!("Decryption failure: {e}"))?;

        String::from_utf8(plaintext).map_err(|e| anyhow!("Invalid plaintext encoding: {e}"))
    }
}

/// Build an absolute magic link for `email`, bound to `nonce`.
///
/// `createdAt` is stamped at call time. The caller is responsible for
/// persisting the nonce into the session and for delivering the URL.
///
/// # Errors
/// Returns an error if the origin does not parse as a URL or encryption fails.
pub fn generate_magic_link(
    codec: &MagicLinkCodec,
    origin: &str,
    email: &str,
    nonce: &str,
) -> Result<String> {
    let payload = MagicLinkPayload {
        email: email.to_string(),
        nonce: nonce.to_string(),
        created_at: Utc::now(),
    };
    let plaintext = serde_json::to_string(&payload)?;
    let token = codec.encrypt(&plaintext)?;

    let mut url = Url::parse(origin)?;
    url.set_path("/validate-magic-link");
    url.query_pairs_mut().append_pair("magic", &token);
    Ok(url.to_string())
}

/// Decode and validate the `magic` query parameter, in order: presence,
/// decryption, payload shape, expiry. The nonce comparison happens at the
/// call site because it needs the session.
pub fn parse_magic_link(
    codec: &MagicLinkCodec,
    magic: Option<&str>,
) -> Result<MagicLinkPayload, MagicLinkError> {
    let token = match magic {
        Some(token) if !token.is_empty() => token,
        _ => return Err(MagicLinkError::MissingParam),
    };

    let plaintext = codec
        .decrypt(token)
        .map_err(|_| MagicLinkError::InvalidLink)?;

    let payload: MagicLinkPayload =
        serde_json::from_str(&plaintext).map_err(|_| MagicLinkError::InvalidPayload)?;

    let expires_at = payload.created_at + Duration::seconds(MAGIC_LINK_TTL_SECONDS);
    if Utc::now() > expires_at {
        return Err(MagicLinkError::Expired);
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> MagicLinkCodec {
        MagicLinkCodec::new(&SecretString::from("magic-test-secret"))
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn encrypt_decrypt_roundtrip() {
        let codec = codec();
        let token = codec.encrypt("hello larder").unwrap();
        assert_ne!(token, "hello larder");
        assert_eq!(codec.decrypt(&token).unwrap(), "hello larder");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn decrypt_fails_on_tampered_token() {
        let codec = codec();
        let token = codec.encrypt("hello larder").unwrap();

        // Flip one character of the encoded ciphertext
        let mut tampered: Vec<char> = token.chars().collect();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();

        assert!(codec.decrypt(&tampered).is_err());
    }

    #[test]
    fn decrypt_fails_on_garbage() {
        let codec = codec();
        assert!(codec.decrypt("not base64 at all!!!").is_err());
        assert!(codec.decrypt("c2hvcnQ").is_err());
        assert!(codec.decrypt("").is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn decrypt_fails_with_wrong_key() {
        let token = codec().encrypt("hello larder").unwrap();
        let other = MagicLinkCodec::new(&SecretString::from("different-secret"));
        assert!(other.decrypt(&token).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn generated_link_roundtrips_payload() {
        let codec = codec();
        let before = Utc::now();
        let link =
            generate_magic_link(&codec, "https://larder.dev", "alice@example.com", "nonce-1")
                .unwrap();

        let url = Url::parse(&link).unwrap();
        assert_eq!(url.path(), "/validate-magic-link");
        let magic = url
            .query_pairs()
            .find(|(key, _)| key == "magic")
            .map(|(_, value)| value.into_owned())
            .unwrap();

        let payload = parse_magic_link(&codec, Some(&magic)).unwrap();
        assert_eq!(payload.email, "alice@example.com");
        assert_eq!(payload.nonce, "nonce-1");
        assert!(payload.created_at >= before);
        assert!(payload.created_at <= Utc::now());
    }

    #[test]
    fn parse_rejects_missing_param() {
        assert_eq!(
            parse_magic_link(&codec(), None),
            Err(MagicLinkError::MissingParam)
        );
        assert_eq!(
            parse_magic_link(&codec(), Some("")),
            Err(MagicLinkError::MissingParam)
        );
    }

    #[test]
    fn parse_rejects_undecryptable_token() {
        assert_eq!(
            parse_magic_link(&codec(), Some("AAAAAAAAAAAAAAAAAAAAAAAAAAAA")),
            Err(MagicLinkError::InvalidLink)
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn parse_rejects_wrong_shape() {
        let codec = codec();
        let token = codec.encrypt(r#"{"email":"a@b.co","nonce":"n"}"#).unwrap();
        assert_eq!(
            parse_magic_link(&codec, Some(&token)),
            Err(MagicLinkError::InvalidPayload)
        );

        let token = codec.encrypt("not json").unwrap();
        assert_eq!(
            parse_magic_link(&codec, Some(&token)),
            Err(MagicLinkError::InvalidPayload)
        );

        // createdAt must parse as a timestamp
        let token = codec
            .encrypt(r#"{"email":"a@b.co","nonce":"n","createdAt":"yesterday"}"#)
            .unwrap();
        assert_eq!(
            parse_magic_link(&codec, Some(&token)),
            Err(MagicLinkError::InvalidPayload)
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn parse_rejects_expired_payload() {
        let codec = codec();
        let payload = MagicLinkPayload {
            email: "alice@example.com".to_string(),
            nonce: "nonce-1".to_string(),
            created_at: Utc::now() - Duration::seconds(MAGIC_LINK_TTL_SECONDS + 60),
        };
        let token = codec.encrypt(&serde_json::to_string(&payload).unwrap()).unwrap();
        assert_eq!(
            parse_magic_link(&codec, Some(&token)),
            Err(MagicLinkError::Expired)
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn parse_accepts_payload_within_window() {
        let codec = codec();
        let payload = MagicLinkPayload {
            email: "alice@example.com".to_string(),
            nonce: "nonce-1".to_string(),
            created_at: Utc::now() - Duration::seconds(MAGIC_LINK_TTL_SECONDS - 60),
        };
        let token = codec.encrypt(&serde_json::to_string(&payload).unwrap()).unwrap();
        let parsed = parse_magic_link(&codec, Some(&token)).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn payload_serializes_created_at_as_iso8601() {
        let payload = MagicLinkPayload {
            email: "alice@example.com".to_string(),
            nonce: "nonce-1".to_string(),
            created_at: Utc::now(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&payload).unwrap()).unwrap();
        let created_at = value.get("createdAt").and_then(|v| v.as_str()).unwrap();
        assert!(DateTime::parse_from_rfc3339(created_at).is_ok());
    }
}
