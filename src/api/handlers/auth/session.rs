//! Signed session cookie adapter.
//!
//! The session is a small string map (in practice only `nonce` and `userId`)
//! serialized to JSON, base64url-encoded, and signed with HMAC-SHA256. The
//! cookie value is `payload.signature`. A missing cookie, a parse failure, or
//! a bad signature all yield a fresh empty session rather than an error, so
//! a tampered cookie simply logs the user out.
//!
//! Mutations are purely in-memory; nothing reaches the client until the
//! caller commits the session and attaches the resulting `Set-Cookie` header
//! to a response.

use anyhow::{Result, anyhow};
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const SESSION_COOKIE_NAME: &str = "larder_session";

/// Session key holding the login-attempt nonce.
pub const KEY_NONCE: &str = "nonce";
/// Session key holding the authenticated user id.
pub const KEY_USER_ID: &str = "userId";

type HmacSha256 = Hmac<Sha256>;

/// In-memory session values. `BTreeMap` keeps the serialized payload stable
/// for a given set of values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    values: BTreeMap<String, String>,
}

impl Session {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reads and writes the signed session cookie.
pub struct SessionStore {
    key: [u8; 32],
    cookie_secure: bool,
    ttl_seconds: i64,
}

impl SessionStore {
    /// The signing key is derived from the configured secret with SHA-256 so
    /// operators can use an arbitrary-length secret string.
    #[must_use]
    pub fn new(secret: &SecretString, cookie_secure: bool, ttl_seconds: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.expose_secret().as_bytes());
        let key: [u8; 32] = hasher.finalize().into();
        Self {
            key,
            cookie_secure,
            ttl_seconds,
        }
    }

    /// Read the session from request headers. Any failure (missing cookie,
    /// bad encoding, bad signature) yields a fresh empty session.
    #[must_use]
    pub fn read(&self, headers: &HeaderMap) -> Session {
        let Some(token) = extract_session_cookie(headers) else {
            return Session::default();
        };
        self.verify(&token).unwrap_or_default()
    }

    /// Serialize and sign the session into a `Set-Cookie` header value.
    ///
    /// # Errors
    /// Returns an error if signing or header construction fails.
    pub fn commit(&self, session: &Session) -> Result<HeaderValue> {
        let token = self.sign(session)?;
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl_seconds
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e| anyhow!("Failed to build session cookie: {e}"))
    }

    /// Expire the cookie immediately (logout).
    ///
    /// # Errors
    /// Returns an error if header construction fails.
    pub fn clear(&self) -> Result<HeaderValue> {
        let mut cookie =
            format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e| anyhow!("Failed to build session cookie: {e}"))
    }

    fn sign(&self, session: &Session) -> Result<String> {
        let payload = serde_json::to_string(&session.values)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.as_bytes());

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Failed to initialize cookie signer: {e}"))?;
        mac.update(payload_b64.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload_b64}.{signature}"))
    }

    fn verify(&self, token: &str) -> Option<Session> {
        let (payload_b64, signature_b64) = token.split_once('.')?;

        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(payload_b64.as_bytes());
        let signature = URL_SAFE_NO_PAD.decode(signature_b64.as_bytes()).ok()?;
        mac.verify_slice(&signature).ok()?;

        let payload = URL_SAFE_NO_PAD.decode(payload_b64.as_bytes()).ok()?;
        let values: BTreeMap<String, String> = serde_json::from_slice(&payload).ok()?;
        Some(Session { values })
    }
}

fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(&SecretString::from("cookie-test-secret"), false, 604_800)
    }

    /// Turn a `Set-Cookie` value back into a request `Cookie` header.
    #[allow(clippy::unwrap_used)]
    fn request_headers(set_cookie: &HeaderValue) -> HeaderMap {
        let cookie_pair = set_cookie
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&cookie_pair).unwrap());
        headers
    }

    #[test]
    fn read_without_cookie_is_empty() {
        let session = store().read(&HeaderMap::new());
        assert!(session.is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn set_commit_read_roundtrip() {
        let store = store();
        let mut session = Session::default();
        session.set(KEY_NONCE, "nonce-1");
        session.set(KEY_USER_ID, "user-1");

        let cookie = store.commit(&session).unwrap();
        let restored = store.read(&request_headers(&cookie));

        assert_eq!(restored, session);
        assert_eq!(restored.get(KEY_NONCE), Some("nonce-1"));
        assert_eq!(restored.get(KEY_USER_ID), Some("user-1"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn unset_removes_value() {
        let store = store();
        let mut session = Session::default();
        session.set(KEY_NONCE, "nonce-1");
        session.unset(KEY_NONCE);

        let cookie = store.commit(&session).unwrap();
        let restored = store.read(&request_headers(&cookie));
        assert_eq!(restored.get(KEY_NONCE), None);
        assert!(restored.is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn tampered_payload_yields_empty_session() {
        let store = store();
        let mut session = Session::default();
        session.set(KEY_USER_ID, "user-1");

        let cookie = store.commit(&session).unwrap();
        let cookie_str = cookie.to_str().unwrap();
        let token = cookie_str
            .split(';')
            .next()
            .unwrap()
            .trim_start_matches(&format!("{SESSION_COOKIE_NAME}="));
        let (payload, signature) = token.split_once('.').unwrap();

        // Forge a different payload but keep the original signature
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"userId":"user-2"}"#);
        let forged = format!("{SESSION_COOKIE_NAME}={forged_payload}.{signature}");
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&forged).unwrap());
        assert!(store.read(&headers).is_empty());

        // Corrupt the signature instead
        let corrupt = format!("{SESSION_COOKIE_NAME}={payload}.AAAA");
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&corrupt).unwrap());
        assert!(store.read(&headers).is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn garbage_cookie_yields_empty_session() {
        let store = store();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("larder_session=definitely-not-signed"),
        );
        assert!(store.read(&headers).is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn wrong_secret_yields_empty_session() {
        let mut session = Session::default();
        session.set(KEY_USER_ID, "user-1");
        let cookie = store().commit(&session).unwrap();

        let other = SessionStore::new(&SecretString::from("other-secret"), false, 604_800);
        assert!(other.read(&request_headers(&cookie)).is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn cookie_attributes() {
        let store = store();
        let cookie = store.commit(&Session::default()).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("larder_session="));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=604800"));
        assert!(value.contains("Path=/"));
        assert!(!value.contains("Secure"));

        let secure_store =
            SessionStore::new(&SecretString::from("cookie-test-secret"), true, 3600);
        let cookie = secure_store.commit(&Session::default()).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.contains("Max-Age=3600"));
        assert!(value.contains("Secure"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn clear_expires_cookie() {
        let cookie = store().clear().unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("larder_session=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn cookie_extracted_among_other_cookies() {
        let store = store();
        let mut session = Session::default();
        session.set(KEY_NONCE, "nonce-1");
        let cookie = store.commit(&session).unwrap();
        let pair = cookie.to_str().unwrap().split(';').next().unwrap().to_string();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {pair}; lang=en")).unwrap(),
        );
        assert_eq!(store.read(&headers).get(KEY_NONCE), Some("nonce-1"));
    }
}
