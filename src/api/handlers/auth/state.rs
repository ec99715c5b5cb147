//! Auth state and configuration.

use secrecy::SecretString;

use super::magic_link::MagicLinkCodec;
use super::session::SessionStore;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone)]
pub struct AuthConfig {
    origin: String,
    magic_link_secret: SecretString,
    session_secret: SecretString,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(
        origin: String,
        magic_link_secret: SecretString,
        session_secret: SecretString,
    ) -> Self {
        Self {
            origin,
            magic_link_secret,
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub(super) fn magic_link_secret(&self) -> &SecretString {
        &self.magic_link_secret
    }

    pub(super) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.origin.starts_with("https://")
    }
}

/// Shared auth state: configuration plus the payload codec and cookie store
/// derived from it, built once at startup.
pub struct AuthState {
    config: AuthConfig,
    codec: MagicLinkCodec,
    sessions: SessionStore,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let codec = MagicLinkCodec::new(config.magic_link_secret());
        let sessions = SessionStore::new(
            config.session_secret(),
            config.session_cookie_secure(),
            config.session_ttl_seconds(),
        );
        Self {
            config,
            codec,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &MagicLinkCodec {
        &self.codec
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(origin: &str) -> AuthConfig {
        AuthConfig::new(
            origin.to_string(),
            SecretString::from("magic-test-secret"),
            SecretString::from("cookie-test-secret"),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config("https://larder.dev");
        assert_eq!(config.origin(), "https://larder.dev");
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);

        let config = config.with_session_ttl_seconds(3600);
        assert_eq!(config.session_ttl_seconds(), 3600);
    }

    #[test]
    fn cookie_secure_follows_origin_scheme() {
        assert!(config("https://larder.dev").session_cookie_secure());
        assert!(!config("http://localhost:3000").session_cookie_secure());
    }

    #[test]
    fn auth_state_derives_codec_and_store() {
        let state = AuthState::new(config("https://larder.dev"));
        assert_eq!(state.config().origin(), "https://larder.dev");

        // Codec and store must be usable straight from the state.
        let session = state.sessions().read(&axum::http::HeaderMap::new());
        assert!(session.is_empty());
        let token = state.codec().encrypt("payload");
        assert!(token.is_ok());
    }
}
