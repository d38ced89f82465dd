//! Shared-password admin sessions carried in a signed `admin` cookie.
//!
//! There is no user entity: a session is a single capability. The cookie
//! value is `granted.<epoch>.<expires_at>` signed with HMAC-SHA256. Logging
//! out from a valid session rotates the epoch, which revokes every cookie
//! issued before it.

use axum::http::{HeaderMap, header::COOKIE};
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, CookieJar, Key, SameSite};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256, Sha512};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "admin";
const SESSION_CLAIM: &str = "granted";
const KEY_CONTEXT: &[u8] = b"clinic-gallery/session-key\0";

pub fn session_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Incorrect password")]
    InvalidCredential,
    #[error("admin login is not configured")]
    NotConfigured,
    #[error("session cookie could not be signed")]
    SigningFailed,
}

/// Why a request did not carry a usable session. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    Missing,
    BadSignature,
    Malformed,
    Revoked,
    Expired,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub admin_password: Option<SecretString>,
    /// Signing secret; falls back to `admin_password` when unset.
    pub session_secret: Option<SecretString>,
    pub cookie_secure: bool,
}

#[derive(Clone)]
pub struct SessionAuthenticator {
    inner: Arc<Inner>,
}

struct Inner {
    password_digest: Option<[u8; 32]>,
    key: Key,
    epoch: RwLock<Uuid>,
    cookie_secure: bool,
}

impl SessionAuthenticator {
    pub fn new(config: SessionConfig) -> Self {
        let password_digest = config
            .admin_password
            .as_ref()
            .map(|secret| sha256(secret.expose_secret().as_bytes()));

        let key_material = config
            .session_secret
            .as_ref()
            .or(config.admin_password.as_ref())
            .map(|secret| secret.expose_secret().as_bytes().to_vec())
            .unwrap_or_else(|| Uuid::new_v4().as_bytes().to_vec());

        if password_digest.is_none() {
            tracing::warn!("ADMIN_PASSWORD is not set; admin login is disabled");
        }

        Self {
            inner: Arc::new(Inner {
                password_digest,
                key: derive_key(&key_material),
                epoch: RwLock::new(Uuid::new_v4()),
                cookie_secure: config.cookie_secure,
            }),
        }
    }

    /// Check `password` against the configured secret and, on a match, issue
    /// a session cookie valid for 24 hours.
    pub fn login(&self, password: &str) -> Result<Cookie<'static>, AuthError> {
        let expected = self
            .inner
            .password_digest
            .as_ref()
            .ok_or(AuthError::NotConfigured)?;
        let candidate = sha256(password.as_bytes());
        if bool::from(candidate.as_slice().ct_eq(expected.as_slice())) {
            self.issue_session(Utc::now())
        } else {
            Err(AuthError::InvalidCredential)
        }
    }

    /// Always returns the clearing cookie. A valid session on the request also
    /// rotates the epoch so replayed copies stop working; an anonymous logout
    /// cannot revoke somebody else's session.
    pub fn logout(&self, headers: &HeaderMap) -> Cookie<'static> {
        if self.authorize(headers) {
            *self.inner.epoch.write() = Uuid::new_v4();
            tracing::info!("admin session revoked");
        }
        self.removal_cookie()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        self.verify_at(headers, Utc::now()).is_ok()
    }

    /// Validate the session cookie on `headers` as of `now`.
    pub fn verify_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Result<(), SessionRejection> {
        let jar = parse_cookies(headers);
        if jar.get(SESSION_COOKIE_NAME).is_none() {
            return Err(SessionRejection::Missing);
        }
        let cookie = jar
            .signed(&self.inner.key)
            .get(SESSION_COOKIE_NAME)
            .ok_or(SessionRejection::BadSignature)?;

        let mut parts = cookie.value().split('.');
        let (claim, epoch, expires_at) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(claim), Some(epoch), Some(expires_at), None) => (claim, epoch, expires_at),
            _ => return Err(SessionRejection::Malformed),
        };
        if claim != SESSION_CLAIM {
            return Err(SessionRejection::Malformed);
        }
        let epoch = Uuid::try_parse(epoch).map_err(|_| SessionRejection::Malformed)?;
        let expires_at = expires_at
            .parse::<i64>()
            .map_err(|_| SessionRejection::Malformed)?;

        if epoch != *self.inner.epoch.read() {
            return Err(SessionRejection::Revoked);
        }
        if now.timestamp() >= expires_at {
            return Err(SessionRejection::Expired);
        }
        Ok(())
    }

    fn issue_session(&self, now: DateTime<Utc>) -> Result<Cookie<'static>, AuthError> {
        let ttl = session_ttl();
        let epoch = *self.inner.epoch.read();
        let value = format!(
            "{}.{}.{}",
            SESSION_CLAIM,
            epoch.simple(),
            (now + ttl).timestamp()
        );
        let cookie = self.cookie_template(value, ttl.num_seconds());

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.inner.key).add(cookie);
        jar.delta().next().cloned().ok_or(AuthError::SigningFailed)
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        self.cookie_template(String::new(), 0)
    }

    fn cookie_template(&self, value: String, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, value))
            .http_only(true)
            .secure(self.inner.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(cookie::time::Duration::seconds(max_age_secs))
            .build()
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// 64 bytes of signing key material stretched from an arbitrary-length secret.
fn derive_key(secret: &[u8]) -> Key {
    let mut hasher = Sha512::new();
    hasher.update(KEY_CONTEXT);
    hasher.update(secret);
    Key::from(hasher.finalize().as_slice())
}

/// Collect every cookie from every `Cookie` header. Unparseable headers and
/// chunks are skipped; later duplicates win.
pub fn parse_cookies(headers: &HeaderMap) -> CookieJar {
    let mut cookies = CookieJar::new();
    for header in headers.get_all(COOKIE) {
        let raw_str = match header.to_str() {
            Ok(string) => string,
            Err(_) => continue,
        };
        for chunk in raw_str.split(';').map(|s| s.trim()) {
            if let Ok(cookie) = Cookie::parse(chunk) {
                cookies.add_original(cookie.into_owned());
            }
        }
    }
    cookies
}
