//! Bearer sessions.
//!
//! The gateway mints HS256 tokens whose claims carry the platform identity:
//! `iss` is the core's numeric subject id, `aud` the username, `jti` the
//! opaque secret replayed to the core inside the RPC session string. The
//! signing key lives in one file and survives restarts; everything else
//! here is in-memory per process.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::{Config, DeploymentMode};
use crate::tfa;

const SIGNING_KEY_BYTES: usize = 32;
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed authorization header")]
    MalformedToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    TokenNotYetValid,
    #[error("invalid token")]
    InvalidToken,
    #[error("session secret mismatch")]
    SecretMismatch,
    #[error("second factor required")]
    TwoFactorRequired,
    #[error("second factor rejected")]
    TwoFactorRejected,
    #[error("signing key unavailable: {0}")]
    Key(String),
}

/// Wire claims. Every field is required; a token missing any of them fails
/// verification outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A verified session. The secret stays out of `Debug` output; only
/// [`Identity::session_string`] exposes it, on its way to the RPC layer.
#[derive(Clone)]
pub struct Identity {
    pub subject_id: String,
    pub username: String,
    secret: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Identity {
    pub fn session_string(&self) -> String {
        format!("{}:{}", self.username, self.secret)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject_id", &self.subject_id)
            .field("username", &self.username)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

#[derive(Debug, Clone)]
pub struct TfaEnrollment {
    pub secret: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default)]
struct TfaState {
    pending: Option<String>,
    enabled: Option<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    /// First-use registration of (username, secret); the replay guard.
    secrets: HashMap<String, String>,
    tfa: HashMap<String, TfaState>,
}

#[derive(Clone)]
pub struct SessionResolver {
    encoding: EncodingKey,
    decoding: DecodingKey,
    mode: DeploymentMode,
    token_ttl: i64,
    remember_ttl: i64,
    tfa_issuer: String,
    state: Arc<RwLock<SessionState>>,
}

impl SessionResolver {
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let key = load_or_generate_key(&config.signing_key_path)?;
        Ok(Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            mode: config.mode,
            token_ttl: config.token_ttl_seconds,
            remember_ttl: config.token_remember_ttl_seconds,
            tfa_issuer: config.tfa_issuer.clone(),
            state: Arc::new(RwLock::new(SessionState::default())),
        })
    }

    pub fn issue(
        &self,
        subject_id: &str,
        username: &str,
        secret: &str,
        remember: bool,
    ) -> Result<IssuedToken, SessionError> {
        let now = Utc::now().timestamp();
        let ttl = if remember {
            self.remember_ttl
        } else {
            self.token_ttl
        };
        let claims = TokenClaims {
            iss: subject_id.to_string(),
            aud: username.to_string(),
            jti: secret.to_string(),
            iat: now,
            exp: now + ttl,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| SessionError::InvalidToken)?;
        Ok(IssuedToken { token, claims })
    }

    /// Full request-level authentication: bearer extraction, signature and
    /// expiry verification, then the session registry cross-check.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, SessionError> {
        let token = extract_bearer_token(headers)?;
        let identity = self.verify_token(token)?;
        self.cross_check(&identity).await?;
        Ok(identity)
    }

    /// Headerless verification; the surface relay processes use to resolve
    /// a browser token to an identity before opening a zone connection.
    pub fn verify_token(&self, token: &str) -> Result<Identity, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        let decoded = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(map_decode_error)?;
        let claims = decoded.claims;
        if claims.iat > Utc::now().timestamp() {
            return Err(SessionError::TokenNotYetValid);
        }
        Ok(Identity {
            subject_id: claims.iss,
            username: claims.aud,
            secret: claims.jti,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    async fn cross_check(&self, identity: &Identity) -> Result<(), SessionError> {
        // Development deployments skip the guard so tokens minted before a
        // restart keep working.
        if self.mode.is_development() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        match state.secrets.get(&identity.username) {
            None => {
                state
                    .secrets
                    .insert(identity.username.clone(), identity.secret.clone());
                Ok(())
            }
            Some(registered) if *registered == identity.secret => Ok(()),
            Some(_) => Err(SessionError::SecretMismatch),
        }
    }

    /// Drops the registered secret and any second-factor state; logout.
    pub async fn forget(&self, username: &str) {
        let mut state = self.state.write().await;
        state.secrets.remove(username);
        state.tfa.remove(username);
    }

    pub async fn tfa_begin(&self, username: &str) -> TfaEnrollment {
        let secret = tfa::generate_secret();
        let uri = tfa::otpauth_uri(&self.tfa_issuer, username, &secret);
        let mut state = self.state.write().await;
        state.tfa.entry(username.to_string()).or_default().pending = Some(secret.clone());
        TfaEnrollment { secret, uri }
    }

    pub async fn tfa_confirm(&self, username: &str, code: &str) -> Result<(), SessionError> {
        let now = Utc::now().timestamp();
        let mut state = self.state.write().await;
        let entry = state.tfa.entry(username.to_string()).or_default();
        let Some(pending) = entry.pending.clone() else {
            return Err(SessionError::TwoFactorRejected);
        };
        if !tfa::verify(&pending, code, now) {
            return Err(SessionError::TwoFactorRejected);
        }
        entry.enabled = Some(pending);
        entry.pending = None;
        Ok(())
    }

    pub async fn tfa_disable(&self, username: &str) {
        let mut state = self.state.write().await;
        state.tfa.remove(username);
    }

    pub async fn tfa_enabled(&self, username: &str) -> bool {
        let state = self.state.read().await;
        state
            .tfa
            .get(username)
            .is_some_and(|entry| entry.enabled.is_some())
    }

    /// Login-time gate: passes silently when the account has no second
    /// factor, otherwise demands a valid code.
    pub async fn tfa_gate(&self, username: &str, code: Option<&str>) -> Result<(), SessionError> {
        let enabled = {
            let state = self.state.read().await;
            state.tfa.get(username).and_then(|entry| entry.enabled.clone())
        };
        let Some(secret) = enabled else {
            return Ok(());
        };
        let Some(code) = code else {
            return Err(SessionError::TwoFactorRequired);
        };
        if tfa::verify(&secret, code, Utc::now().timestamp()) {
            Ok(())
        } else {
            Err(SessionError::TwoFactorRejected)
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, SessionError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(SessionError::MissingToken)?;
    let value = header.to_str().map_err(|_| SessionError::MalformedToken)?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(SessionError::MalformedToken)?
        .trim();
    if token.is_empty() {
        return Err(SessionError::MalformedToken);
    }
    Ok(token)
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> SessionError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => SessionError::TokenExpired,
        ErrorKind::ImmatureSignature => SessionError::TokenNotYetValid,
        _ => SessionError::InvalidToken,
    }
}

fn load_or_generate_key(path: &Path) -> Result<Vec<u8>, SessionError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let key = hex::decode(content.trim())
                .map_err(|err| SessionError::Key(format!("unreadable key file: {err}")))?;
            if key.len() < SIGNING_KEY_BYTES {
                return Err(SessionError::Key("key file too short".to_string()));
            }
            Ok(key)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let mut key = vec![0u8; SIGNING_KEY_BYTES];
            rand::rng().fill_bytes(&mut key);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| SessionError::Key(format!("cannot create key dir: {err}")))?;
            }
            std::fs::write(path, hex::encode(&key))
                .map_err(|err| SessionError::Key(format!("cannot write key file: {err}")))?;
            restrict_permissions(path);
            tracing::info!(path = %path.display(), "generated a new signing key");
            Ok(key)
        }
        Err(err) => Err(SessionError::Key(format!("cannot read key file: {err}"))),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %err, "could not restrict key file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn resolver_in(dir: &TempDir) -> SessionResolver {
        SessionResolver::from_config(&Config::for_tests(dir.path())).unwrap()
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let issued = resolver.issue("7", "admin", "s3cret", false).unwrap();
        let identity = resolver.verify_token(&issued.token).unwrap();
        assert_eq!(identity.subject_id, "7");
        assert_eq!(identity.username, "admin");
        assert_eq!(identity.session_string(), "admin:s3cret");
        assert_eq!(identity.issued_at, issued.claims.iat);
        assert_eq!(identity.expires_at, issued.claims.exp);
    }

    #[test]
    fn remember_extends_the_ttl() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let short = resolver.issue("7", "admin", "s", false).unwrap();
        let long = resolver.issue("7", "admin", "s", true).unwrap();
        assert!(long.claims.exp > short.claims.exp);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: "7".to_string(),
            aud: "admin".to_string(),
            jti: "s".to_string(),
            iat: now - 600,
            exp: now - 60,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &resolver.encoding,
        )
        .unwrap();
        assert_eq!(
            resolver.verify_token(&token).unwrap_err(),
            SessionError::TokenExpired
        );
    }

    #[test]
    fn future_issue_times_are_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: "7".to_string(),
            aud: "admin".to_string(),
            jti: "s".to_string(),
            iat: now + 600,
            exp: now + 1200,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &resolver.encoding,
        )
        .unwrap();
        assert_eq!(
            resolver.verify_token(&token).unwrap_err(),
            SessionError::TokenNotYetValid
        );
    }

    #[test]
    fn tokens_from_another_key_are_rejected() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let resolver_a = resolver_in(&dir_a);
        let resolver_b = resolver_in(&dir_b);
        let issued = resolver_a.issue("7", "admin", "s", false).unwrap();
        assert_eq!(
            resolver_b.verify_token(&issued.token).unwrap_err(),
            SessionError::InvalidToken
        );
    }

    #[test]
    fn tokens_missing_claims_are_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let partial = serde_json::json!({
            "iss": "7",
            "aud": "admin",
            "exp": Utc::now().timestamp() + 600,
        });
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &partial,
            &resolver.encoding,
        )
        .unwrap();
        assert_eq!(
            resolver.verify_token(&token).unwrap_err(),
            SessionError::InvalidToken
        );
    }

    #[test]
    fn signing_key_survives_restarts() {
        let dir = TempDir::new().unwrap();
        let first = resolver_in(&dir);
        let issued = first.issue("7", "admin", "s", false).unwrap();
        let second = resolver_in(&dir);
        assert!(second.verify_token(&issued.token).is_ok());
        let stored = std::fs::read_to_string(dir.path().join("signing.key")).unwrap();
        assert_eq!(stored.trim().len(), SIGNING_KEY_BYTES * 2);
    }

    #[tokio::test]
    async fn replay_guard_registers_then_enforces() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let first = resolver.issue("7", "admin", "secret-one", false).unwrap();
        let second = resolver.issue("7", "admin", "secret-two", false).unwrap();

        assert!(resolver
            .authenticate(&bearer_headers(&first.token))
            .await
            .is_ok());
        assert!(resolver
            .authenticate(&bearer_headers(&first.token))
            .await
            .is_ok());
        assert_eq!(
            resolver
                .authenticate(&bearer_headers(&second.token))
                .await
                .unwrap_err(),
            SessionError::SecretMismatch
        );

        resolver.forget("admin").await;
        assert!(resolver
            .authenticate(&bearer_headers(&second.token))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn development_mode_skips_the_replay_guard() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::for_tests(dir.path());
        config.mode = DeploymentMode::Development;
        let resolver = SessionResolver::from_config(&config).unwrap();
        let first = resolver.issue("7", "admin", "secret-one", false).unwrap();
        let second = resolver.issue("7", "admin", "secret-two", false).unwrap();
        assert!(resolver
            .authenticate(&bearer_headers(&first.token))
            .await
            .is_ok());
        assert!(resolver
            .authenticate(&bearer_headers(&second.token))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn garbled_authorization_headers_are_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        assert_eq!(
            resolver.authenticate(&HeaderMap::new()).await.unwrap_err(),
            SessionError::MissingToken
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic dXNlcjpwYXNz".parse().unwrap(),
        );
        assert_eq!(
            resolver.authenticate(&headers).await.unwrap_err(),
            SessionError::MalformedToken
        );
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(
            resolver.authenticate(&headers).await.unwrap_err(),
            SessionError::MalformedToken
        );
    }

    #[tokio::test]
    async fn tfa_enrollment_confirms_and_gates() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let now = Utc::now().timestamp();

        // Nothing enrolled: the gate is open.
        assert!(resolver.tfa_gate("admin", None).await.is_ok());

        let enrollment = resolver.tfa_begin("admin").await;
        assert!(enrollment.uri.contains("otpauth://totp/"));
        // Pending enrollment does not gate logins yet.
        assert!(resolver.tfa_gate("admin", None).await.is_ok());

        let code = tfa::code_at(&enrollment.secret, now).unwrap();
        assert_eq!(
            resolver.tfa_confirm("admin", "000000").await.unwrap_err(),
            SessionError::TwoFactorRejected
        );
        resolver.tfa_confirm("admin", &code).await.unwrap();
        assert!(resolver.tfa_enabled("admin").await);

        assert_eq!(
            resolver.tfa_gate("admin", None).await.unwrap_err(),
            SessionError::TwoFactorRequired
        );
        assert_eq!(
            resolver.tfa_gate("admin", Some("999999")).await.unwrap_err(),
            SessionError::TwoFactorRejected
        );
        let fresh = tfa::code_at(&enrollment.secret, Utc::now().timestamp()).unwrap();
        assert!(resolver.tfa_gate("admin", Some(&fresh)).await.is_ok());

        resolver.tfa_disable("admin").await;
        assert!(resolver.tfa_gate("admin", None).await.is_ok());
    }
}
