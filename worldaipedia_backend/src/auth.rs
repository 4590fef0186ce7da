//! Email/password authentication and the per-request session extractors.
//!
//! There is no ambient signed-in user anywhere: handlers declare the
//! access level they need (`AuthSession`, `ProSession`, `AdminSession`)
//! and receive the loaded profile as an argument. Tokens are opaque
//! bearer strings; the store only ever sees their sha-256 digest.

use crate::api::{ApiError, AppState};
use crate::models::{collections, Account, Session, User};
use crate::store::{Query, Store};
use crate::utils::looks_like_email;
use anyhow::{anyhow, bail, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine as _};
use chrono::{Duration, Utc};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;
const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Clone)]
pub struct AuthService {
    store: Store,
    session_ttl_hours: i64,
}

/// Slim identity handed back by signup/signin; credentials stay inside.
#[derive(Debug, Clone)]
pub struct AccountIdentity {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

impl AuthService {
    pub fn new(store: Store, session_ttl_hours: i64) -> Self {
        Self {
            store,
            session_ttl_hours,
        }
    }

    pub fn signup(&self, email: &str, password: &str) -> Result<AccountIdentity> {
        let email = email.trim().to_ascii_lowercase();
        if !looks_like_email(&email) {
            bail!("invalid email address");
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            bail!("password must be at least {MIN_PASSWORD_CHARS} characters");
        }
        if self.find_account(&email)?.is_some() {
            bail!("email is already registered");
        }
        let account = Account {
            uid: Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        self.store.set(
            collections::ACCOUNTS,
            &account.uid,
            serde_json::to_value(&account)?,
        )?;
        Ok(AccountIdentity {
            uid: account.uid,
            email,
        })
    }

    /// `None` means the credentials did not match; the caller decides how
    /// to phrase the 401.
    pub fn signin(&self, email: &str, password: &str) -> Result<Option<AccountIdentity>> {
        let email = email.trim().to_ascii_lowercase();
        let Some(account) = self.find_account(&email)? else {
            return Ok(None);
        };
        if !verify_password(password, &account.password_hash)? {
            return Ok(None);
        }
        Ok(Some(AccountIdentity {
            uid: account.uid,
            email: account.email,
        }))
    }

    pub fn issue_session(&self, uid: &str) -> Result<IssuedToken> {
        let mut raw = [0u8; TOKEN_BYTES];
        thread_rng().fill_bytes(&mut raw);
        let token = BASE64_URL.encode(raw);
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.session_ttl_hours);
        let session = Session {
            uid: uid.to_string(),
            created_at: now,
            expires_at,
        };
        self.store.set(
            collections::SESSIONS,
            &token_digest(&token),
            serde_json::to_value(&session)?,
        )?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Resolves a bearer token to a uid. Expired sessions are removed on
    /// sight and report as absent.
    pub fn authenticate(&self, token: &str) -> Result<Option<String>> {
        let digest = token_digest(token);
        let Some(doc) = self.store.get(collections::SESSIONS, &digest)? else {
            return Ok(None);
        };
        let session: Session = doc.decode()?;
        if session.expires_at <= Utc::now() {
            self.store.delete(collections::SESSIONS, &digest)?;
            return Ok(None);
        }
        Ok(Some(session.uid))
    }

    pub fn revoke(&self, token: &str) -> Result<bool> {
        Ok(self.store.delete(collections::SESSIONS, &token_digest(token))?)
    }

    fn find_account(&self, email: &str) -> Result<Option<Account>> {
        let docs = self
            .store
            .query(Query::collection(collections::ACCOUNTS).filter("email", email))?;
        match docs.into_iter().next() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|err| anyhow!("stored credential is malformed: {err}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn token_digest(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    hash.iter().map(|byte| format!("{byte:02x}")).collect()
}

// ----------------------------------------------------------------------
// Request extractors

/// Any signed-in member.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// A member with PRO entitlements (subscribed, or an admin).
#[derive(Debug, Clone)]
pub struct ProSession(pub User);

/// An admin.
#[derive(Debug, Clone)]
pub struct AdminSession(pub User);

fn bearer_token(parts: &Parts) -> Result<String, ApiError> {
    let header_value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed authorization header".into()))?;
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".into()))?;
    Ok(token.trim().to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)?;
        let uid = state
            .auth_service()
            .authenticate(&token)
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::Unauthorized("session expired or unknown".into()))?;
        let user = state
            .account_service()
            .get_user(&uid)
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::Unauthorized("profile missing for session".into()))?;
        Ok(AuthSession { user, token })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ProSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = AuthSession::from_request_parts(parts, state).await?;
        if !session.user.is_pro() {
            return Err(ApiError::PermissionDenied(
                "a PRO subscription is required".into(),
            ));
        }
        Ok(ProSession(session.user))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = AuthSession::from_request_parts(parts, state).await?;
        if !session.user.is_admin {
            return Err(ApiError::PermissionDenied("admin access required".into()));
        }
        Ok(AdminSession(session.user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> AuthService {
        AuthService::new(Store::in_memory().expect("store"), 24)
    }

    #[test]
    fn signup_then_signin_round_trip() {
        let service = setup_service();
        let created = service.signup("Ada@Example.com", "correct horse").unwrap();
        assert_eq!(created.email, "ada@example.com");

        let found = service
            .signin("ada@example.com", "correct horse")
            .unwrap()
            .expect("credentials accepted");
        assert_eq!(found.uid, created.uid);

        assert!(service
            .signin("ada@example.com", "wrong password")
            .unwrap()
            .is_none());
        assert!(service.signin("ghost@example.com", "x").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let service = setup_service();
        service.signup("ada@example.com", "correct horse").unwrap();
        assert!(service.signup("ADA@example.com", "other secret").is_err());
    }

    #[test]
    fn weak_password_and_bad_email_are_rejected() {
        let service = setup_service();
        assert!(service.signup("ada@example.com", "short").is_err());
        assert!(service.signup("not-an-email", "correct horse").is_err());
    }

    #[test]
    fn sessions_authenticate_until_revoked() {
        let service = setup_service();
        let account = service.signup("ada@example.com", "correct horse").unwrap();
        let issued = service.issue_session(&account.uid).unwrap();

        assert_eq!(
            service.authenticate(&issued.token).unwrap().as_deref(),
            Some(account.uid.as_str())
        );
        assert!(service.revoke(&issued.token).unwrap());
        assert!(service.authenticate(&issued.token).unwrap().is_none());
        assert!(!service.revoke(&issued.token).unwrap());
    }

    #[test]
    fn expired_sessions_are_dropped_on_sight() {
        let service = setup_service();
        let session = Session {
            uid: "u1".into(),
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Utc::now() - Duration::hours(1),
        };
        service
            .store
            .set(
                collections::SESSIONS,
                &token_digest("stale"),
                serde_json::to_value(&session).unwrap(),
            )
            .unwrap();
        assert!(service.authenticate("stale").unwrap().is_none());
        // Removed, not just hidden.
        assert!(service
            .store
            .get(collections::SESSIONS, &token_digest("stale"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn tokens_are_stored_only_as_digests() {
        let service = setup_service();
        let account = service.signup("ada@example.com", "correct horse").unwrap();
        let issued = service.issue_session(&account.uid).unwrap();
        assert!(service
            .store
            .get(collections::SESSIONS, &issued.token)
            .unwrap()
            .is_none());
    }
}
