use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::ApiError, state::AppState, users::repo_types::User};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Reset,
}

/// Claims carry identity and role at issuance time; a later role change is
/// not reflected until the token expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            session_ttl_minutes,
            reset_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            session_ttl: Duration::from_secs((session_ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((reset_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, user: &User, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Session => self.session_ttl,
            TokenKind::Reset => self.reset_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    /// 30-day bearer token returned by signup/signin/profile update.
    pub fn sign_session(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Session)
    }

    /// 10-minute token embedded in the password-reset email link.
    pub fn sign_reset(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Reset)
    }

    /// Malformed and expired tokens fail the same way; callers only learn
    /// that the token is not acceptable.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_reset(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Reset {
            anyhow::bail!("not a reset token");
        }
        Ok(claims)
    }
}

/// Authentication gate: requires a valid `Authorization: Bearer` session
/// token and attaches the decoded claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("No Token"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Token"))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(ApiError::unauthorized("Invalid Token"));
            }
        };

        if claims.kind != TokenKind::Session {
            return Err(ApiError::unauthorized("Invalid Token"));
        }

        Ok(AuthUser(claims))
    }
}

/// Authorization gate: authentication plus the admin flag baked into the
/// claims. Rejections stay 401 to match the existing wire contract.
pub struct AdminUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_admin {
            return Err(ApiError::unauthorized("Invalid Admin Token"));
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    fn make_user(is_admin: bool) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password_hash: "hash".into(),
            is_admin,
            reset_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn parts_with_header(value: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn sign_and_verify_session_token() {
        let keys = make_keys();
        let user = make_user(true);
        let token = keys.sign_session(&user).expect("sign session");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.name, "Ann");
        assert_eq!(claims.email, "ann@x.com");
        assert!(claims.is_admin);
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[tokio::test]
    async fn sign_and_verify_reset_token() {
        let keys = make_keys();
        let user = make_user(false);
        let token = keys.sign_reset(&user).expect("sign reset");
        let claims = keys.verify_reset(&token).expect("verify reset");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.kind, TokenKind::Reset);
    }

    #[tokio::test]
    async fn verify_reset_rejects_session_token() {
        let keys = make_keys();
        let token = keys.sign_session(&make_user(false)).expect("sign session");
        let err = keys.verify_reset(&token).unwrap_err();
        assert!(err.to_string().contains("not a reset token"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_secret() {
        let keys = make_keys();
        let token = keys.sign_session(&make_user(false)).expect("sign session");
        let other = JwtKeys {
            decoding: DecodingKey::from_secret(b"other-secret"),
            ..keys
        };
        assert!(other.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let user = make_user(false);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: user.id,
            name: user.name,
            email: user.email,
            is_admin: false,
            iat: (now - 600) as usize,
            exp: (now - 120) as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Session,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn auth_user_rejects_missing_header() {
        let state = AppState::fake();
        let mut parts = parts_with_header(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "No Token");
    }

    #[tokio::test]
    async fn auth_user_rejects_garbage_token() {
        let state = AppState::fake();
        let mut parts = parts_with_header(Some("Bearer not.a.jwt".into()));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid Token");
    }

    #[tokio::test]
    async fn auth_user_rejects_reset_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_reset(&make_user(false)).expect("sign reset");
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.message, "Invalid Token");
    }

    #[tokio::test]
    async fn auth_user_accepts_session_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = make_user(false);
        let token = keys.sign_session(&user).expect("sign session");
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));
        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("should authenticate");
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn admin_user_rejects_non_admin() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_session(&make_user(false)).expect("sign session");
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid Admin Token");
    }

    #[tokio::test]
    async fn admin_user_accepts_admin() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = make_user(true);
        let token = keys.sign_session(&user).expect("sign session");
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));
        let AdminUser(claims) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .expect("should authorize");
        assert!(claims.is_admin);
    }
}
