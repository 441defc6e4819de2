use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// JWT payload. `jti` is present on refresh tokens only; it is the
/// identifier the rotation bookkeeping tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
    #[error("malformed token")]
    Malformed,
}

/// A freshly signed refresh token together with the bookkeeping data
/// that must be persisted before the token is handed out.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            access_ttl_minutes,
            refresh_ttl_days,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_days as u64) * 24 * 60 * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        jti: Option<Uuid>,
    ) -> anyhow::Result<(String, OffsetDateTime)> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok((token, exp))
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (token, _) = self.sign_with_kind(user_id, TokenKind::Access, None)?;
        Ok(token)
    }

    /// Sign a refresh token with a fresh `jti`.
    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<RefreshGrant> {
        let jti = Uuid::new_v4();
        let (token, expires_at) = self.sign_with_kind(user_id, TokenKind::Refresh, Some(jti))?;
        Ok(RefreshGrant {
            token,
            jti,
            expires_at,
        })
    }

    /// Verify signature, expiry, issuer/audience, and token kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;
        if data.claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        if expected == TokenKind::Refresh && data.claims.jti.is_none() {
            return Err(TokenError::Malformed);
        }
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).expect("sign access");
        let claims = keys.verify(&token, TokenKind::Access).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.jti, None);
    }

    #[tokio::test]
    async fn refresh_tokens_carry_unique_jtis() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let a = keys.sign_refresh(user_id).expect("sign refresh");
        let b = keys.sign_refresh(user_id).expect("sign refresh");
        assert_ne!(a.jti, b.jti);

        let claims = keys.verify(&a.token, TokenKind::Refresh).expect("verify refresh");
        assert_eq!(claims.jti, Some(a.jti));
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn verify_rejects_wrong_kind_both_ways() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();

        let access = keys.sign_access(user_id).expect("sign access");
        assert_eq!(
            keys.verify(&access, TokenKind::Refresh).unwrap_err(),
            TokenError::WrongKind
        );

        let refresh = keys.sign_refresh(user_id).expect("sign refresh");
        assert_eq!(
            keys.verify(&refresh.token, TokenKind::Access).unwrap_err(),
            TokenError::WrongKind
        );
    }

    #[tokio::test]
    async fn verify_rejects_garbage_as_malformed() {
        let keys = make_keys();
        assert_eq!(
            keys.verify("not-a-token", TokenKind::Access).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[tokio::test]
    async fn verify_rejects_tampered_signature() {
        let keys = make_keys();
        let token = keys.sign_access(Uuid::new_v4()).expect("sign access");
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert_eq!(
            keys.verify(&tampered, TokenKind::Access).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - TimeDuration::hours(2)).unix_timestamp() as usize,
            exp: (now - TimeDuration::hours(1)).unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
            jti: None,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert_eq!(
            keys.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::Expired
        );
    }

    #[tokio::test]
    async fn verify_rejects_foreign_issuer() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: (now + TimeDuration::hours(1)).unix_timestamp() as usize,
            iss: "someone-else".into(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
            jti: None,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert_eq!(
            keys.verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::Malformed
        );
    }
}
