use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::{JwtKeys, RefreshGrant, TokenKind},
        password::PasswordHasher,
        repo::{is_unique_violation, RefreshTokenRecord, User},
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,30}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Complexity policy for new passwords. Each violation names the rule
/// that failed; the first one found wins.
pub(crate) fn validate_password(password: &str) -> ApiResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(ApiError::Validation(
            "Password must contain at least one uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(ApiError::Validation(
            "Password must contain at least one lowercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation(
            "Password must contain at least one digit".into(),
        ));
    }
    Ok(())
}

/// Registration, login, refresh rotation, and logout. Constructed with
/// its store and codec dependencies; handlers get one via `FromRef`.
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    keys: JwtKeys,
    hasher: PasswordHasher,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            JwtKeys::from_ref(state),
            state.hasher.clone(),
        )
    }
}

impl AuthService {
    pub fn new(db: PgPool, keys: JwtKeys, hasher: PasswordHasher) -> Self {
        Self { db, keys, hasher }
    }

    /// Sign a fresh access/refresh pair and persist the refresh jti so
    /// replay of the token can be detected later.
    async fn issue_pair(&self, user_id: Uuid) -> ApiResult<(String, RefreshGrant)> {
        let access = self.keys.sign_access(user_id)?;
        let grant = self.keys.sign_refresh(user_id)?;
        RefreshTokenRecord::insert(&self.db, grant.jti, user_id, grant.expires_at).await?;
        Ok((access, grant))
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> ApiResult<(User, String, RefreshGrant)> {
        let email = email.trim().to_lowercase();

        if !is_valid_email(&email) {
            return Err(ApiError::Validation("Invalid email address".into()));
        }
        if !is_valid_username(username) {
            return Err(ApiError::Validation(
                "Username must be 3-30 characters of letters, digits, or underscores".into(),
            ));
        }
        validate_password(password)?;

        if User::find_by_email(&self.db, &email).await?.is_some() {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        if User::find_by_username(&self.db, username).await?.is_some() {
            return Err(ApiError::Conflict("Username already taken".into()));
        }

        let hash = self.hasher.hash(password)?;

        let user = User::create(&self.db, &email, username, &hash)
            .await
            .map_err(|e| {
                // Lost race against a concurrent signup.
                if is_unique_violation(&e) {
                    ApiError::Conflict("Email or username already registered".into())
                } else {
                    ApiError::Internal(e)
                }
            })?;

        let (access, grant) = self.issue_pair(user.id).await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok((user, access, grant))
    }

    /// Absent user and wrong password produce the identical failure so
    /// the response cannot be used to enumerate accounts.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> ApiResult<(User, String, RefreshGrant)> {
        let email = email.trim().to_lowercase();

        if !is_valid_email(&email) {
            return Err(ApiError::Validation("Invalid email address".into()));
        }

        let user = match User::find_by_email(&self.db, &email).await? {
            Some(user) => user,
            None => {
                warn!("login failed: unknown email");
                return Err(ApiError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login failed: password mismatch");
            return Err(ApiError::InvalidCredentials);
        }

        let (access, grant) = self.issue_pair(user.id).await?;

        info!(user_id = %user.id, "user logged in");
        Ok((user, access, grant))
    }

    /// Rotation: consume the presented token's jti exactly once and
    /// mint a new pair. Expired, forged, wrong-kind, replayed, and
    /// orphaned tokens all fail the same way.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<(String, RefreshGrant)> {
        let claims = self
            .keys
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                warn!(error = %e, "refresh rejected");
                ApiError::InvalidRefreshToken
            })?;
        let jti = claims.jti.ok_or(ApiError::InvalidRefreshToken)?;

        let user_id = match RefreshTokenRecord::consume(&self.db, jti).await? {
            Some(user_id) => user_id,
            None => {
                warn!(user_id = %claims.sub, %jti, "refresh token replayed or unknown");
                return Err(ApiError::InvalidRefreshToken);
            }
        };

        // The owner must still be a live account.
        let user = User::find_by_id(&self.db, user_id)
            .await?
            .ok_or(ApiError::InvalidRefreshToken)?;

        let pair = self.issue_pair(user.id).await?;
        info!(user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    /// Consume the token's jti if it is still live. Logging out twice,
    /// or with a token that never was valid, is not an error.
    pub async fn logout(&self, refresh_token: &str) -> ApiResult<()> {
        if let Ok(claims) = self.keys.verify(refresh_token, TokenKind::Refresh) {
            if let Some(jti) = claims.jti {
                RefreshTokenRecord::consume(&self.db, jti).await?;
                info!(user_id = %claims.sub, "user logged out");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email(&format!("{}@x.com", "a".repeat(250))));
    }

    #[test]
    fn username_validation() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a_1"));
        assert!(is_valid_username(&"a".repeat(30)));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username(&"a".repeat(31)));
        assert!(!is_valid_username("bad name"));
        assert!(!is_valid_username("bad-name"));
    }

    #[test]
    fn password_policy_names_the_failed_rule() {
        let short = validate_password("Ab1").unwrap_err().to_string();
        assert!(short.contains("at least 8 characters"));

        let no_upper = validate_password("passw0rd1").unwrap_err().to_string();
        assert!(no_upper.contains("uppercase"));

        let no_lower = validate_password("PASSW0RD1").unwrap_err().to_string();
        assert!(no_lower.contains("lowercase"));

        let no_digit = validate_password("Passwordx").unwrap_err().to_string();
        assert!(no_digit.contains("digit"));

        assert!(validate_password("Passw0rd1").is_ok());
    }
}
