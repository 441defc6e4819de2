use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// The cookie is scoped to the auth endpoints; no other route ever
/// receives it.
const AUTH_COOKIE_PATH: &str = "/api/v1/auth";

/// Build the HttpOnly refresh token cookie.
pub fn refresh_cookie(token: &str, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(AUTH_COOKIE_PATH.to_string())
        .max_age(max_age)
        .build()
}

/// Build an expired cookie that clears the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(AUTH_COOKIE_PATH.to_string())
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_is_http_only_and_scoped() {
        let cookie = refresh_cookie("tok", Duration::days(7), true);
        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some(AUTH_COOKIE_PATH));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie(false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.path(), Some(AUTH_COOKIE_PATH));
    }
}
