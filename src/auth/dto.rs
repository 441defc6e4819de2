use serde::{Deserialize, Serialize};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token payload returned from signup, login, and refresh. The refresh
/// token travels in the HttpOnly cookie, never in the body.
#[derive(Debug, Serialize)]
pub struct TokenData {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenData {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_data_serializes_bearer_type() {
        let json = serde_json::to_value(TokenData::new("abc".into())).expect("serialize");
        assert_eq!(json["access_token"], "abc");
        assert_eq!(json["token_type"], "bearer");
    }
}
