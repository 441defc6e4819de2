use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::instrument;

use crate::{
    auth::{
        cookies::{clear_refresh_cookie, refresh_cookie, REFRESH_COOKIE},
        dto::{LoginRequest, SignupRequest, TokenData},
        services::AuthService,
    },
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

fn set_refresh_cookie(state: &AppState, jar: CookieJar, token: &str) -> CookieJar {
    let max_age = time::Duration::days(state.config.jwt.refresh_ttl_days);
    let secure = state.config.environment.is_production();
    jar.add(refresh_cookie(token, max_age, secure))
}

#[instrument(skip(state, jar, payload))]
async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<ApiResponse<TokenData>>)> {
    let auth = AuthService::from_ref(&state);
    let (_user, access, grant) = auth
        .register(&payload.email, &payload.username, &payload.password)
        .await?;

    let jar = set_refresh_cookie(&state, jar, &grant.token);
    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::ok(TokenData::new(access))),
    ))
}

#[instrument(skip(state, jar, payload))]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<ApiResponse<TokenData>>)> {
    let auth = AuthService::from_ref(&state);
    let (_user, access, grant) = auth.login(&payload.email, &payload.password).await?;

    let jar = set_refresh_cookie(&state, jar, &grant.token);
    Ok((jar, Json(ApiResponse::ok(TokenData::new(access)))))
}

#[instrument(skip(state, jar))]
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<ApiResponse<TokenData>>)> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::InvalidRefreshToken)?;

    let auth = AuthService::from_ref(&state);
    let (access, grant) = auth.refresh(&token).await?;

    let jar = set_refresh_cookie(&state, jar, &grant.token);
    Ok((jar, Json(ApiResponse::ok(TokenData::new(access)))))
}

#[instrument(skip(state, jar))]
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(StatusCode, CookieJar)> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        let token = cookie.value().to_string();
        let auth = AuthService::from_ref(&state);
        auth.logout(&token).await?;
    }

    let secure = state.config.environment.is_production();
    let jar = jar.add(clear_refresh_cookie(secure));
    Ok((StatusCode::NO_CONTENT, jar))
}
