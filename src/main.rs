use anyhow::Context;

mod app;
mod auth;
mod config;
mod error;
mod response;
mod state;
mod todos;
mod users;

use crate::auth::repo::RefreshTokenRecord;
use crate::state::AppState;

/// How often consumed/expired refresh token rows are swept.
const TOKEN_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tasklight=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run database migrations")?;

    spawn_token_sweeper(app_state.db.clone());

    let app = app::build_app(app_state);
    app::serve(app).await
}

/// Replay detection only needs jti rows until the token itself expires;
/// everything older is dead weight.
fn spawn_token_sweeper(db: sqlx::PgPool) {
    tokio::spawn(async move {
        let mut tick =
            tokio::time::interval(std::time::Duration::from_secs(TOKEN_SWEEP_INTERVAL_SECS));
        loop {
            tick.tick().await;
            match RefreshTokenRecord::sweep_expired(&db).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "swept expired refresh tokens"),
                Err(e) => tracing::warn!(error = %e, "refresh token sweep failed"),
            }
        }
    });
}
