//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use driftmail_core::types::SignupPayload;

use super::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "driftmail-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();
    let counts = state.engine.db().run_counts().unwrap_or_default();
    let by_state: serde_json::Map<String, serde_json::Value> = counts
        .into_iter()
        .map(|(s, n)| (s, serde_json::json!(n)))
        .collect();
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "platform": format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        "uptime_secs": uptime.as_secs(),
        "runs": by_state,
    }))
}

/// List all lifecycle runs.
pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.engine.db().list_runs() {
        Ok(runs) => {
            let items: Vec<serde_json::Value> = runs
                .iter()
                .map(|run| {
                    serde_json::json!({
                        "id": run.id,
                        "email": run.email,
                        "full_name": run.full_name,
                        "state": run.state.as_db_str(),
                        "iteration": run.iteration,
                        "next_wake": run.next_wake,
                        "attempts": run.attempts,
                        "last_error": run.last_error,
                        "created_at": run.created_at,
                    })
                })
                .collect();
            Json(serde_json::json!({"ok": true, "runs": items}))
        }
        Err(e) => Json(serde_json::json!({"ok": false, "error": e.to_string()})),
    }
}

/// Signup trigger — the platform calls this once at account creation with
/// `{ email, fullName }`. Idempotent per email: re-triggering returns the
/// existing run.
pub async fn onboarding(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupPayload>,
) -> Json<serde_json::Value> {
    match state.engine.start_run(&payload, Utc::now()) {
        Ok((run, created)) => Json(serde_json::json!({
            "ok": true,
            "run_id": run.id,
            "state": run.state.as_db_str(),
            "created": created,
        })),
        Err(e) => Json(serde_json::json!({"ok": false, "error": e.to_string()})),
    }
}
