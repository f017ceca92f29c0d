//! Side-channel HTTP surface reporting whether the pool and the gRPC listener are up.
//!
//! Not part of the business protocol; load balancers and orchestrators poll it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use crm_db::{DbHandle, HEALTHCHECK_TIMEOUT};
use serde_json::{Value, json};

pub const SERVICE_NAME: &str = "crm-server";

/// Shared by every health route and by the gRPC task that flips the listener flag.
#[derive(Clone)]
pub struct HealthState {
    db: DbHandle,
    grpc_serving: Arc<AtomicBool>,
    environment: String,
}

impl HealthState {
    pub fn new(db: DbHandle, environment: impl Into<String>) -> Self {
        Self {
            db,
            grpc_serving: Arc::new(AtomicBool::new(false)),
            environment: environment.into(),
        }
    }

    pub fn set_grpc_serving(&self, serving: bool) {
        self.grpc_serving.store(serving, Ordering::Release);
    }

    fn grpc_serving(&self) -> bool {
        self.grpc_serving.load(Ordering::Acquire)
    }

    async fn database(&self) -> Value {
        match self.db.healthcheck(HEALTHCHECK_TIMEOUT).await {
            Ok(()) => json!({ "status": "up" }),
            Err(e) => {
                tracing::warn!(error = %e, "database health probe failed");
                json!({ "status": "down", "error": e.to_string() })
            }
        }
    }

    fn grpc(&self) -> Value {
        if self.grpc_serving() {
            json!({ "status": "up" })
        } else {
            json!({ "status": "down" })
        }
    }
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/database", get(database))
        .route("/health/grpc", get(grpc))
        .route("/info", get(info))
        .with_state(state)
}

fn is_up(component: &Value) -> bool {
    component["status"] == "up"
}

fn respond(up: bool, body: Value) -> (StatusCode, Json<Value>) {
    let code = if up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let database = state.database().await;
    let grpc = state.grpc();
    let up = is_up(&database) && is_up(&grpc);
    respond(
        up,
        json!({
            "status": if up { "up" } else { "down" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "components": { "database": database, "grpc": grpc },
        }),
    )
}

async fn database(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let body = state.database().await;
    respond(is_up(&body), body)
}

async fn grpc(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let body = state.grpc();
    respond(is_up(&body), body)
}

async fn info(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
    }))
}
