use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use palaver_db::{connection::ping, migrations::pending_count, DbPool};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Component {
    pub status: Readiness,
    pub detail: String,
}

impl Component {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: Readiness::Ready, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: Readiness::Degraded, detail: detail.into() }
    }
}

/// Liveness of the API process plus whether the store can take chat turns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub service: Component,
    pub database: Component,
    pub checked_at: String,
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let database = store_readiness(&state.db_pool).await;
    let status = database.status;

    let report = HealthReport {
        status,
        service: Component::ready(concat!("palaver ", env!("CARGO_PKG_VERSION"))),
        database,
        checked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    };

    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

// A reachable store with pending migrations is not ready.
async fn store_readiness(pool: &DbPool) -> Component {
    if let Err(error) = ping(pool).await {
        warn!(event_name = "system.health.degraded", error = %error, "database ping failed");
        return Component::degraded("database query failed");
    }

    match pending_count(pool).await {
        Ok(0) => Component::ready("schema current"),
        Ok(pending) => {
            warn!(event_name = "system.health.degraded", pending, "schema migrations pending");
            Component::degraded(format!("{pending} schema migration(s) pending"))
        }
        Err(error) => {
            warn!(event_name = "system.health.degraded", error = %error, "migration ledger unreadable");
            Component::degraded("database query failed")
        }
    }
}
