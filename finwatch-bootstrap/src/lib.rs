// Finwatch bootstrap: wires configuration, storage and the pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use finwatch_application::{commands, queries, AppState};
use finwatch_domain::ports::AlertSink;
use finwatch_domain::value_objects::{AlertKind, AlertStatus, Priority};
use finwatch_domain::{AlertPage, AlertQuery};
use finwatch_infrastructure::{AppConfig, SqliteStore};

async fn build_state() -> Result<AppState> {
    let config = AppConfig::load().await?;
    info!(db_path = %config.db_path, "opening alert store");
    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    store.ensure_schema().await.context("ensure alert schema")?;
    Ok(AppState::new(
        config.to_engine_config(),
        store.clone(),
        store,
    ))
}

/// Execute one pipeline run; returns the number of persisted alerts.
pub async fn run_pipeline() -> Result<usize> {
    let state = build_state().await?;
    let persisted = commands::run_analysis(&state).await?;
    info!(persisted, "analysis finished");
    Ok(persisted)
}

/// Read one page of alerts.
pub async fn list_alerts(query: AlertQuery) -> Result<AlertPage> {
    let state = build_state().await?;
    Ok(queries::list_alerts(&state, query).await?)
}

pub fn build_query(
    page: u32,
    per_page: u32,
    kind: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    category: Option<String>,
) -> AlertQuery {
    AlertQuery {
        page,
        per_page,
        kind: kind.as_deref().map(AlertKind::from),
        priority: priority.as_deref().map(Priority::from),
        status: status.as_deref().map(AlertStatus::from),
        category,
    }
}
