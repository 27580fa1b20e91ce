//! Read path for the dashboard collaborator.

use tracing::error;

use finwatch_domain::value_objects::AlertStatus;
use finwatch_domain::{AlertPage, AlertQuery};

use crate::error::AppError;
use crate::state::AppState;

pub async fn list_alerts(state: &AppState, query: AlertQuery) -> Result<AlertPage, AppError> {
    state.sink.list(&query).await.map_err(|err| {
        error!("failed to list alerts: {}", err);
        AppError::Internal(err)
    })
}

pub async fn update_alert_status(
    state: &AppState,
    id: i64,
    status: AlertStatus,
) -> Result<bool, AppError> {
    state.sink.update_status(id, status).await.map_err(|err| {
        error!("failed to update alert {}: {}", id, err);
        AppError::Internal(err)
    })
}
