use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::entities::{AlertDraft, AlertPage, AlertQuery, TransactionRecord};
use crate::value_objects::AlertStatus;

/// Read side of the transaction store. The table is external input and
/// read-only to the engine.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch every row of the transactions table, raw. Errors mean the
    /// backing store is unreachable; there is no partial load.
    async fn fetch_all(&self) -> anyhow::Result<Vec<TransactionRecord>>;
}

/// Write/read side of the alert store, owned by the engine.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Create the alerts table if missing and apply additive migrations.
    async fn ensure_schema(&self) -> anyhow::Result<()>;

    /// Insert a draft. Returns the new id, or `None` when an existing
    /// automatic alert matches the dedup key (same `transaction_id`, or
    /// same category + occurrence second + value within 0.01).
    async fn insert(
        &self,
        draft: &AlertDraft,
        created_at: NaiveDateTime,
    ) -> anyhow::Result<Option<i64>>;

    /// Paginated, filtered read, newest occurrence first.
    async fn list(&self, query: &AlertQuery) -> anyhow::Result<AlertPage>;

    /// Status transition driven by the UI collaborator. Returns whether
    /// a row was updated.
    async fn update_status(&self, id: i64, status: AlertStatus) -> anyhow::Result<bool>;
}
