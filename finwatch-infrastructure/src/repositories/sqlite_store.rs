//! SQLite adapter implementing both storage ports.
//!
//! The `transactions` table is external input and only ever read; its
//! columns are discovered at runtime so partial schemas are tolerated.
//! The `alerts` table is owned here: created on `ensure_schema`, and
//! migrated additively when an older database lacks `transaction_id`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use finwatch_domain::ports::{AlertSink, TransactionSource};
use finwatch_domain::utils::{format_timestamp, parse_timestamp};
use finwatch_domain::value_objects::{AlertKind, AlertStatus, Priority};
use finwatch_domain::{AlertDraft, AlertPage, AlertQuery, AlertRecord, TransactionRecord};

const ALERT_COLUMNS: &str = "id, title, description, kind, priority, status, created_at, \
                             updated_at, occurred_at, category, value, source, extra, automatic";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open database at {}", path.as_ref().display()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("store mutex poisoned"))
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn value_to_string(value: SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(i) => Some(i.to_string()),
        SqlValue::Real(f) => Some(f.to_string()),
        SqlValue::Text(s) => Some(s),
        SqlValue::Blob(_) => None,
    }
}

fn value_to_f64(value: SqlValue) -> Option<f64> {
    match value {
        SqlValue::Integer(i) => Some(i as f64),
        SqlValue::Real(f) => Some(f),
        SqlValue::Text(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl TransactionSource for SqliteStore {
    async fn fetch_all(&self) -> Result<Vec<TransactionRecord>> {
        let conn = self.lock()?;
        if !table_exists(&conn, "transactions")? {
            bail!("transactions table not found");
        }

        let mut stmt = conn.prepare("SELECT * FROM transactions")?;
        let index_of = |name: &str| stmt.column_index(name).ok();
        let idx_id = index_of("id");
        let idx_date = index_of("date");
        let idx_description = index_of("description");
        let idx_amount = index_of("amount");
        let idx_category = index_of("category");
        let idx_kind = index_of("kind");
        let idx_asset = index_of("asset");
        let idx_payment = index_of("payment_method");
        let idx_rate = index_of("rate");
        let idx_ind1 = index_of("indicator_1");
        let idx_ind2 = index_of("indicator_2");

        let get_string = |row: &rusqlite::Row<'_>, idx: Option<usize>| -> rusqlite::Result<Option<String>> {
            match idx {
                Some(i) => Ok(value_to_string(row.get::<_, SqlValue>(i)?)),
                None => Ok(None),
            }
        };
        let get_f64 = |row: &rusqlite::Row<'_>, idx: Option<usize>| -> rusqlite::Result<Option<f64>> {
            match idx {
                Some(i) => Ok(value_to_f64(row.get::<_, SqlValue>(i)?)),
                None => Ok(None),
            }
        };

        let records = stmt
            .query_map([], |row| {
                Ok(TransactionRecord {
                    id: get_string(row, idx_id)?,
                    date: get_string(row, idx_date)?,
                    description: get_string(row, idx_description)?,
                    amount: get_string(row, idx_amount)?,
                    category: get_string(row, idx_category)?,
                    kind: get_string(row, idx_kind)?,
                    asset: get_string(row, idx_asset)?,
                    payment_method: get_string(row, idx_payment)?,
                    rate: get_f64(row, idx_rate)?,
                    indicator_1: get_f64(row, idx_ind1)?,
                    indicator_2: get_f64(row, idx_ind2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

#[async_trait]
impl AlertSink for SqliteStore {
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                kind TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                updated_at TEXT,
                occurred_at TEXT NOT NULL,
                category TEXT,
                value REAL NOT NULL,
                source TEXT NOT NULL,
                extra TEXT NOT NULL DEFAULT '{}',
                automatic INTEGER NOT NULL DEFAULT 1,
                transaction_id TEXT
            );
            "#,
        )?;

        // Additive migration for databases written before the
        // transaction link existed.
        let columns = table_columns(&conn, "alerts")?;
        if !columns.iter().any(|c| c == "transaction_id") {
            conn.execute("ALTER TABLE alerts ADD COLUMN transaction_id TEXT", [])?;
        }
        Ok(())
    }

    async fn insert(
        &self,
        draft: &AlertDraft,
        created_at: NaiveDateTime,
    ) -> Result<Option<i64>> {
        let mut conn = self.lock()?;
        let has_transaction_id = table_columns(&conn, "alerts")?
            .iter()
            .any(|c| c == "transaction_id");

        let occurred = format_timestamp(draft.occurred_at);
        let tx = conn.transaction()?;

        // Dedup 1: same source transaction already alerted.
        if has_transaction_id {
            if let Some(transaction_id) = &draft.transaction_id {
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM alerts \
                         WHERE transaction_id = ?1 AND automatic = 1 LIMIT 1",
                        params![transaction_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_some() {
                    return Ok(None);
                }
            }
        }

        // Dedup 2: same category (NULL-safe), same occurrence second,
        // value within a cent.
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM alerts \
                 WHERE category IS ?1 AND occurred_at = ?2 AND automatic = 1 \
                   AND ABS(value - ?3) < 0.01 LIMIT 1",
                params![draft.category, occurred, draft.value],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Ok(None);
        }

        let extra = serde_json::to_string(&draft.extra)?;
        if has_transaction_id {
            tx.execute(
                "INSERT INTO alerts (title, description, kind, priority, status, created_at, \
                 updated_at, occurred_at, category, value, source, extra, automatic, transaction_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13)",
                params![
                    draft.title,
                    draft.description,
                    draft.kind.as_str(),
                    draft.priority.as_str(),
                    AlertStatus::Pending.as_str(),
                    format_timestamp(created_at),
                    Option::<String>::None,
                    occurred,
                    draft.category,
                    draft.value,
                    draft.source,
                    extra,
                    draft.transaction_id,
                ],
            )?;
        } else {
            tx.execute(
                "INSERT INTO alerts (title, description, kind, priority, status, created_at, \
                 updated_at, occurred_at, category, value, source, extra, automatic) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1)",
                params![
                    draft.title,
                    draft.description,
                    draft.kind.as_str(),
                    draft.priority.as_str(),
                    AlertStatus::Pending.as_str(),
                    format_timestamp(created_at),
                    Option::<String>::None,
                    occurred,
                    draft.category,
                    draft.value,
                    draft.source,
                    extra,
                ],
            )?;
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(id))
    }

    async fn list(&self, query: &AlertQuery) -> Result<AlertPage> {
        let conn = self.lock()?;
        let has_transaction_id = table_columns(&conn, "alerts")?
            .iter()
            .any(|c| c == "transaction_id");

        let mut filters = String::new();
        let mut args: Vec<SqlValue> = Vec::new();
        if let Some(kind) = query.kind {
            filters.push_str(" AND kind = ?");
            args.push(SqlValue::Text(kind.as_str().to_string()));
        }
        if let Some(priority) = query.priority {
            filters.push_str(" AND priority = ?");
            args.push(SqlValue::Text(priority.as_str().to_string()));
        }
        if let Some(status) = query.status {
            filters.push_str(" AND status = ?");
            args.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(category) = &query.category {
            filters.push_str(" AND category = ?");
            args.push(SqlValue::Text(category.clone()));
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM alerts WHERE 1=1{filters}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;
        let total = total.max(0) as u64;

        let page = query.page.max(1);
        let per_page = query.per_page.max(1);
        let offset = (page - 1) as u64 * per_page as u64;
        let transaction_id_column = if has_transaction_id {
            "transaction_id"
        } else {
            "NULL AS transaction_id"
        };
        let sql = format!(
            "SELECT {ALERT_COLUMNS}, {transaction_id_column} FROM alerts WHERE 1=1{filters} \
             ORDER BY occurred_at DESC, created_at DESC LIMIT ? OFFSET ?"
        );
        args.push(SqlValue::Integer(per_page as i64));
        args.push(SqlValue::Integer(offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let kind: String = row.get(3)?;
                let priority: String = row.get(4)?;
                let status: String = row.get(5)?;
                let created_at: String = row.get(6)?;
                let updated_at: Option<String> = row.get(7)?;
                let occurred_at: String = row.get(8)?;
                let extra: Option<String> = row.get(12)?;
                Ok(AlertRecord {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    kind: AlertKind::from(kind.as_str()),
                    priority: Priority::from(priority.as_str()),
                    status: AlertStatus::from(status.as_str()),
                    created_at: parse_timestamp(&created_at).unwrap_or_default(),
                    updated_at: updated_at.as_deref().and_then(parse_timestamp),
                    occurred_at: parse_timestamp(&occurred_at).unwrap_or_default(),
                    category: row.get(9)?,
                    value: row.get(10)?,
                    source: row.get(11)?,
                    extra: extra
                        .as_deref()
                        .and_then(|raw| serde_json::from_str::<BTreeMap<_, _>>(raw).ok())
                        .unwrap_or_default(),
                    automatic: row.get::<_, i64>(13)? != 0,
                    transaction_id: row.get(14)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let pages = total.div_ceil(per_page as u64).max(1);
        Ok(AlertPage {
            items,
            page,
            per_page,
            total,
            pages,
        })
    }

    async fn update_status(&self, id: i64, status: AlertStatus) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE alerts SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                status.as_str(),
                format_timestamp(Utc::now().naive_utc()),
                id
            ],
        )?;
        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn draft(category: Option<&str>, value: f64, source: &'static str) -> AlertDraft {
        let occurred = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut extra = BTreeMap::new();
        extra.insert("value_raw".to_string(), json!(value));
        extra.insert("observação".to_string(), json!("não-ASCII preservado"));
        AlertDraft {
            title: format!("Alerta de {source}"),
            description: "teste".to_string(),
            kind: AlertKind::Anomaly,
            priority: Priority::Medium,
            category: category.map(str::to_string),
            value,
            occurred_at: occurred,
            source,
            extra,
            transaction_id: None,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    async fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_then_duplicate_is_skipped() {
        let store = store().await;
        let d = draft(Some("Food"), 900.0, "Z-Score");
        assert!(store.insert(&d, now()).await.unwrap().is_some());
        assert!(store.insert(&d, now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dedup_tolerates_sub_cent_differences() {
        let store = store().await;
        let d = draft(Some("Food"), 900.0, "Z-Score");
        store.insert(&d, now()).await.unwrap().unwrap();
        let mut close = draft(Some("Food"), 900.005, "Percentile");
        close.transaction_id = None;
        assert!(store.insert(&close, now()).await.unwrap().is_none());
        let far = draft(Some("Food"), 900.02, "Percentile");
        assert!(store.insert(&far, now()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dedup_is_null_safe_on_category() {
        let store = store().await;
        let d = draft(None, 0.0, "ANOVA");
        assert!(store.insert(&d, now()).await.unwrap().is_some());
        // Same key with NULL category must still be seen as duplicate.
        let again = draft(None, 0.0, "TTest");
        assert!(store.insert(&again, now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dedup_by_transaction_id_wins_over_values() {
        let store = store().await;
        let mut first = draft(Some("Food"), 900.0, "Z-Score");
        first.transaction_id = Some("tx-42".to_string());
        store.insert(&first, now()).await.unwrap().unwrap();

        // Different value and month, same source row.
        let mut second = draft(Some("Food"), 123.0, "EMA");
        second.transaction_id = Some("tx-42".to_string());
        second.occurred_at = NaiveDate::from_ymd_opt(2024, 6, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(store.insert(&second, now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extra_round_trips_with_stable_keys() {
        let store = store().await;
        let d = draft(Some("Food"), 900.0, "Z-Score");
        store.insert(&d, now()).await.unwrap().unwrap();

        let page = store.list(&AlertQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        let record = &page.items[0];
        assert_eq!(record.extra, d.extra);
        assert_eq!(record.kind, AlertKind::Anomaly);
        assert_eq!(record.status, AlertStatus::Pending);
        assert!(record.automatic);
        assert_eq!(record.occurred_at, d.occurred_at);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let store = store().await;
        for i in 0..5 {
            let mut d = draft(Some("Food"), 100.0 + i as f64, "Z-Score");
            d.occurred_at = NaiveDate::from_ymd_opt(2024, 7, 1 + i)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            if i % 2 == 0 {
                d.priority = Priority::High;
            }
            store.insert(&d, now()).await.unwrap().unwrap();
        }

        let page = store
            .list(&AlertQuery {
                per_page: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        assert_eq!(page.items.len(), 2);
        // Newest occurrence first.
        assert_eq!(page.items[0].occurred_at.format("%d").to_string(), "05");

        let high_only = store
            .list(&AlertQuery {
                priority: Some(Priority::High),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(high_only.total, 3);
        assert!(high_only
            .items
            .iter()
            .all(|r| r.priority == Priority::High));
    }

    #[tokio::test]
    async fn update_status_stamps_updated_at() {
        let store = store().await;
        let d = draft(Some("Food"), 900.0, "Z-Score");
        let id = store.insert(&d, now()).await.unwrap().unwrap();

        assert!(store.update_status(id, AlertStatus::Read).await.unwrap());
        assert!(!store.update_status(9999, AlertStatus::Read).await.unwrap());

        let page = store.list(&AlertQuery::default()).await.unwrap();
        assert_eq!(page.items[0].status, AlertStatus::Read);
        assert!(page.items[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn migration_adds_transaction_id_to_old_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute_batch(
                "CREATE TABLE alerts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    priority TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL,
                    updated_at TEXT,
                    occurred_at TEXT NOT NULL,
                    category TEXT,
                    value REAL NOT NULL,
                    source TEXT NOT NULL,
                    extra TEXT NOT NULL DEFAULT '{}',
                    automatic INTEGER NOT NULL DEFAULT 1
                );",
            )
            .unwrap();
        }
        store.ensure_schema().await.unwrap();
        {
            let conn = store.lock().unwrap();
            let columns = table_columns(&conn, "alerts").unwrap();
            assert!(columns.iter().any(|c| c == "transaction_id"));
        }

        let mut d = draft(Some("Food"), 900.0, "Z-Score");
        d.transaction_id = Some("tx-1".to_string());
        assert!(store.insert(&d, now()).await.unwrap().is_some());
        assert!(store.insert(&d, now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_all_requires_transactions_table() {
        let store = store().await;
        assert!(store.fetch_all().await.is_err());
    }

    #[tokio::test]
    async fn fetch_all_tolerates_partial_schema() {
        let store = store().await;
        {
            let conn = store.lock().unwrap();
            conn.execute_batch(
                "CREATE TABLE transactions (id INTEGER PRIMARY KEY, date TEXT, amount TEXT);
                 INSERT INTO transactions (date, amount) VALUES ('2024-03-15', '100.0');
                 INSERT INTO transactions (date, amount) VALUES ('2024-03-16', 'R$ abc');",
            )
            .unwrap();
        }
        let records = store.fetch_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date.as_deref(), Some("2024-03-15"));
        assert!(records[0].category.is_none());
        assert!(records[0].rate.is_none());
    }
}
