// Alert entities

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::value_objects::{AlertKind, AlertStatus, Priority};

/// Unpersisted alert produced by a detector. Becomes an `AlertRecord`
/// on successful insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDraft {
    pub title: String,
    pub description: String,
    pub kind: AlertKind,
    pub priority: Priority,
    pub category: Option<String>,
    pub value: f64,
    /// Instant the detected condition refers to: a transaction's
    /// timestamp, or the first instant of a calendar month for monthly
    /// detectors.
    pub occurred_at: NaiveDateTime,
    /// Detector id, e.g. "Z-Score".
    pub source: &'static str,
    /// Detector-specific payload. `BTreeMap` keeps the serialized key
    /// order stable.
    pub extra: BTreeMap<String, serde_json::Value>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub kind: AlertKind,
    pub priority: Priority,
    pub status: AlertStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub occurred_at: NaiveDateTime,
    pub category: Option<String>,
    pub value: f64,
    pub source: String,
    pub extra: BTreeMap<String, serde_json::Value>,
    pub automatic: bool,
    pub transaction_id: Option<String>,
}

/// Filters and pagination for the alert read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertQuery {
    pub page: u32,
    pub per_page: u32,
    pub kind: Option<AlertKind>,
    pub priority: Option<Priority>,
    pub status: Option<AlertStatus>,
    pub category: Option<String>,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
            kind: None,
            priority: None,
            status: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPage {
    pub items: Vec<AlertRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u64,
}
