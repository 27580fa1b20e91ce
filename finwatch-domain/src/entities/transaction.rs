// Transaction entities
//
// `TransactionRecord` is the raw shape fetched from the store: everything
// optional, amounts and dates still text because the table may hold junk.
// `CleanRow` is the validated row the detectors operate on.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::value_objects::{TransactionKind, YearMonth};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub asset: Option<String>,
    pub payment_method: Option<String>,
    pub rate: Option<f64>,
    pub indicator_1: Option<f64>,
    pub indicator_2: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanRow {
    pub id: Option<String>,
    pub date: NaiveDateTime,
    pub description: Option<String>,
    pub amount: f64,
    pub abs_amount: f64,
    pub category: String,
    pub kind: TransactionKind,
    pub asset: Option<String>,
    pub payment_method: Option<String>,
    pub rate: Option<f64>,
    pub indicator_1: Option<f64>,
    pub indicator_2: Option<f64>,
    pub year_month: YearMonth,
}
