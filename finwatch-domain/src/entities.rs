pub mod alert;
pub mod config;
pub mod transaction;

pub use alert::{AlertDraft, AlertPage, AlertQuery, AlertRecord};
pub use config::{DetectorConfig, EngineConfig};
pub use transaction::{CleanRow, TransactionRecord};
