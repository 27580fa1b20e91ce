pub mod alert_queries;

pub use alert_queries::{list_alerts, update_alert_status};
