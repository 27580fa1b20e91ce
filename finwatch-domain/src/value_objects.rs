pub mod alert_kind;
pub mod alert_status;
pub mod priority;
pub mod transaction_kind;
pub mod year_month;

pub use alert_kind::AlertKind;
pub use alert_status::AlertStatus;
pub use priority::Priority;
pub use transaction_kind::TransactionKind;
pub use year_month::YearMonth;
