pub mod repositories;

pub use repositories::{AlertSink, TransactionSource};
