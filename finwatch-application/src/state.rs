use std::sync::Arc;

use finwatch_domain::ports::{AlertSink, TransactionSource};
use finwatch_domain::EngineConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: EngineConfig,
    pub source: Arc<dyn TransactionSource>,
    pub sink: Arc<dyn AlertSink>,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn TransactionSource>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
        }
    }
}
