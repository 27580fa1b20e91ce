pub mod arima;
pub mod detectors;
pub mod frame;
pub mod loader;
pub mod stats;

pub use detectors::{registry, Detector, DetectorContext};
pub use frame::CleanFrame;
pub use loader::build_frame;
