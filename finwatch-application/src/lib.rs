// Finwatch Application Layer

pub mod commands;
pub mod error;
pub mod queries;
pub mod state;

pub use commands::*;
pub use error::AppError;
pub use queries::*;
pub use state::AppState;
