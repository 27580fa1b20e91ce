use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The transaction store cannot be reached. The only error the
    /// pipeline surfaces to its caller.
    #[error("transaction store unavailable: {0}")]
    StorageUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
