use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Faults raised at the store boundary.
///
/// Only `Unavailable` and `Timeout` are transient; everything else is a
/// local fault in the store implementation itself.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation '{0}' timed out")]
    Timeout(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("text index error: {0}")]
    Index(#[from] tantivy::TantivyError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether a single scoped retry is worth attempting.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}
