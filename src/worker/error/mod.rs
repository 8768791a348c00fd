use uuid::Uuid;

/// Errors returned by the queue's control API.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Item {id} cannot be removed while {status}")]
    NotRemovable { id: Uuid, status: &'static str },

    #[error("No Tokio runtime available to run the queue worker")]
    NoRuntime,
}

pub type QueueResult<T> = Result<T, QueueError>;

impl From<tokio::runtime::TryCurrentError> for QueueError {
    fn from(_: tokio::runtime::TryCurrentError) -> Self {
        QueueError::NoRuntime
    }
}
