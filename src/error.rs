use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Malformed or schema-invalid request body.
    #[error("{0}")]
    Validation(String),

    /// The registrations file could not be written. The in-memory registry
    /// has already been rolled back when this is returned.
    #[error("error saving registrations: {0}")]
    Persistence(String),

    #[error("{0} is not a valid Windows push notification target")]
    UnknownTarget(String),

    #[error("failed to fetch access token: {0}")]
    TokenFetch(String),

    /// A single channel POST failed at the transport level.
    #[error("failed to deliver notification to {channel}: {reason}")]
    Delivery { channel: String, reason: String },
}
