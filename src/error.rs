use thiserror::Error as ThisError;

use crate::frame;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The command makes no sense once values are opaque encoded blobs. Raised before anything is
    /// sent to the server.
    #[error("operation not supported: {0}")]
    OperationNotSupported(String),
    #[error("invalid argument shape: {0}")]
    InvalidArgumentShape(String),
    #[error("{codec} codec cannot serialize values of kind {kind}")]
    UnsupportedValueKind {
        codec: &'static str,
        kind: &'static str,
    },
    #[error("failed to serialize value: {0}")]
    Serialize(String),
    #[error("failed to deserialize value: {0}")]
    Deserialize(String),
    /// A watched key was modified before the transaction was executed.
    #[error("watched key changed, transaction aborted")]
    PreconditionFailed,
    /// Error reply sent by the server, passed through as is.
    #[error("{0}")]
    Response(String),
    #[error("unexpected reply; expected {expected}, got {actual}")]
    UnexpectedReply {
        expected: &'static str,
        actual: String,
    },
    #[error(transparent)]
    Frame(#[from] frame::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn unexpected(expected: &'static str, actual: impl std::fmt::Debug) -> Error {
        Error::UnexpectedReply {
            expected,
            actual: format!("{:?}", actual),
        }
    }

    pub(crate) fn not_supported(msg: impl Into<String>) -> Error {
        Error::OperationNotSupported(msg.into())
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Error {
        Error::InvalidArgumentShape(msg.into())
    }
}
