use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The message lacks a field the router keys on.
    #[error("message is missing required field `{field}`")]
    MissingField { field: &'static str },

    /// The message could not be decoded at all.
    #[error("invalid message: {0}")]
    InvalidMessage(parley_common::Error),

    /// A continuation or route names a handler that was never registered.
    #[error("no handler registered under name `{name}`")]
    UnknownHandler { name: String },

    /// A different handler is already registered under this name.
    #[error("handler name `{name}` is already taken by another handler")]
    HandlerNameTaken { name: String },

    /// Someone is already waiting for this `(peer, type)` pair.
    #[error("a wait for `{msg_type}` from `{peer}` is already pending")]
    AwaitAlreadyRegistered { peer: String, msg_type: String },

    #[error("wait for `{msg_type}` from `{peer}` timed out after {after:?}")]
    WaitTimedOut {
        peer: String,
        msg_type: String,
        after: Duration,
    },

    /// The wait was cancelled or the router went away before a match.
    #[error("wait for `{msg_type}` from `{peer}` was cancelled")]
    WaitCancelled { peer: String, msg_type: String },

    #[error(transparent)]
    Context(#[from] parley_context::Error),
}

impl From<parley_common::Error> for Error {
    fn from(err: parley_common::Error) -> Self {
        match err {
            parley_common::Error::MissingField { field } => Self::MissingField { field },
            other => Self::InvalidMessage(other),
        }
    }
}

impl Error {
    #[must_use]
    pub fn unknown_handler(name: impl Into<String>) -> Self {
        Self::UnknownHandler { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
