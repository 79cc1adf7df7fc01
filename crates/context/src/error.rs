use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Stored value exists but does not decode into the requested type.
    #[error("context value `{namespace}/{key}` has unexpected shape: {source}")]
    Decode {
        namespace: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(
        namespace: impl Into<String>,
        key: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        Self::Decode {
            namespace: namespace.into(),
            key: key.into(),
            source,
        }
    }
}

impl parley_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

parley_common::impl_context!();
