use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the bot core can
/// decide what is user-facing and what is only logged. Per-candidate join
/// failures are not errors; they travel as [`crate::platform::JoinOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("input unavailable: {path}: {source}")]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
