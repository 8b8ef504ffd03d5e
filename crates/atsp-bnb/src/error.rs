use std::sync::PoisonError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] atsp_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("too many workers ({workers}) for a {cities}-city problem")]
    TooManyWorkers { workers: usize, cities: usize },
    #[error("transport: {0}")]
    Transport(String),
    #[error("process {rank} aborted the run: {reason}")]
    RemoteAbort { rank: usize, reason: String },
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Self::Poisoned(value.to_string())
    }
}
