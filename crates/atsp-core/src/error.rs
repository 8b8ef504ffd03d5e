use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),
    #[error("invalid tour: {0}")]
    InvalidTour(String),
    #[error("search stack overflow: capacity of {capacity} tours exceeded")]
    StackOverflow { capacity: usize },
    #[error("split destination already holds {len} tours")]
    SplitDestinationNotEmpty { len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn invalid_matrix(message: impl Into<String>) -> Self {
        Self::InvalidMatrix(message.into())
    }

    pub fn invalid_tour(message: impl Into<String>) -> Self {
        Self::InvalidTour(message.into())
    }
}
