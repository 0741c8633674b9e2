use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("submission rejected: {0}")]
    Rejected(Rejection),
}

/// Reasons a submission is refused before any network call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("an operation is already in flight")]
    Busy,
    #[error("console has been torn down")]
    TornDown,
}

impl ConsoleError {
    /// The bare message without the category prefix, as shown to the user.
    pub fn detail(&self) -> String {
        match self {
            Self::Config(msg) | Self::Http(msg) | Self::Serialization(msg) => msg.clone(),
            Self::Rejected(rejection) => rejection.to_string(),
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }
}

impl From<Rejection> for ConsoleError {
    fn from(value: Rejection) -> Self {
        Self::Rejected(value)
    }
}

pub use crate::Result;
