use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Sessions(#[from] parley_sessions::Error),

    #[error("failed to stage inbound media: {0}")]
    Media(#[from] parley_media::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
