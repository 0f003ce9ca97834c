use crate::addr::ParseAddrError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("unknown metadata field `{0}`")]
    UnknownField(String),
    #[error("invalid game name `{0}`")]
    InvalidGameName(String),
    #[error("game `{0}` not found")]
    GameNotFound(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ParseAddrError> for Error {
    fn from(value: ParseAddrError) -> Self {
        Self::InvalidAddress(value.0)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
