use thiserror::Error;
use watch::WatchError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("artist name is required")]
    InvalidArtist,

    #[error("invalid configuration for {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error(transparent)]
    Watch(#[from] WatchError),
}
