use std::time::Duration;

use scheduler::FetchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TicketingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by ticketing api")]
    RateLimited { retry_after: Option<Duration> },

    #[error("ticketing api returned status {0}")]
    Status(u16),

    #[error("invalid response from ticketing api: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<TicketingError> for FetchError {
    fn from(err: TicketingError) -> Self {
        match err {
            TicketingError::RateLimited { retry_after } => FetchError::RateLimited { retry_after },
            TicketingError::Decode(e) => FetchError::Malformed(e.to_string()),
            TicketingError::Http(e) if e.is_decode() => FetchError::Malformed(e.to_string()),
            other => FetchError::Unavailable(other.to_string()),
        }
    }
}
