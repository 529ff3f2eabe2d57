pub mod client;
pub mod errors;
pub mod types;

pub use client::TicketingClient;
pub use errors::TicketingError;
pub use types::*;
