pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod notify;
pub mod report;
pub mod ticketing;
