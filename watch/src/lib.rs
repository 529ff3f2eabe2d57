//! Surge watches and the seen-event ledger.
//!
//! `model` holds the plain data types, `store` the persistence seams and
//! their SQLite implementation, `registry` the bounded add/remove/list API
//! used by the CLI and the scheduler.

pub mod model;
pub mod registry;
pub mod store;

pub use model::{CitySighting, Event, SeenEventRecord, SurgeWatch, normalize_artist_key};
pub use registry::{WatchError, WatchRegistry};
