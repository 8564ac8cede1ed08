//! Job status registry.
//!
//! Tracks the last-known status of every in-flight job, fans updates out to
//! any number of live subscribers through bounded mailboxes, and holds the
//! cancellation handle of each job. Delivery never blocks the publisher: a
//! subscriber whose mailbox is full simply misses that update.

pub mod error;
pub mod registry;

pub use error::{StatusError, StatusResult};
pub use registry::{RegistryConfig, StatusRegistry, Subscription, DEFAULT_SUBSCRIBER_CAPACITY};
