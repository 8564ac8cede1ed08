//! Request handlers.

pub mod health;
pub mod jobs;
pub mod status;
pub mod transcode;

pub use health::*;
pub use jobs::*;
pub use status::*;
pub use transcode::*;
