#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod demux;
pub mod error;
pub mod framing;
pub mod hub;
pub mod mux;
pub mod queue;
pub mod stream;
pub mod ubx;

pub use config::{Config, StreamConfig};
pub use error::{MuxError, Result};
pub use framing::Protocol;
pub use hub::{HubHandle, StreamHub};
pub use stream::LogicalStream;
