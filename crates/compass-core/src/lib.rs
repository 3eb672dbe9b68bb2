//! Compass Core - Types, contracts, config, and error handling

pub mod config;
pub mod error;
pub mod facts;
pub mod presence;
pub mod protocol;
pub mod types;

pub use config::CompassConfig;
pub use error::{Error, Result};
pub use facts::*;
pub use presence::*;
pub use protocol::*;
pub use types::*;
