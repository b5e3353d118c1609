// Library module for nexus-cli
// Transfer & consistency engine, re-exported for the binary and integration tests

pub mod archive;
pub mod checksum;
pub mod config;
pub mod deps;
pub mod error;
pub mod glob;
pub mod pipe;
pub mod progress;
pub mod remote;
pub mod transfer;
pub mod walk;

pub use error::{Error, Result};
