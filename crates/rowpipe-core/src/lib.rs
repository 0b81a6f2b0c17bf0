#![forbid(unsafe_code)]
//! rowpipe-core: values, rows, column descriptors, cancellation and config.
//!
//! Everything here is shared by the operator and exec crates. No threads are
//! spawned from this crate.

pub mod cancel;
pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod tx;
pub mod types;

pub use cancel::CancellationToken;
pub use error::{Error, Result};
