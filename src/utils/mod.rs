//! The `utils` module holds the pieces shared by every other module: the
//! crate's error types and the logging setup.

pub mod error;
pub mod logging;

pub use error::{BoxError, BrokerError, Error, Result, TransportError};

#[cfg(test)]
mod tests;
