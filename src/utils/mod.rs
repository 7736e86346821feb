//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `vigil` crate.
//!
//! It centralizes the error taxonomy of the notification layer and the
//! logging setup shared by the library and the binary.

pub mod error;
pub mod logging;

pub use error::{ClientError, ConnectError, DecodeError};
