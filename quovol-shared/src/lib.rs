//! quovol shared - common types for the volume driver crates
//!
//! This crate contains the error type and the driver-wide constants
//! (record naming, option keys, defaults) used by the driver library
//! and its test utilities.

pub mod constants;
pub mod errors;

pub use errors::{QuovolError, QuovolResult};
