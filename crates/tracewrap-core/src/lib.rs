//! tracewrap Core
//!
//! Core domain types and error handling for tracewrap. This crate has
//! minimal dependencies and defines the shared vocabulary used across
//! all other crates.

pub mod ci;
pub mod error;

pub use ci::{CiDescriptor, CiPlatform, detect};
pub use error::{Error, Result};
