//! Shared newtype wrappers.

pub mod id;

pub use id::*;
