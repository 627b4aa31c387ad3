//! Shared types for Tickstream.
//!
//! The record model served by the stream and the defaults consumed by both
//! the server library and the CLI live here so that neither depends on the other.

pub mod constants;
pub mod country;

pub use country::Country;
