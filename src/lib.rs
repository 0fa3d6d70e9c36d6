// ABOUTME: Root module for textcast - rate-limited concurrent message dispatch.
// ABOUTME: Re-exports the main public types from submodules.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod prelude;
pub mod target;
pub mod transport;

pub use error::TextcastError;
