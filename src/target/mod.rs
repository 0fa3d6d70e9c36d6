// ABOUTME: Target module - validated send targets and the target-file loader.
// ABOUTME: Everything here runs before dispatch; invalid input is never sent.

mod loader;
mod target;

pub use loader::*;
pub use target::*;

#[cfg(test)]
mod target_test;
