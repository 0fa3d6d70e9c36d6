// ABOUTME: Transport module - the Sender abstraction and its HTTP implementation.
// ABOUTME: A Sender performs exactly one request; retries live in the dispatcher.

mod http;
mod traits;

pub use http::*;
pub use traits::*;
