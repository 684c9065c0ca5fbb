//! Authentication for requests sent to the blob service.

mod shared_key;

pub use shared_key::*;
