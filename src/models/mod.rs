//! Data models shared by the handlers and the storage backends.

mod blob;
mod block;

pub use blob::*;
pub use block::*;
