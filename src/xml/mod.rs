//! XML wire format of the blob service: response parsing and request bodies.

pub mod deserialize;
pub mod serialize;

pub use deserialize::*;
pub use serialize::*;
