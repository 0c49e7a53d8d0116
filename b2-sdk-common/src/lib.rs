//! Helpers shared by the b2 sdk crates: percent-encoding, sha1 digests and header conversion.

mod error;
pub mod helper;

pub use error::Error;
