//! The core module holds the device abstraction the descriptor cache allocates and writes through,
//! along with the error type.

pub mod device;
pub mod error;
pub mod host;
pub mod traits;
