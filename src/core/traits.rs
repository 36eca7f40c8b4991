//! Defines traits for core

/// Direct access to the object's handle's as_raw representation
pub trait AsRaw {
    /// Get the as_raw u64 value of the handle underlying the object
    fn as_raw(&self) -> u64;
}
