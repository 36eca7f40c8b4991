//! Exposes the deimos error type

use std::sync::PoisonError;

use thiserror::Error;

use crate::sampler::SamplerPreset;

/// Error type that deimos can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Tried to allocate a descriptor pool that can not hold any descriptors.
    #[error("Descriptor pools must have a capacity of at least one descriptor.")]
    ZeroCapacityPool,
    /// The device ran out of memory to back a descriptor pool.
    #[error("Out of descriptor memory: requested `{requested}` descriptors, `{available}` available.")]
    OutOfDescriptorMemory {
        /// Number of descriptors requested
        requested: u64,
        /// Number of descriptors the device could still allocate
        available: u64,
    },
    /// Tried to record an empty range of descriptors or samplers into a table builder.
    #[error("Descriptor ranges must contain at least one descriptor.")]
    EmptyDescriptorRange,
    /// `start + count` of a descriptor range does not fit in a table.
    #[error("Descriptor range starting at `{0}` overflows the maximum table size.")]
    DescriptorRangeOverflow(u32),
    /// A single table builder recorded ranges for more than one pool index.
    #[error("Table builder mixes descriptor pool indices `{0}` and `{1}`.")]
    MixedPoolIndex(u8, u8),
    /// Tried to realize a table from a builder with no recorded content.
    #[error("Empty descriptor table.")]
    EmptyDescriptorTable,
    /// Pool handle passed to the device does not refer to a live pool.
    #[error("Descriptor pool handle does not refer to a live pool.")]
    InvalidPool,
    /// Descriptor write falls outside of the destination pool.
    #[error("Descriptor range `{offset}..{offset}+{count}` is out of range of a pool with capacity `{capacity}`.")]
    PoolOutOfRange {
        /// First slot of the write
        offset: u32,
        /// Number of slots written
        count: u32,
        /// Capacity of the pool
        capacity: u32,
    },
    /// A descriptor table was used after the pool generation it was issued from was replaced.
    #[error("Stale descriptor table: issued from pool generation `{found}`, current generation is `{expected}`.")]
    StaleTable {
        /// Current generation of the pool
        expected: u64,
        /// Generation stored in the table
        found: u64,
    },
    /// A donor table is too small to hold the requested content.
    #[error("Descriptor table too small: `{needed}` slots needed, `{available}` available.")]
    TableTooSmall {
        /// Slots needed by the new content
        needed: u32,
        /// Slots in the donor table
        available: u32,
    },
    /// Constructing a sampler for a preset failed. Presets should always be constructible,
    /// so this indicates a misconfigured device.
    #[error("Failed to create sampler for preset `{0:?}`.")]
    SamplerCreationFailed(SamplerPreset),
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
