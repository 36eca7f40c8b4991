//! The device is the collaborator that owns descriptor memory. The cache only does bookkeeping:
//! it asks the device for pools, tells it where to copy descriptors, and asks it to construct samplers.
//!
//! Any backend can be plugged in by implementing [`DescriptorDevice`]. [`HostDevice`](crate::core::host::HostDevice)
//! is a reference implementation backed by host memory.

use std::fmt::{Display, Formatter};

use anyhow::Result;

use crate::core::traits::AsRaw;
use crate::descriptor::{Descriptor, DescriptorPoolType};
use crate::sampler::SamplerInfo;

/// Opaque handle to a descriptor pool allocated by a [`DescriptorDevice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PoolHandle(u64);

impl PoolHandle {
    /// Wrap a raw backend pool handle.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl AsRaw for PoolHandle {
    fn as_raw(&self) -> u64 {
        self.0
    }
}

impl Display for PoolHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Result of a successful pool allocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolAllocation {
    /// Handle used to refer to the pool in later device calls.
    pub handle: PoolHandle,
    /// Address of the first slot in the pool. Slot `i` lives at `base + i * stride`.
    pub base: Descriptor,
}

/// Abstraction over the driver object that physically allocates descriptor memory.
///
/// All calls are synchronous. Implementations are expected to be cheap to clone, so the cache and
/// every pool it owns can keep a handle to the device.
pub trait DescriptorDevice: Clone + 'static {
    /// Distance in bytes between two consecutive slots of a pool of the given type.
    fn descriptor_stride(&self, ty: DescriptorPoolType) -> u32;

    /// Allocate a pool that can hold `capacity` descriptors.
    /// # Errors
    /// - Fails if `capacity` is zero.
    /// - Fails if the device is out of descriptor memory.
    fn allocate_pool(&self, ty: DescriptorPoolType, capacity: u32) -> Result<PoolAllocation>;

    /// Release a pool. Any descriptor address inside it becomes invalid.
    fn destroy_pool(&self, pool: PoolHandle);

    /// Copy `descriptors` into the slots `[offset, offset + descriptors.len())` of `pool`.
    /// # Errors
    /// - Fails if the pool is not alive, or the range does not fit in it.
    fn write_descriptors(&self, pool: PoolHandle, offset: u32, descriptors: &[Descriptor]) -> Result<()>;

    /// Construct a sampler and return the descriptor that can be copied into sampler tables.
    fn create_sampler(&self, info: &SamplerInfo) -> Result<Descriptor>;

    /// Attach a debug name to a pool. Does nothing by default.
    fn set_pool_name(&self, _pool: PoolHandle, _name: &str) {}
}
