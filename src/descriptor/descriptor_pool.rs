//! A descriptor pool is one generation of device memory backing the tables of a (type, index) pair.
//! It is completely managed by the [`DescriptorTableCache`](crate::DescriptorTableCache), which replaces it
//! wholesale when it runs out of space.

use std::fmt::{Display, Formatter};

use anyhow::Result;

use crate::core::device::{DescriptorDevice, PoolHandle};
use crate::descriptor::Descriptor;

/// The kind of descriptors a pool holds. Every kind has its own set of pools, its own stride and its own
/// table cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorPoolType {
    /// Buffers, sampled images and storage resources.
    Resource = 0,
    /// Filtering samplers.
    Sampler = 1,
    /// Render target attachments.
    RenderTarget = 2,
}

impl DescriptorPoolType {
    /// Number of pool types.
    pub const COUNT: usize = 3;
    /// Every pool type, in index order.
    pub const ALL: [DescriptorPoolType; Self::COUNT] = [Self::Resource, Self::Sampler, Self::RenderTarget];
}

impl Display for DescriptorPoolType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Memory pool for descriptor tables
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct DescriptorPool<D: DescriptorDevice> {
    #[derivative(Debug = "ignore")]
    device: D,
    ty: DescriptorPoolType,
    handle: PoolHandle,
    base: Descriptor,
    capacity: u32,
    stride: u32,
    generation: u64,
}

impl<D: DescriptorDevice> DescriptorPool<D> {
    /// Allocate a new pool generation from the device.
    /// # Errors
    /// - Fails if the device cannot satisfy the allocation.
    pub(crate) fn new(device: D, ty: DescriptorPoolType, capacity: u32, generation: u64) -> Result<Self> {
        let allocation = device.allocate_pool(ty, capacity)?;
        let stride = device.descriptor_stride(ty);
        #[cfg(feature = "log-objects")]
        trace!("Created new {ty} descriptor pool {} (capacity {capacity}, generation {generation})", allocation.handle);
        Ok(Self {
            device,
            ty,
            handle: allocation.handle,
            base: allocation.base,
            capacity,
            stride,
            generation,
        })
    }

    /// Get the backend handle of this descriptor pool
    pub fn handle(&self) -> PoolHandle {
        self.handle
    }

    /// Kind of descriptors this pool holds.
    pub fn pool_type(&self) -> DescriptorPoolType {
        self.ty
    }

    /// Number of slots in this pool.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Distance between two slots.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Generation counter of this pool. Every replacement of a pool bumps this by one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Address of slot `index` in this pool.
    pub fn slot(&self, index: u32) -> Descriptor {
        self.base.offset(index, self.stride)
    }

    /// Copy descriptors into the pool, starting at slot `offset`.
    pub(crate) fn write(&self, offset: u32, descriptors: &[Descriptor]) -> Result<()> {
        self.device.write_descriptors(self.handle, offset, descriptors)
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.device.set_pool_name(self.handle, name);
    }
}

impl<D: DescriptorDevice> Drop for DescriptorPool<D> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying {} descriptor pool {} (generation {})", self.ty, self.handle, self.generation);
        self.device.destroy_pool(self.handle);
    }
}
