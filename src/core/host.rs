//! A [`DescriptorDevice`] that keeps descriptor memory on the host.
//!
//! Every pool gets its own address range, so descriptor tables can be resolved back to the pool
//! they live in. This makes the host device useful to inspect what the cache wrote, and to detect
//! reads through tables whose pool was already destroyed.
//!
//! # Example
//! ```
//! use deimos::prelude::*;
//!
//! let device = HostDevice::new();
//! let mut cache = DescriptorTableCache::new(device.clone());
//! let mut builder = DescriptorTableBuilder::new();
//! builder.set_descriptors(0, &[Descriptor::from_raw(0xa0), Descriptor::from_raw(0xb0)], 0)?;
//! let table = builder.get_resource_table(&mut cache, None)?;
//! assert_eq!(device.read_table(&table)?, vec![Descriptor::from_raw(0xa0), Descriptor::from_raw(0xb0)]);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::core::device::{DescriptorDevice, PoolAllocation, PoolHandle};
use crate::core::traits::AsRaw;
use crate::descriptor::{Descriptor, DescriptorPoolType, DescriptorTable};
use crate::sampler::SamplerInfo;
use crate::Error;

/// First address handed out for pool memory. Zero is reserved for [`Descriptor::NULL`].
const POOL_ADDRESS_BASE: u64 = 0x1_0000;
/// Pool address ranges are aligned to this value.
const POOL_ADDRESS_ALIGNMENT: u64 = 0x1000;
/// Sampler descriptors live in their own range, far away from pool memory.
const SAMPLER_ADDRESS_BASE: u64 = 0x7f00_0000_0000;

/// Settings for a [`HostDevice`].
#[derive(Debug, Copy, Clone)]
pub struct HostDeviceSettings {
    /// Slot stride for resource, sampler and render target pools, in that order.
    pub strides: [u32; DescriptorPoolType::COUNT],
    /// Maximum number of descriptors that can be alive across all pools at once.
    /// `None` means unlimited.
    pub memory_limit: Option<u64>,
}

impl Default for HostDeviceSettings {
    fn default() -> Self {
        Self {
            strides: [32, 16, 32],
            memory_limit: None,
        }
    }
}

/// Counters for the work a [`HostDevice`] performed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct HostDeviceStats {
    /// Number of pools allocated.
    pub pools_allocated: u64,
    /// Number of pools destroyed.
    pub pools_destroyed: u64,
    /// Number of `write_descriptors` calls.
    pub descriptor_writes: u64,
    /// Total number of descriptors copied by `write_descriptors`.
    pub descriptors_written: u64,
    /// Number of samplers constructed.
    pub samplers_created: u64,
}

#[derive(Debug)]
struct HostPool {
    ty: DescriptorPoolType,
    base: u64,
    name: Option<String>,
    capacity: u32,
    // Filled up to the highest written slot, slots past the end read as null.
    slots: Vec<Descriptor>,
}

impl HostPool {
    fn read(&self, offset: u32, count: u32) -> Result<Vec<Descriptor>> {
        let range = checked_range(offset, count, self.capacity)?;
        Ok(range
            .map(|slot| self.slots.get(slot).copied().unwrap_or(Descriptor::NULL))
            .collect())
    }

    fn write(&mut self, offset: u32, descriptors: &[Descriptor]) -> Result<()> {
        let range = checked_range(offset, descriptors.len() as u32, self.capacity)?;
        if self.slots.len() < range.end {
            self.slots.resize(range.end, Descriptor::NULL);
        }
        self.slots[range].copy_from_slice(descriptors);
        Ok(())
    }
}

#[derive(Debug)]
struct HostDeviceInner {
    memory_limit: Option<u64>,
    live_descriptors: u64,
    next_handle: u64,
    next_address: u64,
    pools: HashMap<PoolHandle, HostPool>,
    samplers: Vec<SamplerInfo>,
    stats: HostDeviceStats,
}

/// Host memory descriptor device. Internal state is wrapped in an `Arc<Mutex<_>>`, so this is cheap to clone
/// and all clones observe the same pools.
#[derive(Debug, Clone)]
pub struct HostDevice {
    strides: [u32; DescriptorPoolType::COUNT],
    inner: Arc<Mutex<HostDeviceInner>>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// Create a host device with default strides and no memory limit.
    pub fn new() -> Self {
        Self::with_settings(HostDeviceSettings::default())
    }

    /// Create a host device with custom settings.
    pub fn with_settings(settings: HostDeviceSettings) -> Self {
        Self {
            strides: settings.strides,
            inner: Arc::new(Mutex::new(HostDeviceInner {
                memory_limit: settings.memory_limit,
                live_descriptors: 0,
                next_handle: 1,
                next_address: POOL_ADDRESS_BASE,
                pools: HashMap::new(),
                samplers: Vec::new(),
                stats: HostDeviceStats::default(),
            })),
        }
    }

    /// Get a snapshot of the work counters.
    pub fn stats(&self) -> Result<HostDeviceStats> {
        Ok(self.inner.lock().map_err(Error::from)?.stats)
    }

    /// Number of pools that are currently alive.
    pub fn live_pools(&self) -> Result<usize> {
        Ok(self.inner.lock().map_err(Error::from)?.pools.len())
    }

    /// Debug name attached to a pool, if any.
    pub fn pool_name(&self, pool: PoolHandle) -> Result<Option<String>> {
        let inner = self.inner.lock().map_err(Error::from)?;
        let pool = inner.pools.get(&pool).ok_or(Error::InvalidPool)?;
        Ok(pool.name.clone())
    }

    /// Sampler description that was used to construct a sampler descriptor.
    pub fn sampler_info(&self, sampler: Descriptor) -> Result<Option<SamplerInfo>> {
        let inner = self.inner.lock().map_err(Error::from)?;
        let stride = self.strides[DescriptorPoolType::Sampler as usize].max(1) as u64;
        let Some(offset) = sampler.as_raw().checked_sub(SAMPLER_ADDRESS_BASE) else { return Ok(None) };
        Ok(inner.samplers.get((offset / stride) as usize).copied())
    }

    /// Read back `count` descriptors starting at slot `offset` of a pool.
    /// # Errors
    /// - Fails if the pool was destroyed or the range does not fit in it.
    pub fn read_descriptors(&self, pool: PoolHandle, offset: u32, count: u32) -> Result<Vec<Descriptor>> {
        let inner = self.inner.lock().map_err(Error::from)?;
        let pool = inner.pools.get(&pool).ok_or(Error::InvalidPool)?;
        pool.read(offset, count)
    }

    /// Read back the content of a descriptor table by resolving its address to the pool it lives in.
    /// # Errors
    /// - Fails if no live pool of the table's type contains the table's address range.
    pub fn read_table(&self, table: &DescriptorTable) -> Result<Vec<Descriptor>> {
        let inner = self.inner.lock().map_err(Error::from)?;
        let stride = self.strides[table.pool_type() as usize].max(1) as u64;
        let address = table.handle().as_raw();
        let pool = inner
            .pools
            .values()
            .filter(|pool| pool.ty == table.pool_type())
            .find(|pool| address >= pool.base && address < pool.base + pool.capacity as u64 * stride)
            .ok_or(Error::InvalidPool)?;
        let offset = ((address - pool.base) / stride) as u32;
        pool.read(offset, table.len())
    }
}

fn checked_range(offset: u32, count: u32, capacity: u32) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(count) {
        Some(end) if end <= capacity => Ok(offset as usize..end as usize),
        _ => Err(Error::PoolOutOfRange {
            offset,
            count,
            capacity,
        }
        .into()),
    }
}

impl DescriptorDevice for HostDevice {
    fn descriptor_stride(&self, ty: DescriptorPoolType) -> u32 {
        self.strides[ty as usize]
    }

    fn allocate_pool(&self, ty: DescriptorPoolType, capacity: u32) -> Result<PoolAllocation> {
        if capacity == 0 {
            anyhow::bail!(Error::ZeroCapacityPool);
        }

        let stride = self.descriptor_stride(ty).max(1) as u64;
        let mut inner = self.inner.lock().map_err(Error::from)?;
        if let Some(limit) = inner.memory_limit {
            let available = limit.saturating_sub(inner.live_descriptors);
            if capacity as u64 > available {
                anyhow::bail!(Error::OutOfDescriptorMemory {
                    requested: capacity as u64,
                    available,
                });
            }
        }

        let mut slots: Vec<Descriptor> = Vec::new();
        if slots.try_reserve_exact(capacity as usize).is_err() {
            anyhow::bail!(Error::OutOfDescriptorMemory {
                requested: capacity as u64,
                available: 0,
            });
        }

        let handle = PoolHandle::from_raw(inner.next_handle);
        let base = inner.next_address;
        let size = capacity as u64 * stride;
        inner.next_handle += 1;
        inner.next_address = (base + size).div_ceil(POOL_ADDRESS_ALIGNMENT) * POOL_ADDRESS_ALIGNMENT;
        inner.live_descriptors += capacity as u64;
        inner.stats.pools_allocated += 1;
        inner.pools.insert(
            handle,
            HostPool {
                ty,
                base,
                name: None,
                capacity,
                slots,
            },
        );

        Ok(PoolAllocation {
            handle,
            base: Descriptor::from_raw(base),
        })
    }

    fn destroy_pool(&self, pool: PoolHandle) {
        let Ok(mut inner) = self.inner.lock() else { return };
        if let Some(pool) = inner.pools.remove(&pool) {
            inner.live_descriptors -= pool.capacity as u64;
            inner.stats.pools_destroyed += 1;
        }
    }

    fn write_descriptors(&self, pool: PoolHandle, offset: u32, descriptors: &[Descriptor]) -> Result<()> {
        let mut inner = self.inner.lock().map_err(Error::from)?;
        let pool = inner.pools.get_mut(&pool).ok_or(Error::InvalidPool)?;
        pool.write(offset, descriptors)?;
        inner.stats.descriptor_writes += 1;
        inner.stats.descriptors_written += descriptors.len() as u64;
        Ok(())
    }

    fn create_sampler(&self, info: &SamplerInfo) -> Result<Descriptor> {
        let stride = self.descriptor_stride(DescriptorPoolType::Sampler).max(1) as u64;
        let mut inner = self.inner.lock().map_err(Error::from)?;
        let address = SAMPLER_ADDRESS_BASE + inner.samplers.len() as u64 * stride;
        inner.samplers.push(*info);
        inner.stats.samplers_created += 1;
        Ok(Descriptor::from_raw(address))
    }

    fn set_pool_name(&self, pool: PoolHandle, name: &str) {
        let Ok(mut inner) = self.inner.lock() else { return };
        if let Some(pool) = inner.pools.get_mut(&pool) {
            pool.name = Some(name.to_owned());
        }
    }
}
