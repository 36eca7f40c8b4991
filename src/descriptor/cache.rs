use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::core::device::DescriptorDevice;
use crate::core::host::HostDevice;
use crate::descriptor::builder::DescriptorTableBuilder;
use crate::descriptor::descriptor_pool::{DescriptorPool, DescriptorPoolType};
use crate::descriptor::settings::CacheSettings;
use crate::descriptor::{Descriptor, DescriptorTable, Framebuffer};
use crate::sampler::{Sampler, SamplerPreset, SamplerRegistry};
use crate::util::deferred_delete::DeletionQueue;
use crate::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PoolId {
    ty: DescriptorPoolType,
    index: u8,
}

/// Bookkeeping for one (type, index) pair. Survives pool resets so generations keep increasing.
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Default(bound = ""))]
struct PoolState<D: DescriptorDevice> {
    pool: Option<DescriptorPool<D>>,
    used: u32,
    generation: u64,
}

/// A realized table together with the content needed to re-issue it into a new pool generation.
#[derive(Debug, Clone)]
struct CachedTable {
    table: DescriptorTable,
    content: Vec<Descriptor>,
}

/// This structure maps table content to realized [`DescriptorTable`]s, and owns the descriptor pools
/// those tables live in. Pools are created on first use and grow automatically when they run out of space.
///
/// Growing replaces a pool with a larger generation. Every cached table is re-issued into the new generation
/// at the same offset, so tables obtained before the growth must be fetched again.
/// Tables from a replaced generation can be detected with [`DescriptorTableCache::validate_table`].
///
/// # Example
/// ```
/// use deimos::prelude::*;
///
/// let device = HostDevice::new();
/// let mut cache = DescriptorTableCache::new(device);
/// cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 64, 0)?;
///
/// let mut builder = DescriptorTableBuilder::new();
/// builder.set_descriptors(0, &[Descriptor::from_raw(0x40)], 0)?;
/// let first = builder.get_resource_table(&mut cache, None)?;
/// let second = builder.get_resource_table(&mut cache, None)?;
/// assert_eq!(first, second);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct DescriptorTableCache<D: DescriptorDevice = HostDevice> {
    #[derivative(Debug = "ignore")]
    device: D,
    settings: CacheSettings,
    strides: [u32; DescriptorPoolType::COUNT],
    pools: HashMap<PoolId, PoolState<D>>,
    tables: [HashMap<String, CachedTable>; DescriptorPoolType::COUNT],
    samplers: SamplerRegistry<D>,
    retired_pools: DeletionQueue<DescriptorPool<D>>,
}

impl<D: DescriptorDevice> DescriptorTableCache<D> {
    /// Create a new descriptor table cache with default settings. No pools are allocated until they are needed.
    pub fn new(device: D) -> Self {
        Self::with_settings(device, CacheSettings::default())
    }

    /// Create a new descriptor table cache.
    pub fn with_settings(device: D, settings: CacheSettings) -> Self {
        let strides = DescriptorPoolType::ALL.map(|ty| device.descriptor_stride(ty));
        Self {
            device,
            strides,
            pools: HashMap::new(),
            tables: Default::default(),
            samplers: SamplerRegistry::new(),
            retired_pools: DeletionQueue::new(settings.retire_frames),
            settings,
        }
    }

    /// The device this cache allocates from.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The settings this cache was created with.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Change the debug name of this cache. Live pools are renamed as well.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.settings.name = Some(name.into());
        for (id, state) in &self.pools {
            if let Some(pool) = &state.pool {
                self.name_pool(*id, pool);
            }
        }
    }

    /// Access the sampler registry, for example to replace the construction function of a preset.
    pub fn samplers(&mut self) -> &mut SamplerRegistry<D> {
        &mut self.samplers
    }

    fn name_pool(&self, id: PoolId, pool: &DescriptorPool<D>) {
        if let Some(name) = &self.settings.name {
            pool.set_name(&format!("{name}.{}Pool{}", id.ty, id.index));
        }
    }

    /// Allocate a pool that can hold at least `num_descriptors` descriptors for the given type and index.
    /// Does nothing if the current pool is already large enough. Tables in a smaller existing pool are moved
    /// into the new pool.
    /// # Errors
    /// - Fails if `num_descriptors` is zero.
    /// - Fails if the device cannot allocate the pool. The existing pool is kept in that case.
    pub fn allocate_descriptor_pool(&mut self, ty: DescriptorPoolType, num_descriptors: u32, index: u8) -> Result<()> {
        if num_descriptors == 0 {
            anyhow::bail!(Error::ZeroCapacityPool);
        }
        let id = PoolId { ty, index };
        if let Some(pool) = self.pools.get(&id).and_then(|state| state.pool.as_ref()) {
            if pool.capacity() >= num_descriptors {
                return Ok(());
            }
        }
        self.reallocate(id, num_descriptors)
    }

    /// Release the pool for the given type and index, and forget every table that lived in it.
    pub fn reset_descriptor_pool(&mut self, ty: DescriptorPoolType, index: u8) {
        let id = PoolId { ty, index };
        let Some(state) = self.pools.get_mut(&id) else { return };
        if let Some(pool) = state.pool.take() {
            debug!("Resetting {ty} descriptor pool {index} (generation {})", pool.generation());
            self.retired_pools.push(pool);
        }
        state.used = 0;
        self.tables[ty as usize].retain(|_, entry| entry.table.pool_index != index);
    }

    /// Get the live pool for the given type and index, if one was allocated.
    pub fn get_descriptor_pool(&self, ty: DescriptorPoolType, index: u8) -> Option<&DescriptorPool<D>> {
        self.pools.get(&PoolId { ty, index }).and_then(|state| state.pool.as_ref())
    }

    /// Distance between two slots in pools of the given type.
    pub fn get_descriptor_stride(&self, ty: DescriptorPoolType) -> u32 {
        self.strides[ty as usize]
    }

    /// Get the shared sampler for a preset, constructing it on first use.
    pub fn get_sampler(&mut self, preset: SamplerPreset) -> Result<Arc<Sampler>> {
        self.samplers.get(&self.device, preset)
    }

    /// Number of slots handed out from the pool for the given type and index.
    pub fn descriptor_count(&self, ty: DescriptorPoolType, index: u8) -> u32 {
        self.pools.get(&PoolId { ty, index }).map(|state| state.used).unwrap_or_default()
    }

    /// Number of tables cached for the given pool type.
    pub fn cached_table_count(&self, ty: DescriptorPoolType) -> usize {
        self.tables[ty as usize].len()
    }

    /// Check that a table was issued from the current generation of its pool.
    /// # Errors
    /// - Fails with [`Error::StaleTable`] if the pool was replaced or reset since the table was issued.
    pub fn validate_table(&self, table: &DescriptorTable) -> Result<()> {
        let current = self
            .get_descriptor_pool(table.ty, table.pool_index)
            .map(|pool| pool.generation())
            .unwrap_or_default();
        if current != table.generation {
            anyhow::bail!(Error::StaleTable {
                expected: current,
                found: table.generation,
            });
        }
        Ok(())
    }

    /// Advance the cache to the next frame. Replaced pool generations are destroyed once they are old enough.
    pub fn next_frame(&mut self) {
        self.retired_pools.next_frame();
    }

    /// Realize a resource table for the builder's content, even if a table with equal content exists.
    /// If `table` is given, its slots are reused instead of allocating new ones.
    /// # Errors
    /// - Fails if the builder is empty.
    /// - Fails if `table` was issued from a replaced pool generation, or is too small.
    /// - Fails if the pool had to grow and the device could not allocate the new pool.
    pub fn create_resource_table(&mut self, builder: &DescriptorTableBuilder, table: Option<&DescriptorTable>) -> Result<DescriptorTable> {
        let key = builder.key().to_owned();
        self.create_table(DescriptorPoolType::Resource, key, builder, table)
    }

    /// Get the resource table for the builder's content. The table is only realized if the cache has
    /// no table for this content yet.
    /// # Errors
    /// See [`DescriptorTableCache::create_resource_table`].
    pub fn get_resource_table(&mut self, builder: &DescriptorTableBuilder, table: Option<&DescriptorTable>) -> Result<DescriptorTable> {
        self.get_table(DescriptorPoolType::Resource, builder.key(), builder, table)
    }

    /// Realize a sampler table for the builder's content, even if a table with equal content exists.
    /// # Errors
    /// See [`DescriptorTableCache::create_resource_table`].
    pub fn create_sampler_table(&mut self, builder: &DescriptorTableBuilder, table: Option<&DescriptorTable>) -> Result<DescriptorTable> {
        let key = builder.key().to_owned();
        self.create_table(DescriptorPoolType::Sampler, key, builder, table)
    }

    /// Get the sampler table for the builder's content. The table is only realized if the cache has
    /// no table for this content yet.
    /// # Errors
    /// See [`DescriptorTableCache::create_resource_table`].
    pub fn get_sampler_table(&mut self, builder: &DescriptorTableBuilder, table: Option<&DescriptorTable>) -> Result<DescriptorTable> {
        self.get_table(DescriptorPoolType::Sampler, builder.key(), builder, table)
    }

    /// Realize a framebuffer with the builder's descriptors as render targets.
    /// A builder without content gives a framebuffer with only a depth/stencil attachment, which needs no slots.
    /// # Errors
    /// - Fails if both the builder and `depth_stencil` are empty.
    /// - See [`DescriptorTableCache::create_resource_table`].
    pub fn create_framebuffer(
        &mut self,
        builder: &DescriptorTableBuilder,
        depth_stencil: Option<Descriptor>,
        framebuffer: Option<&Framebuffer>,
    ) -> Result<Framebuffer> {
        if builder.is_empty() {
            return Self::depth_only_framebuffer(depth_stencil);
        }
        let key = framebuffer_key(builder, depth_stencil);
        let donor = framebuffer.and_then(|framebuffer| framebuffer.render_targets.as_ref());
        let table = self.create_table(DescriptorPoolType::RenderTarget, key, builder, donor)?;
        Ok(Framebuffer {
            render_targets: Some(table),
            depth_stencil,
        })
    }

    /// Get the framebuffer for the builder's descriptors and `depth_stencil`, realizing it only if the cache
    /// has no framebuffer for this content yet.
    /// # Errors
    /// See [`DescriptorTableCache::create_framebuffer`].
    pub fn get_framebuffer(
        &mut self,
        builder: &DescriptorTableBuilder,
        depth_stencil: Option<Descriptor>,
        framebuffer: Option<&Framebuffer>,
    ) -> Result<Framebuffer> {
        if builder.is_empty() {
            return Self::depth_only_framebuffer(depth_stencil);
        }
        let key = framebuffer_key(builder, depth_stencil);
        let donor = framebuffer.and_then(|framebuffer| framebuffer.render_targets.as_ref());
        let table = self.get_table(DescriptorPoolType::RenderTarget, &key, builder, donor)?;
        Ok(Framebuffer {
            render_targets: Some(table),
            depth_stencil,
        })
    }

    fn depth_only_framebuffer(depth_stencil: Option<Descriptor>) -> Result<Framebuffer> {
        match depth_stencil {
            Some(depth_stencil) => Ok(Framebuffer {
                render_targets: None,
                depth_stencil: Some(depth_stencil),
            }),
            None => Err(Error::EmptyDescriptorTable.into()),
        }
    }

    fn get_table(
        &mut self,
        ty: DescriptorPoolType,
        key: &str,
        builder: &DescriptorTableBuilder,
        donor: Option<&DescriptorTable>,
    ) -> Result<DescriptorTable> {
        if let Some(entry) = self.tables[ty as usize].get(key) {
            trace!("{ty} table cache hit for key {key}");
            return Ok(entry.table);
        }
        trace!("{ty} table cache miss for key {key}");
        self.create_table(ty, key.to_owned(), builder, donor)
    }

    fn create_table(
        &mut self,
        ty: DescriptorPoolType,
        key: String,
        builder: &DescriptorTableBuilder,
        donor: Option<&DescriptorTable>,
    ) -> Result<DescriptorTable> {
        let content = builder.descriptors();
        if content.is_empty() {
            anyhow::bail!(Error::EmptyDescriptorTable);
        }
        let count = content.len() as u32;

        let table = match donor {
            Some(donor) => {
                self.validate_table(donor)?;
                if donor.ty != ty || donor.pool_index != builder.pool_index() {
                    anyhow::bail!(Error::Uncategorized("Donor table belongs to a different descriptor pool"));
                }
                if donor.len < count {
                    anyhow::bail!(Error::TableTooSmall {
                        needed: count,
                        available: donor.len,
                    });
                }
                // Content previously cached in the donor's slots is overwritten.
                let (start, end) = (donor.offset, donor.offset + donor.len);
                self.tables[ty as usize].retain(|_, entry| {
                    entry.table.pool_index != donor.pool_index
                        || entry.table.offset + entry.table.len <= start
                        || entry.table.offset >= end
                });
                DescriptorTable {
                    len: count,
                    ..*donor
                }
            }
            None => {
                let id = PoolId {
                    ty,
                    index: builder.pool_index(),
                };
                self.reserve(id, count)?
            }
        };

        let pool = self
            .get_descriptor_pool(ty, table.pool_index)
            .ok_or(Error::InvalidPool)?;
        pool.write(table.offset, content)?;

        self.tables[ty as usize].insert(
            key,
            CachedTable {
                table,
                content: content.to_vec(),
            },
        );
        Ok(table)
    }

    /// Hand out `count` consecutive slots of a pool, allocating or growing the pool first if needed.
    fn reserve(&mut self, id: PoolId, count: u32) -> Result<DescriptorTable> {
        let state = self.pools.entry(id).or_default();
        let (capacity, used) = (state.pool.as_ref().map(|pool| pool.capacity()), state.used);
        match capacity {
            None => {
                let initial = self.settings.initial_capacity[id.ty as usize];
                self.reallocate(id, initial.max(used.saturating_add(count)))?;
            }
            Some(capacity) if used.saturating_add(count) > capacity => {
                let grown = self.settings.grown_capacity(capacity, used, count);
                if count > capacity {
                    warn!("Single request of {count} descriptors is larger than {} pool {} ({capacity} descriptors)", id.ty, id.index);
                }
                self.reallocate(id, grown)?;
            }
            Some(_) => {}
        }

        let state = self.pools.get_mut(&id).ok_or(Error::InvalidPool)?;
        let pool = state.pool.as_ref().ok_or(Error::InvalidPool)?;
        let offset = state.used;
        state.used += count;
        Ok(DescriptorTable {
            ty: id.ty,
            pool_index: id.index,
            generation: pool.generation(),
            offset,
            len: count,
            stride: pool.stride(),
            handle: pool.slot(offset),
        })
    }

    /// Replace the pool for `id` with a new generation of `capacity` slots, and re-issue every cached table
    /// of that pool into it at the same offset. If anything fails, the old generation stays in place.
    fn reallocate(&mut self, id: PoolId, capacity: u32) -> Result<()> {
        let state = self.pools.entry(id).or_default();
        let generation = state.generation + 1;
        let pool = DescriptorPool::new(self.device.clone(), id.ty, capacity, generation)?;

        let tables = &mut self.tables[id.ty as usize];
        for entry in tables.values().filter(|entry| entry.table.pool_index == id.index) {
            // The new pool is dropped (and destroyed) on failure.
            pool.write(entry.table.offset, &entry.content)?;
        }
        for entry in tables.values_mut().filter(|entry| entry.table.pool_index == id.index) {
            entry.table.generation = generation;
            entry.table.stride = pool.stride();
            entry.table.handle = pool.slot(entry.table.offset);
        }

        match &state.pool {
            Some(old) => debug!(
                "Growing {} descriptor pool {} from {} to {capacity} descriptors ({} in use)",
                id.ty,
                id.index,
                old.capacity(),
                state.used
            ),
            None => debug!("Allocated {} descriptor pool {} with {capacity} descriptors", id.ty, id.index),
        }

        if let Some(name) = &self.settings.name {
            pool.set_name(&format!("{name}.{}Pool{}", id.ty, id.index));
        }
        state.generation = generation;
        if let Some(old) = state.pool.replace(pool) {
            self.retired_pools.push(old);
        }
        Ok(())
    }
}

/// Framebuffers with equal render targets but different depth/stencil attachments are different framebuffers.
fn framebuffer_key(builder: &DescriptorTableBuilder, depth_stencil: Option<Descriptor>) -> String {
    match depth_stencil {
        Some(depth_stencil) => format!("{}ds{depth_stencil};", builder.key()),
        None => builder.key().to_owned(),
    }
}
