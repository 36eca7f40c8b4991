//! The table builder records the content of a descriptor table without touching any allocator. Once the content
//! is complete, it is handed to a [`DescriptorTableCache`] which either returns a table with equal content it
//! realized earlier, or realizes a new one.
//!
//! Every `set_xxx` call appends a record to the builder's key. Two builders that see the same sequence of calls
//! with equal arguments have equal keys, and will therefore share one table.

use anyhow::Result;

use crate::core::device::DescriptorDevice;
use crate::core::traits::AsRaw;
use crate::descriptor::cache::DescriptorTableCache;
use crate::descriptor::{Descriptor, DescriptorTable, Framebuffer};
use crate::sampler::SamplerPreset;
use crate::Error;

/// Largest slot index + 1 a table can have.
pub const MAX_TABLE_DESCRIPTORS: u32 = 1 << 20;

/// This structure is used to build up the content of descriptor tables.
/// # Example usage
/// ```
/// # use deimos::prelude::*;
/// # fn main() -> anyhow::Result<()> {
/// let mut cache = DescriptorTableCache::new(HostDevice::new());
/// let textures = [Descriptor::from_raw(0x100), Descriptor::from_raw(0x200)];
///
/// let mut builder = DescriptorTableBuilder::new();
/// builder.set_descriptors(0, &textures, 0)?;
/// let table = builder.get_resource_table(&mut cache, None)?;
///
/// let mut samplers = DescriptorTableBuilder::new();
/// samplers.set_samplers(0, &[SamplerPreset::LinearWrap, SamplerPreset::PointClamp], &mut cache, 0)?;
/// let sampler_table = samplers.get_sampler_table(&mut cache, None)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DescriptorTableBuilder {
    key: String,
    slots: Vec<Descriptor>,
    pool_index: Option<u8>,
}

impl DescriptorTableBuilder {
    /// Create a new empty table builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the range and pool index of a new record, and make room for it in the slot array.
    fn reserve(&mut self, start: u32, count: usize, pool_index: u8) -> Result<()> {
        if count == 0 {
            anyhow::bail!(Error::EmptyDescriptorRange);
        }
        let end = u32::try_from(count)
            .ok()
            .and_then(|count| start.checked_add(count))
            .filter(|&end| end <= MAX_TABLE_DESCRIPTORS)
            .ok_or(Error::DescriptorRangeOverflow(start))?;
        match self.pool_index {
            Some(index) if index != pool_index => anyhow::bail!(Error::MixedPoolIndex(index, pool_index)),
            _ => self.pool_index = Some(pool_index),
        }
        if self.slots.len() < end as usize {
            self.slots.resize(end as usize, Descriptor::NULL);
        }
        Ok(())
    }

    /// Record that slots `[start, start + descriptors.len())` of the table hold copies of `descriptors`.
    /// Later calls overwrite slots recorded by earlier calls.
    /// # Errors
    /// - Fails if `descriptors` is empty.
    /// - Fails if the range does not fit in a table.
    /// - Fails if an earlier call used a different pool index.
    pub fn set_descriptors(&mut self, start: u32, descriptors: &[Descriptor], pool_index: u8) -> Result<()> {
        self.reserve(start, descriptors.len(), pool_index)?;
        let content = descriptors
            .iter()
            .map(|descriptor| format!("{:x}", descriptor.as_raw()))
            .collect::<Vec<_>>()
            .join(",");
        self.key.push_str(&format!("d{start}+{}@{pool_index}[{content}];", descriptors.len()));
        self.slots[start as usize..start as usize + descriptors.len()].copy_from_slice(descriptors);
        Ok(())
    }

    /// Record that slots `[start, start + presets.len())` of the table hold the samplers for `presets`.
    /// Samplers that were not requested before are constructed through the cache's sampler registry.
    /// # Errors
    /// - Fails if `presets` is empty.
    /// - Fails if the range does not fit in a table.
    /// - Fails if an earlier call used a different pool index.
    /// - Fails if a sampler could not be constructed.
    pub fn set_samplers<D: DescriptorDevice>(
        &mut self,
        start: u32,
        presets: &[SamplerPreset],
        cache: &mut DescriptorTableCache<D>,
        pool_index: u8,
    ) -> Result<()> {
        let samplers = presets
            .iter()
            .map(|&preset| cache.get_sampler(preset).map(|sampler| sampler.descriptor()))
            .collect::<Result<Vec<_>>>()?;
        self.reserve(start, presets.len(), pool_index)?;
        // Record the sampler itself, the descriptor behind a preset changes when its construction is replaced.
        let content = presets
            .iter()
            .zip(&samplers)
            .map(|(&preset, sampler)| format!("{}:{:x}", preset as u8, sampler.as_raw()))
            .collect::<Vec<_>>()
            .join(",");
        self.key.push_str(&format!("s{start}+{}@{pool_index}[{content}];", presets.len()));
        self.slots[start as usize..start as usize + samplers.len()].copy_from_slice(&samplers);
        Ok(())
    }

    /// Realize this content as a new resource table, even if a table with equal content exists.
    /// If `table` is given, the content is written into its slots instead of newly allocated ones.
    pub fn create_resource_table<D: DescriptorDevice>(
        &self,
        cache: &mut DescriptorTableCache<D>,
        table: Option<&DescriptorTable>,
    ) -> Result<DescriptorTable> {
        cache.create_resource_table(self, table)
    }

    /// Get a resource table with this content, realizing it only if the cache has none yet.
    pub fn get_resource_table<D: DescriptorDevice>(
        &self,
        cache: &mut DescriptorTableCache<D>,
        table: Option<&DescriptorTable>,
    ) -> Result<DescriptorTable> {
        cache.get_resource_table(self, table)
    }

    /// Realize this content as a new sampler table, even if a table with equal content exists.
    pub fn create_sampler_table<D: DescriptorDevice>(
        &self,
        cache: &mut DescriptorTableCache<D>,
        table: Option<&DescriptorTable>,
    ) -> Result<DescriptorTable> {
        cache.create_sampler_table(self, table)
    }

    /// Get a sampler table with this content, realizing it only if the cache has none yet.
    pub fn get_sampler_table<D: DescriptorDevice>(
        &self,
        cache: &mut DescriptorTableCache<D>,
        table: Option<&DescriptorTable>,
    ) -> Result<DescriptorTable> {
        cache.get_sampler_table(self, table)
    }

    /// Realize the recorded descriptors as render targets of a new framebuffer.
    pub fn create_framebuffer<D: DescriptorDevice>(
        &self,
        cache: &mut DescriptorTableCache<D>,
        depth_stencil: Option<Descriptor>,
        framebuffer: Option<&Framebuffer>,
    ) -> Result<Framebuffer> {
        cache.create_framebuffer(self, depth_stencil, framebuffer)
    }

    /// Get a framebuffer with the recorded descriptors as render targets, realizing it only if the cache has none yet.
    pub fn get_framebuffer<D: DescriptorDevice>(
        &self,
        cache: &mut DescriptorTableCache<D>,
        depth_stencil: Option<Descriptor>,
        framebuffer: Option<&Framebuffer>,
    ) -> Result<Framebuffer> {
        cache.get_framebuffer(self, depth_stencil, framebuffer)
    }

    /// The key derived from the recorded content.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Content of every slot of the table, unassigned slots hold [`Descriptor::NULL`].
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.slots
    }

    /// Pool index the table will be allocated from.
    pub fn pool_index(&self) -> u8 {
        self.pool_index.unwrap_or_default()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
