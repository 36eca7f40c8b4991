//! Tunables for a [`DescriptorTableCache`](crate::DescriptorTableCache).

use crate::descriptor::DescriptorPoolType;

/// Settings for a descriptor table cache.
/// # Example
/// ```
/// use deimos::prelude::*;
///
/// let settings = CacheSettings::new()
///     .initial_capacity(DescriptorPoolType::Resource, 1024)
///     .growth_factor(1.5)
///     .name("scene");
/// let cache = DescriptorTableCache::with_settings(HostDevice::new(), settings);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Capacity of a pool that is created on first use without an explicit
    /// [`allocate_descriptor_pool`](crate::DescriptorTableCache::allocate_descriptor_pool) call, per pool type.
    pub initial_capacity: [u32; DescriptorPoolType::COUNT],
    /// Factor the capacity of a pool is multiplied with when it has to grow.
    pub growth_factor: f32,
    /// Number of [`next_frame`](crate::DescriptorTableCache::next_frame) calls a replaced pool generation
    /// stays alive for.
    pub retire_frames: u32,
    /// Name used to label pools for debuggers.
    pub name: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            initial_capacity: [256, 32, 16],
            growth_factor: 2.0,
            retire_frames: 4,
            name: None,
        }
    }
}

impl CacheSettings {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial capacity of pools of one type. A capacity of zero is raised to one.
    pub fn initial_capacity(mut self, ty: DescriptorPoolType, capacity: u32) -> Self {
        self.initial_capacity[ty as usize] = capacity.max(1);
        self
    }

    /// Set the growth factor. Factors below one are clamped to one, growth then only makes room for the request.
    pub fn growth_factor(mut self, factor: f32) -> Self {
        self.growth_factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    /// Set the number of frames a replaced pool generation stays alive.
    pub fn retire_frames(mut self, frames: u32) -> Self {
        self.retire_frames = frames;
        self
    }

    /// Set the debug name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Capacity a pool grows to when `requested` slots do not fit next to `used` slots in a pool of `capacity`.
    pub(crate) fn grown_capacity(&self, capacity: u32, used: u32, requested: u32) -> u32 {
        let scaled = (capacity as f64 * self.growth_factor as f64).ceil().min(u32::MAX as f64) as u32;
        scaled.max(used.saturating_add(requested))
    }
}
