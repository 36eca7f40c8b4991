#![allow(dead_code)]

use anyhow::Result;

use deimos::prelude::*;

#[derive(Debug)]
pub struct Context {
    pub device: HostDevice,
    pub cache: DescriptorTableCache<HostDevice>,
}

fn init_logging() {
    // Multiple tests in one binary all try to install the logger, only the first one succeeds.
    let _ = pretty_env_logger::try_init();
}

/// Creates a cache on top of a fresh host device, ready for automated tests
pub fn make_context() -> Context {
    make_context_with_settings(|settings| settings)
}

/// Create a cache with custom settings
pub fn make_context_with_settings<F: FnOnce(CacheSettings) -> CacheSettings>(callback: F) -> Context {
    init_logging();
    let device = HostDevice::new();
    let cache = DescriptorTableCache::with_settings(device.clone(), callback(CacheSettings::new().name("test")));
    Context {
        device,
        cache,
    }
}

/// Create a cache on a host device that can hold at most `limit` live descriptors
pub fn make_context_with_memory_limit(limit: u64) -> Context {
    init_logging();
    let device = HostDevice::with_settings(HostDeviceSettings {
        memory_limit: Some(limit),
        ..Default::default()
    });
    let cache = DescriptorTableCache::new(device.clone());
    Context {
        device,
        cache,
    }
}

pub fn descriptors(raw: &[u64]) -> Vec<Descriptor> {
    raw.iter().copied().map(Descriptor::from_raw).collect()
}

/// Builder with a single descriptor range in pool 0
pub fn builder(start: u32, raw: &[u64]) -> Result<DescriptorTableBuilder> {
    builder_in_pool(start, raw, 0)
}

pub fn builder_in_pool(start: u32, raw: &[u64], pool_index: u8) -> Result<DescriptorTableBuilder> {
    let mut builder = DescriptorTableBuilder::new();
    builder.set_descriptors(start, &descriptors(raw), pool_index)?;
    Ok(builder)
}
