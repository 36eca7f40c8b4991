//! Content-addressed descriptor table cache
//!
//! Deimos manages fixed-capacity pools of descriptors, groups descriptors into tables that are bound together
//! for a draw or dispatch, and deduplicates table creation: two requests describing the same content share
//! one allocation instead of writing the descriptors twice.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import types under a namespace.
//! use deimos::prelude as dm;
//!
//! // Or, if you dont care about using the types under a namespace
//! use deimos::prelude::*;
//! ```
//!
//! # Example
//!
//! The cache talks to descriptor memory through the [`DescriptorDevice`](crate::DescriptorDevice) trait.
//! [`HostDevice`](crate::HostDevice) implements it on top of host memory.
//! ```
//! use deimos::prelude::*;
//!
//! let device = HostDevice::new();
//! let mut cache = DescriptorTableCache::with_settings(device.clone(), CacheSettings::new().name("main"));
//! // Optional: reserve space upfront. Pools are also created on first use and grow on demand.
//! cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 4, 0)?;
//!
//! let mut builder = DescriptorTableBuilder::new();
//! builder.set_descriptors(0, &[Descriptor::from_raw(0xa), Descriptor::from_raw(0xb)], 0)?;
//! let table = builder.get_resource_table(&mut cache, None)?;
//!
//! let mut samplers = DescriptorTableBuilder::new();
//! samplers.set_samplers(0, &[SamplerPreset::AnisotropicWrap], &mut cache, 0)?;
//! let sampler_table = samplers.get_sampler_table(&mut cache, None)?;
//!
//! // Once per frame, so replaced pool generations can be destroyed.
//! cache.next_frame();
//! # Ok::<(), anyhow::Error>(())
//! ```
//! For further example code, check out the following modules
//! - [`descriptor`] for descriptor tables, pools and the cache.
//! - [`sampler`] for sampler presets.
//! - [`core`] for the device abstraction and the error type.
//! - [`util`] for various utilities.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

pub mod prelude;
pub use crate::prelude::*;

pub mod core;
pub mod descriptor;
pub mod sampler;
pub mod util;
