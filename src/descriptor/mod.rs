//! This module handles everything related to descriptor tables.
//! Similarly to a pipeline cache, this module exposes a [`DescriptorTableCache`] struct.
//! This struct owns the descriptor pools, hands out slot ranges from them and remembers which content
//! was realized where, so equal content is only ever written once.
//!
//! Descriptor pools automatically grow as more tables are allocated, removing the need to declare their size upfront.
//! A pool that grows is replaced by a new generation, and every table it held is re-issued into the new
//! generation at the same offset.
//!
//! To allocate descriptor tables, use the provided [`DescriptorTableBuilder`] structure to specify their content.
//!
//! # Example
//!
//! ```
//! use deimos::prelude::*;
//!
//! let mut cache = DescriptorTableCache::new(HostDevice::new());
//! let mut builder = DescriptorTableBuilder::new();
//! // In HLSL this would be a table with
//! // Texture2D albedo : register(t0); Texture2D normal : register(t1);
//! builder.set_descriptors(0, &[Descriptor::from_raw(0x1000), Descriptor::from_raw(0x2000)], 0)?;
//! let table = builder.get_resource_table(&mut cache, None)?;
//! assert_eq!(table.len(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Pool growth
//!
//! Physical addresses of tables change when their pool grows. Do not keep [`DescriptorTable`] values across calls
//! that may allocate. Fetch them again by content, or check them with [`DescriptorTableCache::validate_table`].

pub mod builder;
pub mod cache;
pub mod descriptor_pool;
pub mod descriptor_table;
pub mod settings;

pub use builder::DescriptorTableBuilder;
pub use cache::DescriptorTableCache;
pub use descriptor_pool::{DescriptorPool, DescriptorPoolType};
pub use descriptor_table::{Descriptor, DescriptorTable, Framebuffer};
pub use settings::CacheSettings;
