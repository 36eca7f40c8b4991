pub use ash::vk;

pub use crate::core::device::{DescriptorDevice, PoolAllocation, PoolHandle};
pub use crate::core::error::Error;
pub use crate::core::host::{HostDevice, HostDeviceSettings, HostDeviceStats};
pub use crate::core::traits::*;

pub use crate::descriptor::builder::DescriptorTableBuilder;
pub use crate::descriptor::cache::DescriptorTableCache;
pub use crate::descriptor::descriptor_pool::{DescriptorPool, DescriptorPoolType};
pub use crate::descriptor::descriptor_table::{Descriptor, DescriptorTable, Framebuffer};
pub use crate::descriptor::settings::CacheSettings;

pub use crate::sampler::{Sampler, SamplerInfo, SamplerPreset, SamplerRegistry};

pub use crate::util::deferred_delete::DeletionQueue;
pub use crate::util::to_vk::AsVulkanType;
