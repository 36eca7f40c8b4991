//! Samplers are built from a closed set of presets. The [`SamplerRegistry`] constructs each preset lazily
//! on first use and hands out the same [`Sampler`] for every later request.
//!
//! # Example
//! ```
//! use deimos::prelude::*;
//!
//! let mut cache = DescriptorTableCache::new(HostDevice::new());
//! let a = cache.get_sampler(SamplerPreset::LinearWrap)?;
//! let b = cache.get_sampler(SamplerPreset::LinearWrap)?;
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::core::device::DescriptorDevice;
use crate::descriptor::Descriptor;
use crate::util::to_vk::AsVulkanType;
use crate::Error;

/// Maximum anisotropy used by the anisotropic presets.
const MAX_ANISOTROPY: u32 = 16;

/// Fixed set of sampler configurations. Every preset combines a filter with an addressing mode,
/// the `LessEqual` presets are comparison samplers for depth lookups.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SamplerPreset {
    PointWrap,
    PointClamp,
    PointBorder,
    PointLessEqual,
    LinearWrap,
    LinearClamp,
    LinearBorder,
    LinearLessEqual,
    AnisotropicWrap,
    AnisotropicClamp,
    AnisotropicBorder,
    AnisotropicLessEqual,
}

impl SamplerPreset {
    /// Number of presets.
    pub const COUNT: usize = 12;
    /// Every preset, in declaration order.
    pub const ALL: [SamplerPreset; Self::COUNT] = [
        Self::PointWrap,
        Self::PointClamp,
        Self::PointBorder,
        Self::PointLessEqual,
        Self::LinearWrap,
        Self::LinearClamp,
        Self::LinearBorder,
        Self::LinearLessEqual,
        Self::AnisotropicWrap,
        Self::AnisotropicClamp,
        Self::AnisotropicBorder,
        Self::AnisotropicLessEqual,
    ];

    /// Get the sampler settings for this preset.
    pub fn info(&self) -> SamplerInfo {
        use SamplerPreset::*;

        let (filter, mipmap_mode, max_anisotropy) = match self {
            PointWrap | PointClamp | PointBorder | PointLessEqual => {
                (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST, 0)
            }
            LinearWrap | LinearClamp | LinearBorder | LinearLessEqual => {
                (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR, 0)
            }
            AnisotropicWrap | AnisotropicClamp | AnisotropicBorder | AnisotropicLessEqual => {
                (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR, MAX_ANISOTROPY)
            }
        };

        let (address_mode, border_color, compare_op) = match self {
            PointWrap | LinearWrap | AnisotropicWrap => {
                (vk::SamplerAddressMode::REPEAT, vk::BorderColor::FLOAT_OPAQUE_BLACK, None)
            }
            PointClamp | LinearClamp | AnisotropicClamp => {
                (vk::SamplerAddressMode::CLAMP_TO_EDGE, vk::BorderColor::FLOAT_OPAQUE_BLACK, None)
            }
            PointBorder | LinearBorder | AnisotropicBorder => {
                (vk::SamplerAddressMode::CLAMP_TO_BORDER, vk::BorderColor::FLOAT_OPAQUE_BLACK, None)
            }
            PointLessEqual | LinearLessEqual | AnisotropicLessEqual => (
                vk::SamplerAddressMode::CLAMP_TO_BORDER,
                vk::BorderColor::FLOAT_OPAQUE_WHITE,
                Some(vk::CompareOp::LESS_OR_EQUAL),
            ),
        };

        SamplerInfo {
            filter,
            mipmap_mode,
            address_mode,
            max_anisotropy,
            compare_op,
            border_color,
        }
    }
}

/// Settings of a sampler. Converts into a [`vk::SamplerCreateInfo`] through [`AsVulkanType`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SamplerInfo {
    /// Min and mag filter
    pub filter: vk::Filter,
    /// Filter between mip levels
    pub mipmap_mode: vk::SamplerMipmapMode,
    /// Addressing mode on all axes
    pub address_mode: vk::SamplerAddressMode,
    /// Maximum anisotropy, anisotropic filtering is disabled when this is zero.
    pub max_anisotropy: u32,
    /// Comparison function for depth comparison samplers.
    pub compare_op: Option<vk::CompareOp>,
    /// Border color used with [`vk::SamplerAddressMode::CLAMP_TO_BORDER`]
    pub border_color: vk::BorderColor,
}

impl AsVulkanType for SamplerInfo {
    type Output = vk::SamplerCreateInfo;

    fn as_vulkan(&self) -> Self::Output {
        vk::SamplerCreateInfo::builder()
            .mag_filter(self.filter)
            .min_filter(self.filter)
            .mipmap_mode(self.mipmap_mode)
            .address_mode_u(self.address_mode)
            .address_mode_v(self.address_mode)
            .address_mode_w(self.address_mode)
            .mip_lod_bias(0.0)
            .anisotropy_enable(self.max_anisotropy > 0)
            .max_anisotropy(self.max_anisotropy as f32)
            .compare_enable(self.compare_op.is_some())
            .compare_op(self.compare_op.unwrap_or(vk::CompareOp::ALWAYS))
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(self.border_color)
            .unnormalized_coordinates(false)
            .build()
    }
}

/// A constructed sampler, shared by reference between every table that uses its preset.
#[derive(Debug, PartialEq, Eq)]
pub struct Sampler {
    preset: SamplerPreset,
    info: SamplerInfo,
    descriptor: Descriptor,
}

impl Sampler {
    /// Construct the sampler for a preset on the given device.
    /// # Errors
    /// - Fails if the device cannot create the sampler.
    pub fn from_preset<D: DescriptorDevice>(device: &D, preset: SamplerPreset) -> Result<Self> {
        let info = preset.info();
        Ok(Self {
            preset,
            info,
            descriptor: device.create_sampler(&info)?,
        })
    }

    /// Wrap an already constructed sampler descriptor.
    pub fn from_raw(preset: SamplerPreset, info: SamplerInfo, descriptor: Descriptor) -> Self {
        Self {
            preset,
            info,
            descriptor,
        }
    }

    /// Preset this sampler was built for.
    pub fn preset(&self) -> SamplerPreset {
        self.preset
    }

    /// Settings of this sampler.
    pub fn info(&self) -> &SamplerInfo {
        &self.info
    }

    /// Descriptor that gets copied into sampler tables.
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }
}

/// Construction function for a sampler preset.
pub type SamplerCreateFn<D> = Box<dyn Fn(&D, SamplerPreset) -> Result<Sampler>>;

/// Lazily constructed samplers, at most one per preset.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct SamplerRegistry<D: DescriptorDevice> {
    #[derivative(Debug = "ignore")]
    create_fns: Vec<SamplerCreateFn<D>>,
    samplers: [Option<Arc<Sampler>>; SamplerPreset::COUNT],
}

impl<D: DescriptorDevice> Default for SamplerRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DescriptorDevice> SamplerRegistry<D> {
    /// Create a registry where every preset is built with [`Sampler::from_preset`].
    pub fn new() -> Self {
        Self {
            create_fns: SamplerPreset::ALL
                .iter()
                .map(|_| Box::new(|device: &D, preset| Sampler::from_preset(device, preset)) as SamplerCreateFn<D>)
                .collect(),
            samplers: Default::default(),
        }
    }

    /// Replace the construction function of a preset. If the preset was already constructed, the registry
    /// forgets its sampler so the next request builds a new one with `create_fn`.
    pub fn register(&mut self, preset: SamplerPreset, create_fn: impl Fn(&D, SamplerPreset) -> Result<Sampler> + 'static) {
        self.create_fns[preset as usize] = Box::new(create_fn);
        self.samplers[preset as usize] = None;
    }

    /// Get the sampler for a preset, constructing it if this is the first request.
    /// # Errors
    /// - Fails with [`Error::SamplerCreationFailed`] if the construction function fails.
    pub fn get(&mut self, device: &D, preset: SamplerPreset) -> Result<Arc<Sampler>> {
        let slot = &mut self.samplers[preset as usize];
        if let Some(sampler) = slot {
            return Ok(sampler.clone());
        }

        let sampler = (self.create_fns[preset as usize])(device, preset)
            .map_err(|e| e.context(Error::SamplerCreationFailed(preset)))?;
        debug!("Constructed sampler for preset {preset:?}: {}", sampler.descriptor());
        let sampler = Arc::new(sampler);
        *slot = Some(sampler.clone());
        Ok(sampler)
    }

    /// Whether the sampler for a preset was constructed already.
    pub fn is_constructed(&self, preset: SamplerPreset) -> bool {
        self.samplers[preset as usize].is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_presets_enable_compare() {
        for preset in [SamplerPreset::PointLessEqual, SamplerPreset::LinearLessEqual, SamplerPreset::AnisotropicLessEqual] {
            let info = preset.info().as_vulkan();
            assert_eq!(info.compare_enable, vk::TRUE);
            assert_eq!(info.compare_op, vk::CompareOp::LESS_OR_EQUAL);
        }
        assert_eq!(SamplerPreset::LinearWrap.info().as_vulkan().compare_enable, vk::FALSE);
    }

    #[test]
    fn only_anisotropic_presets_enable_anisotropy() {
        for preset in SamplerPreset::ALL {
            let info = preset.info();
            let anisotropic = matches!(
                preset,
                SamplerPreset::AnisotropicWrap
                    | SamplerPreset::AnisotropicClamp
                    | SamplerPreset::AnisotropicBorder
                    | SamplerPreset::AnisotropicLessEqual
            );
            assert_eq!(info.max_anisotropy > 0, anisotropic, "{preset:?}");
        }
    }

    #[test]
    fn presets_are_distinct() {
        let infos: std::collections::HashSet<_> = SamplerPreset::ALL.iter().map(|preset| preset.info()).collect();
        assert_eq!(infos.len(), SamplerPreset::COUNT);
    }
}
