/// Frozen state objects for the Vulkan backend
///
/// Blend, depth and raster states are plain descriptors: they are baked into
/// pipeline variants at draw time. Samplers own a VkSampler.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use draw_hal::{
    hal_debug, hal_err, BlendState, BlendStateDesc, DepthStencilState, DepthStencilStateDesc, RasterState,
    RasterStateDesc, Result, SamplerState, SamplerStateDesc,
};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    address_mode_to_vk, border_color_to_vk, compare_op_to_vk, filter_to_vk, mipmap_mode_to_vk,
};

pub struct VulkanBlendState {
    pub desc: BlendStateDesc,
}

impl BlendState for VulkanBlendState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct VulkanDepthStencilState {
    pub desc: DepthStencilStateDesc,
}

impl DepthStencilState for VulkanDepthStencilState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct VulkanRasterState {
    pub desc: RasterStateDesc,
}

impl RasterState for VulkanRasterState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sampler state backed by a VkSampler
pub struct VulkanSamplerState {
    ctx: Arc<GpuContext>,
    pub desc: SamplerStateDesc,
    pub(crate) sampler: vk::Sampler,
}

impl VulkanSamplerState {
    pub fn new(ctx: Arc<GpuContext>, desc: SamplerStateDesc) -> Result<Self> {
        let sampler = create_vk_sampler(&ctx, &desc)?;
        Ok(Self { ctx, desc, sampler })
    }
}

impl SamplerState for VulkanSamplerState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSamplerState {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Build a VkSampler from a descriptor
///
/// Anisotropy is clamped to the device limit and dropped entirely when the
/// `samplerAnisotropy` feature is missing.
pub(crate) fn create_vk_sampler(ctx: &GpuContext, desc: &SamplerStateDesc) -> Result<vk::Sampler> {
    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter_to_vk(desc.mag_filter))
        .min_filter(filter_to_vk(desc.min_filter))
        .mipmap_mode(mipmap_mode_to_vk(desc.mip_filter))
        .address_mode_u(address_mode_to_vk(desc.wrap_u))
        .address_mode_v(address_mode_to_vk(desc.wrap_v))
        .address_mode_w(address_mode_to_vk(desc.wrap_w))
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(desc.max_lod.max(0.0))
        .border_color(border_color_to_vk(desc.border_color))
        .unnormalized_coordinates(false);

    if let Some(compare) = desc.shadow_compare {
        create_info = create_info
            .compare_enable(true)
            .compare_op(compare_op_to_vk(compare));
    } else {
        create_info = create_info
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS);
    }

    let anisotropy = desc
        .max_aniso
        .min(ctx.properties.limits.max_sampler_anisotropy);
    if anisotropy > 1.0 && ctx.features.sampler_anisotropy == vk::TRUE {
        create_info = create_info
            .anisotropy_enable(true)
            .max_anisotropy(anisotropy);
    } else {
        if desc.max_aniso > 1.0 {
            hal_debug!("draw_hal::vulkan", "Anisotropic filtering unavailable, sampler uses max_aniso 1");
        }
        create_info = create_info
            .anisotropy_enable(false)
            .max_anisotropy(1.0);
    }

    unsafe {
        ctx.device
            .create_sampler(&create_info, None)
            .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to create VkSampler: {:?}", e))
    }
}
