// Swapchain - Window presentation
//
// Captures what a device/surface pair supports and turns it into concrete
// swapchain parameters. Selection is deterministic for identical inputs.

use super::{CapabilityProbe, SwapchainDesc};
use crate::error::{Result, VkResultExt};
use ash::vk;

/// Surface support for one physical device at one point in time.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Concrete swapchain parameters picked from [`SwapchainSupportDetails`].
#[derive(Debug, Clone, Copy)]
pub struct SwapchainParams {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub min_image_count: u32,
    pub extent: vk::Extent2D,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainSupportDetails {
    pub fn query<P>(probe: &P, physical_device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> Result<Self>
    where
        P: CapabilityProbe + ?Sized,
    {
        Ok(Self {
            capabilities: probe.surface_capabilities(physical_device, surface)?,
            formats: probe.surface_formats(physical_device, surface)?,
            present_modes: probe.present_modes(physical_device, surface)?,
        })
    }

    /// A device with no formats or no present modes cannot present at all.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// BGRA8 sRGB with non-linear sRGB color space, else whatever the driver
    /// listed first. `None` only for an empty format list.
    pub fn surface_format(&self) -> Option<vk::SurfaceFormatKHR> {
        self.formats
            .iter()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| self.formats.first())
            .copied()
    }

    /// MAILBOX: no tearing, triple buffered, low latency
    /// FIFO: vsync, guaranteed available
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_modes
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO)
    }

    /// One more than the minimum, clamped to the maximum when there is one
    /// (a zero maximum means unbounded).
    pub fn min_image_count(&self) -> u32 {
        let caps = &self.capabilities;
        let count = caps.min_image_count.saturating_add(1);
        if caps.max_image_count > 0 && count > caps.max_image_count {
            caps.max_image_count
        } else {
            count
        }
    }

    /// No resize negotiation: the surface's current extent as-is.
    pub fn extent(&self) -> vk::Extent2D {
        self.capabilities.current_extent
    }

    pub fn negotiate(&self) -> Option<SwapchainParams> {
        Some(SwapchainParams {
            format: self.surface_format()?,
            present_mode: self.present_mode(),
            min_image_count: self.min_image_count(),
            extent: self.extent(),
            pre_transform: self.capabilities.current_transform,
        })
    }
}

pub fn create_swapchain(
    loader: &ash::extensions::khr::Swapchain,
    desc: &SwapchainDesc,
) -> Result<vk::SwapchainKHR> {
    let mut create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(desc.surface)
        .min_image_count(desc.min_image_count)
        .image_format(desc.format.format)
        .image_color_space(desc.format.color_space)
        .image_extent(desc.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(desc.sharing_mode)
        .pre_transform(desc.pre_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(desc.present_mode)
        .clipped(true);

    if desc.sharing_mode == vk::SharingMode::CONCURRENT {
        create_info = create_info.queue_family_indices(&desc.queue_family_indices);
    }

    unsafe { loader.create_swapchain(&create_info, None) }.creating("swapchain")
}

/// 2D color view, identity swizzle, one mip level, one layer.
pub fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }.creating("image view")
}
