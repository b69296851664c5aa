// Physical device selection
//
// First device in enumeration order that can present to the surface wins.
// No scoring: an integrated GPU listed first beats a discrete one listed
// second.

use super::probe::supports_device_extension;
use super::{CapabilityProbe, QueueFamilyIndices, SwapchainSupportDetails};
use crate::error::{Error, Result};
use ash::vk;

pub fn select_physical_device<P>(
    probe: &P,
    devices: &[vk::PhysicalDevice],
    surface: vk::SurfaceKHR,
) -> Result<vk::PhysicalDevice>
where
    P: CapabilityProbe + ?Sized,
{
    for &device in devices {
        if is_suitable(probe, device, surface)? {
            return Ok(device);
        }
    }

    Err(Error::NoSuitableDevice)
}

fn is_suitable<P>(probe: &P, device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> Result<bool>
where
    P: CapabilityProbe + ?Sized,
{
    let swapchain_ext = ash::extensions::khr::Swapchain::name();
    if !supports_device_extension(probe, device, swapchain_ext)? {
        log::debug!("Skipping {:?}: no {:?}", device, swapchain_ext);
        return Ok(false);
    }

    if !SwapchainSupportDetails::query(probe, device, surface)?.is_adequate() {
        log::debug!("Skipping {:?}: no surface formats or present modes", device);
        return Ok(false);
    }

    if !QueueFamilyIndices::find(probe, device, surface)?.is_complete() {
        log::debug!("Skipping {:?}: no graphics/present queue pair", device);
        return Ok(false);
    }

    Ok(true)
}
