// Capability checks built on top of the raw probe queries

use super::CapabilityProbe;
use crate::error::{Error, Result};
use ash::vk;
use std::ffi::{c_char, CStr};

/// Layers requested when validation is enabled.
pub const VALIDATION_LAYERS: &[&CStr] = &[c"VK_LAYER_KHRONOS_validation"];

/// Fails with the first requested layer the driver does not report.
pub fn check_layers<P>(probe: &P, requested: &[&CStr]) -> Result<()>
where
    P: CapabilityProbe + ?Sized,
{
    let available = probe.instance_layers()?;

    for layer in requested {
        let name = layer.to_string_lossy();
        if !available.iter().any(|a| *a == name) {
            return Err(Error::MissingLayer(name.into_owned()));
        }
    }

    Ok(())
}

pub fn supports_device_extension<P>(
    probe: &P,
    physical_device: vk::PhysicalDevice,
    extension: &CStr,
) -> Result<bool>
where
    P: CapabilityProbe + ?Sized,
{
    let name = extension.to_string_lossy();
    Ok(probe
        .device_extensions(physical_device)?
        .iter()
        .any(|e| *e == name))
}

/// Fixed-size, NUL-terminated driver string to an owned `String`.
pub(crate) fn name_from_raw(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
