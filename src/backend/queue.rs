// Queue family resolution
//
// First-match policy: the lowest family index with graphics support and,
// independently, the lowest index that can present to the surface.

use super::CapabilityProbe;
use crate::error::Result;
use ash::vk;
use std::collections::BTreeSet;

/// Priority given to every requested queue.
pub const QUEUE_PRIORITY: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan `families` in index order, asking `supports_present` only for
    /// indices scanned before a present family has been found. Stops as soon
    /// as both roles are filled.
    pub fn resolve<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> Result<Self>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in (0u32..).zip(families) {
            if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(index);
            }
            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    /// Resolve against a real device/surface pair.
    pub fn find<P>(probe: &P, physical_device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> Result<Self>
    where
        P: CapabilityProbe + ?Sized,
    {
        let families = probe.queue_families(physical_device)?;
        Self::resolve(&families, |index| {
            probe.surface_support(physical_device, index, surface)
        })
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Distinct family indices, ascending. One queue is requested per entry.
    pub fn unique(&self) -> BTreeSet<u32> {
        self.graphics.into_iter().chain(self.present).collect()
    }

    /// Exclusive when one family serves both roles, concurrent otherwise.
    pub fn sharing_mode(&self) -> vk::SharingMode {
        if self.unique().len() == 1 {
            vk::SharingMode::EXCLUSIVE
        } else {
            vk::SharingMode::CONCURRENT
        }
    }
}
