// Backend module - Vulkan abstraction layer
//
// Design: bring-up logic talks to the driver only through two traits.
// `CapabilityProbe` is the read-only half (enumerations), `GpuBackend` adds
// creation and destruction. `AshBackend` is the real implementation; tests
// swap in a recording double.

pub mod device;
pub mod pipeline;
pub mod probe;
pub mod queue;
pub mod selector;
pub mod shader;
pub mod swapchain;

pub use device::AshBackend;
pub use queue::QueueFamilyIndices;
pub use shader::{ShaderDir, ShaderKind, ShaderMap, ShaderSource};
pub use swapchain::SwapchainSupportDetails;

use crate::error::Result;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CString;

/// Read-only queries against the driver. No filtering, no interpretation.
pub trait CapabilityProbe {
    fn instance_extensions(&self) -> Result<Vec<String>>;
    fn instance_layers(&self) -> Result<Vec<String>>;

    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>>;
    fn device_name(&self, physical_device: vk::PhysicalDevice) -> Result<String>;
    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>>;
    /// No driver status; may be empty.
    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::QueueFamilyProperties>>;

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool>;
    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>>;
    fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>>;

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;
    fn device_queue(&self, queue_family: u32, index: u32) -> Result<vk::Queue>;
}

/// Creation and destruction of every handle the context owns.
///
/// Destroy calls never fail; callers must only pass handles this backend
/// created and must respect Vulkan's parent/child ordering.
pub trait GpuBackend: CapabilityProbe {
    fn create_instance(&mut self, desc: &InstanceDesc) -> Result<vk::Instance>;
    fn create_surface(
        &mut self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR>;
    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> Result<vk::Device>;
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR>;
    fn create_image_view(&mut self, image: vk::Image, format: vk::Format)
        -> Result<vk::ImageView>;
    fn create_shader_module(&mut self, code: &[u8]) -> Result<vk::ShaderModule>;
    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass>;
    fn create_pipeline_layout(&mut self) -> Result<vk::PipelineLayout>;
    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> Result<vk::Pipeline>;

    fn wait_idle(&self) -> Result<()>;

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline);
    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout);
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);
    fn destroy_shader_module(&mut self, module: vk::ShaderModule);
    fn destroy_image_view(&mut self, view: vk::ImageView);
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);
    fn destroy_device(&mut self, device: vk::Device);
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);
    fn destroy_instance(&mut self, instance: vk::Instance);
}

/// Everything `vkCreateInstance` needs, minus the pointers.
#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub application_name: CString,
    pub application_version: u32,
    pub engine_name: CString,
    pub engine_version: u32,
    pub api_version: u32,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
    pub flags: vk::InstanceCreateFlags,
}

/// Logical device request: one queue per listed family.
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    /// Unique family indices, ascending.
    pub queue_families: Vec<u32>,
    pub queue_priority: f32,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
}

#[derive(Debug, Clone)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing_mode: vk::SharingMode,
    /// Only consulted for concurrent sharing.
    pub queue_family_indices: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct PipelineDesc {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub extent: vk::Extent2D,
    pub stages: Vec<(ShaderKind, vk::ShaderModule)>,
}
