// Vulkan backend on top of ash
//
// Responsibilities:
// - Load the Vulkan library and answer capability queries
// - Create instance, surface and logical device, keeping their dispatch
//   tables (and the surface/swapchain loaders) internally
// - Create/destroy everything else by delegating to the swapchain, shader
//   and pipeline helpers
//
// Handles cross the `GpuBackend` seam as plain `vk` handles; whoever owns
// them (the context) decides when they die.

use super::probe::name_from_raw;
use super::{pipeline, shader, swapchain};
use super::{CapabilityProbe, DeviceDesc, GpuBackend, InstanceDesc, PipelineDesc, SwapchainDesc};
use crate::error::{Error, Result, VkResultExt};
use ash::extensions::khr;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CString};

fn as_ptrs(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|n| n.as_ptr()).collect()
}

pub struct AshBackend {
    swapchain_loader: Option<khr::Swapchain>,
    device: Option<ash::Device>,
    surface_loader: Option<khr::Surface>,
    instance: Option<ash::Instance>,
    entry: Entry,
}

impl AshBackend {
    /// Load the system Vulkan library.
    pub fn load() -> Result<Self> {
        let entry = unsafe { Entry::load() }?;
        log::debug!("Loaded Vulkan library");

        Ok(Self {
            swapchain_loader: None,
            device: None,
            surface_loader: None,
            instance: None,
            entry,
        })
    }

    fn instance(&self) -> Result<&ash::Instance> {
        self.instance.as_ref().ok_or(Error::Uninitialized("instance"))
    }

    fn surface_loader(&self) -> Result<&khr::Surface> {
        self.surface_loader
            .as_ref()
            .ok_or(Error::Uninitialized("instance"))
    }

    fn device(&self) -> Result<&ash::Device> {
        self.device.as_ref().ok_or(Error::Uninitialized("logical device"))
    }

    fn swapchain_loader(&self) -> Result<&khr::Swapchain> {
        self.swapchain_loader
            .as_ref()
            .ok_or(Error::Uninitialized("logical device"))
    }
}

impl CapabilityProbe for AshBackend {
    fn instance_extensions(&self) -> Result<Vec<String>> {
        let props = self
            .entry
            .enumerate_instance_extension_properties(None)
            .querying("instance extensions")?;
        Ok(props.iter().map(|p| name_from_raw(&p.extension_name)).collect())
    }

    fn instance_layers(&self) -> Result<Vec<String>> {
        let props = self
            .entry
            .enumerate_instance_layer_properties()
            .querying("instance layers")?;
        Ok(props.iter().map(|p| name_from_raw(&p.layer_name)).collect())
    }

    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }.querying("physical devices")
    }

    fn device_name(&self, physical_device: vk::PhysicalDevice) -> Result<String> {
        let props = unsafe {
            self.instance()?
                .get_physical_device_properties(physical_device)
        };
        Ok(name_from_raw(&props.device_name))
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>> {
        let props = unsafe {
            self.instance()?
                .enumerate_device_extension_properties(physical_device)
        }
        .querying("device extensions")?;
        Ok(props.iter().map(|p| name_from_raw(&p.extension_name)).collect())
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe {
            self.instance()?
                .get_physical_device_queue_family_properties(physical_device)
        })
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool> {
        unsafe {
            self.surface_loader()?.get_physical_device_surface_support(
                physical_device,
                queue_family,
                surface,
            )
        }
        .querying("surface support")
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(physical_device, surface)
        }
        .querying("surface capabilities")
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_formats(physical_device, surface)
        }
        .querying("surface formats")
    }

    fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_present_modes(physical_device, surface)
        }
        .querying("present modes")
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
            .querying("swapchain images")
    }

    fn device_queue(&self, queue_family: u32, index: u32) -> Result<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(queue_family, index) })
    }
}

impl GpuBackend for AshBackend {
    fn create_instance(&mut self, desc: &InstanceDesc) -> Result<vk::Instance> {
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&desc.application_name)
            .application_version(desc.application_version)
            .engine_name(&desc.engine_name)
            .engine_version(desc.engine_version)
            .api_version(desc.api_version);

        let extensions = as_ptrs(&desc.extensions);
        let layers = as_ptrs(&desc.layers);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers)
            .flags(desc.flags);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }
            .creating("instance")?;

        let handle = instance.handle();
        self.surface_loader = Some(khr::Surface::new(&self.entry, &instance));
        self.instance = Some(instance);
        Ok(handle)
    }

    fn create_surface(
        &mut self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR> {
        let instance = self.instance()?;
        unsafe { ash_window::create_surface(&self.entry, instance, display, window, None) }
            .creating("window surface")
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> Result<vk::Device> {
        let priorities = [desc.queue_priority];
        let queue_create_infos: Vec<_> = desc
            .queue_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = as_ptrs(&desc.extensions);
        let layers = as_ptrs(&desc.layers);
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers)
            .enabled_features(&features);

        let instance = self.instance()?;
        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .creating("logical device")?;
        let swapchain_loader = khr::Swapchain::new(instance, &device);

        let handle = device.handle();
        self.swapchain_loader = Some(swapchain_loader);
        self.device = Some(device);
        Ok(handle)
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR> {
        swapchain::create_swapchain(self.swapchain_loader()?, desc)
    }

    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> Result<vk::ImageView> {
        swapchain::create_image_view(self.device()?, image, format)
    }

    fn create_shader_module(&mut self, code: &[u8]) -> Result<vk::ShaderModule> {
        shader::create_shader_module(self.device()?, code)
    }

    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass> {
        pipeline::create_render_pass(self.device()?, format)
    }

    fn create_pipeline_layout(&mut self) -> Result<vk::PipelineLayout> {
        pipeline::create_pipeline_layout(self.device()?)
    }

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> Result<vk::Pipeline> {
        pipeline::create_graphics_pipeline(self.device()?, desc)
    }

    /// Wait for device to be idle (e.g., before cleanup)
    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device()?.device_wait_idle() }.querying("device idle")
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_pipeline(pipeline, None) };
        }
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_render_pass(render_pass, None) };
        }
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_shader_module(module, None) };
        }
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        if let Some(device) = &self.device {
            unsafe { device.destroy_image_view(view, None) };
        }
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if let Some(loader) = &self.swapchain_loader {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn destroy_device(&mut self, device: vk::Device) {
        self.swapchain_loader = None;
        if let Some(owned) = self.device.take() {
            debug_assert_eq!(owned.handle(), device);
            unsafe { owned.destroy_device(None) };
        }
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(loader) = &self.surface_loader {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.surface_loader = None;
        if let Some(owned) = self.instance.take() {
            debug_assert_eq!(owned.handle(), instance);
            unsafe { owned.destroy_instance(None) };
        }
    }
}
