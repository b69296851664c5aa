// Recording doubles for the backend and window system seams.
//
// Both doubles append to one shared call log so tests can assert the
// relative order of window and GPU operations.

use crate::backend::{
    CapabilityProbe, DeviceDesc, GpuBackend, InstanceDesc, PipelineDesc, SwapchainDesc,
};
use crate::error::{Error, Result};
use crate::window::{WindowDesc, WindowSystem};
use ash::vk::{self, Handle};
use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle, WebDisplayHandle,
    WebWindowHandle,
};
use std::cell::RefCell;
use std::ffi::CString;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    CreateWindow,
    CreateInstance,
    CreateSurface,
    CreateDevice,
    CreateSwapchain,
    CreateImageView,
    CreateShaderModule,
    CreateRenderPass,
    CreatePipelineLayout,
    CreatePipeline,
    WaitIdle,
    DestroyPipeline,
    DestroyPipelineLayout,
    DestroyRenderPass,
    DestroyShaderModule,
    DestroyImageView,
    DestroySwapchain,
    DestroyDevice,
    DestroySurface,
    DestroyInstance,
    DestroyWindow,
    Terminate,
}

impl Call {
    /// The destroy call that pairs with a create call.
    pub fn release(self) -> Option<Call> {
        Some(match self {
            Call::CreateWindow => Call::DestroyWindow,
            Call::CreateInstance => Call::DestroyInstance,
            Call::CreateSurface => Call::DestroySurface,
            Call::CreateDevice => Call::DestroyDevice,
            Call::CreateSwapchain => Call::DestroySwapchain,
            Call::CreateImageView => Call::DestroyImageView,
            Call::CreateShaderModule => Call::DestroyShaderModule,
            Call::CreateRenderPass => Call::DestroyRenderPass,
            Call::CreatePipelineLayout => Call::DestroyPipelineLayout,
            Call::CreatePipeline => Call::DestroyPipeline,
            _ => return None,
        })
    }
}

/// Every call with the raw handle it created or released (0 when there is
/// no handle).
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<(Call, u64)>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.push_handle(call, 0);
    }

    fn push_handle(&self, call: Call, raw: u64) {
        self.0.borrow_mut().push((call, raw));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().iter().map(|&(c, _)| c).collect()
    }

    /// Raw handles passed through `call`, in call order.
    pub fn handles(&self, call: Call) -> Vec<u64> {
        self.0
            .borrow()
            .iter()
            .filter(|&&(c, _)| c == call)
            .map(|&(_, raw)| raw)
            .collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.0.borrow().iter().filter(|&&(c, _)| c == call).count()
    }

    pub fn position(&self, call: Call) -> Option<usize> {
        self.0.borrow().iter().position(|&(c, _)| c == call)
    }
}

fn injected_failure(call: Call) -> Error {
    log::debug!("Injected failure at {:?}", call);
    Error::Creation {
        what: "injected failure",
        result: vk::Result::ERROR_INITIALIZATION_FAILED,
    }
}

/// What one fake physical device reports.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: String,
    pub extensions: Vec<String>,
    pub families: Vec<vk::QueueFamilyProperties>,
    pub present_families: Vec<u32>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 1,
        ..Default::default()
    }
}

impl MockDevice {
    /// One family doing graphics and present, preferred format, FIFO and
    /// MAILBOX, two to unbounded images at 800x600.
    pub fn capable() -> Self {
        Self {
            name: "Mock GPU".to_string(),
            extensions: vec!["VK_KHR_swapchain".to_string()],
            families: vec![family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)],
            present_families: vec![0],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn without_swapchain_extension(mut self) -> Self {
        self.extensions.clear();
        self
    }

    pub fn without_formats(mut self) -> Self {
        self.formats.clear();
        self
    }

    pub fn without_present_modes(mut self) -> Self {
        self.present_modes.clear();
        self
    }

    pub fn without_present_queue(mut self) -> Self {
        self.present_families.clear();
        self
    }

    pub fn without_graphics_queue(mut self) -> Self {
        self.families = vec![family(vk::QueueFlags::COMPUTE)];
        self
    }

    /// Graphics only on family 2, present only on family 0.
    pub fn with_split_queues(mut self) -> Self {
        self.families = vec![
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        self.present_families = vec![0];
        self
    }

    pub fn with_image_counts(mut self, min: u32, max: u32) -> Self {
        self.capabilities.min_image_count = min;
        self.capabilities.max_image_count = max;
        self
    }
}

/// Driver double. Hands out unique non-null handles and records every
/// create, destroy and descriptor it sees.
pub struct MockBackend {
    devices: Vec<MockDevice>,
    layers: Vec<String>,
    log: CallLog,
    fail_at: Option<Call>,
    fail_query: Option<&'static str>,
    next_handle: u64,
    swapchain_images: Vec<vk::Image>,
    pub instance_desc: Option<InstanceDesc>,
    pub device_desc: Option<DeviceDesc>,
    pub swapchain_desc: Option<SwapchainDesc>,
    pub pipeline_desc: Option<PipelineDesc>,
    pub shader_code: Vec<Vec<u8>>,
}

impl MockBackend {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            layers: Vec::new(),
            log: CallLog::default(),
            fail_at: None,
            fail_query: None,
            next_handle: 0x100,
            swapchain_images: Vec::new(),
            instance_desc: None,
            device_desc: None,
            swapchain_desc: None,
            pipeline_desc: None,
            shader_code: Vec::new(),
        }
    }

    pub fn with_layers(mut self, layers: &[&str]) -> Self {
        self.layers = layers.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    /// Make the given create call fail instead of producing a handle.
    pub fn failing_at(mut self, call: Call) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Make the named enumeration report a driver error.
    pub fn failing_query(mut self, what: &'static str) -> Self {
        self.fail_query = Some(what);
        self
    }

    fn query<T>(&self, what: &'static str, value: T) -> Result<T> {
        if self.fail_query == Some(what) {
            return Err(Error::Query {
                what,
                result: vk::Result::ERROR_DEVICE_LOST,
            });
        }
        Ok(value)
    }

    fn device(&self, physical_device: vk::PhysicalDevice) -> Result<&MockDevice> {
        let index = physical_device.as_raw().wrapping_sub(1) as usize;
        self.devices
            .get(index)
            .ok_or(Error::Uninitialized("physical device"))
    }

    fn create<H: Handle>(&mut self, call: Call) -> Result<H> {
        if self.fail_at == Some(call) {
            return Err(injected_failure(call));
        }
        self.next_handle += 1;
        self.log.push_handle(call, self.next_handle);
        Ok(H::from_raw(self.next_handle))
    }
}

impl CapabilityProbe for MockBackend {
    fn instance_extensions(&self) -> Result<Vec<String>> {
        self.query(
            "instance extensions",
            vec![
                "VK_KHR_surface".to_string(),
                "VK_KHR_portability_enumeration".to_string(),
            ],
        )
    }

    fn instance_layers(&self) -> Result<Vec<String>> {
        Ok(self.layers.clone())
    }

    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        self.query(
            "physical devices",
            (1..=self.devices.len() as u64)
                .map(vk::PhysicalDevice::from_raw)
                .collect(),
        )
    }

    fn device_name(&self, physical_device: vk::PhysicalDevice) -> Result<String> {
        Ok(self.device(physical_device)?.name.clone())
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>> {
        Ok(self.device(physical_device)?.extensions.clone())
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::QueueFamilyProperties>> {
        Ok(self.device(physical_device)?.families.clone())
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> Result<bool> {
        Ok(self
            .device(physical_device)?
            .present_families
            .contains(&queue_family))
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        self.query("surface capabilities", self.device(physical_device)?.capabilities)
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        self.query("surface formats", self.device(physical_device)?.formats.clone())
    }

    fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        self.query("present modes", self.device(physical_device)?.present_modes.clone())
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        self.query("swapchain images", self.swapchain_images.clone())
    }

    fn device_queue(&self, queue_family: u32, index: u32) -> Result<vk::Queue> {
        Ok(vk::Queue::from_raw(
            0x1000 + u64::from(queue_family) * 0x10 + u64::from(index),
        ))
    }
}

impl GpuBackend for MockBackend {
    fn create_instance(&mut self, desc: &InstanceDesc) -> Result<vk::Instance> {
        self.instance_desc = Some(desc.clone());
        self.create(Call::CreateInstance)
    }

    fn create_surface(
        &mut self,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR> {
        self.create(Call::CreateSurface)
    }

    fn create_device(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> Result<vk::Device> {
        self.device_desc = Some(desc.clone());
        self.create(Call::CreateDevice)
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR> {
        self.swapchain_desc = Some(desc.clone());
        let swapchain = self.create(Call::CreateSwapchain)?;
        self.swapchain_images = (0..u64::from(desc.min_image_count))
            .map(|i| vk::Image::from_raw(0x2000 + i))
            .collect();
        Ok(swapchain)
    }

    fn create_image_view(
        &mut self,
        _image: vk::Image,
        _format: vk::Format,
    ) -> Result<vk::ImageView> {
        self.create(Call::CreateImageView)
    }

    fn create_shader_module(&mut self, code: &[u8]) -> Result<vk::ShaderModule> {
        let module = self.create(Call::CreateShaderModule)?;
        self.shader_code.push(code.to_vec());
        Ok(module)
    }

    fn create_render_pass(&mut self, _format: vk::Format) -> Result<vk::RenderPass> {
        self.create(Call::CreateRenderPass)
    }

    fn create_pipeline_layout(&mut self) -> Result<vk::PipelineLayout> {
        self.create(Call::CreatePipelineLayout)
    }

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> Result<vk::Pipeline> {
        self.pipeline_desc = Some(desc.clone());
        self.create(Call::CreatePipeline)
    }

    fn wait_idle(&self) -> Result<()> {
        self.log.push(Call::WaitIdle);
        Ok(())
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.log.push_handle(Call::DestroyPipeline, pipeline.as_raw());
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        self.log.push_handle(Call::DestroyPipelineLayout, layout.as_raw());
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.log.push_handle(Call::DestroyRenderPass, render_pass.as_raw());
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        self.log.push_handle(Call::DestroyShaderModule, module.as_raw());
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.log.push_handle(Call::DestroyImageView, view.as_raw());
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.log.push_handle(Call::DestroySwapchain, swapchain.as_raw());
    }

    fn destroy_device(&mut self, device: vk::Device) {
        self.log.push_handle(Call::DestroyDevice, device.as_raw());
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        self.log.push_handle(Call::DestroySurface, surface.as_raw());
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.log.push_handle(Call::DestroyInstance, instance.as_raw());
    }
}

pub struct MockWindow;

unsafe impl HasRawWindowHandle for MockWindow {
    fn raw_window_handle(&self) -> RawWindowHandle {
        RawWindowHandle::Web(WebWindowHandle::empty())
    }
}

unsafe impl HasRawDisplayHandle for MockWindow {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        RawDisplayHandle::Web(WebDisplayHandle::empty())
    }
}

/// Window system double. Reports a close request after `polls_until_close`
/// polls.
pub struct MockWindowSystem {
    log: CallLog,
    fail: bool,
    polls_until_close: u32,
    created: Rc<RefCell<Option<WindowDesc>>>,
}

impl MockWindowSystem {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
            polls_until_close: 1,
            created: Rc::default(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn closing_after(mut self, polls: u32) -> Self {
        self.polls_until_close = polls;
        self
    }

    /// Shared view of the last window description seen.
    pub fn created(&self) -> Rc<RefCell<Option<WindowDesc>>> {
        self.created.clone()
    }
}

impl WindowSystem for MockWindowSystem {
    type Window = MockWindow;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<MockWindow> {
        if self.fail {
            return Err(Error::WindowSystem("no display".to_string()));
        }
        self.log.push(Call::CreateWindow);
        *self.created.borrow_mut() = Some(desc.clone());
        Ok(MockWindow)
    }

    fn required_instance_extensions(&self) -> Result<Vec<CString>> {
        Ok(vec![c"VK_KHR_surface".to_owned()])
    }

    fn poll_close_requested(&mut self) -> bool {
        self.polls_until_close = self.polls_until_close.saturating_sub(1);
        self.polls_until_close == 0
    }

    fn destroy_window(&mut self, _window: MockWindow) {
        self.log.push(Call::DestroyWindow);
    }

    fn terminate(self) {
        self.log.push(Call::Terminate);
    }
}
