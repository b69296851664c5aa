// Vulkan context: bring-up and teardown
//
// ContextBuilder walks the acquisition chain in a fixed order:
//
//   window -> layers -> instance -> surface -> physical device
//     -> logical device + queues -> swapchain -> image views
//     -> shader modules -> render pass -> pipeline layout -> pipeline
//
// Every handle goes straight into the Context as soon as it exists. If a
// later stage fails, the half-built Context is dropped on the way out and
// Drop releases exactly what was created, in reverse. Null handles are
// skipped, so there is one teardown path for both cases.

use crate::backend::probe::{check_layers, VALIDATION_LAYERS};
use crate::backend::queue::QUEUE_PRIORITY;
use crate::backend::selector::select_physical_device;
use crate::backend::shader::classify;
use crate::backend::swapchain::SwapchainParams;
use crate::backend::{
    DeviceDesc, GpuBackend, InstanceDesc, PipelineDesc, QueueFamilyIndices, ShaderKind, ShaderMap,
    ShaderSource, SwapchainDesc, SwapchainSupportDetails,
};
use crate::config::PlatformFlags;
use crate::error::{Error, Result};
use crate::window::{WindowDesc, WindowSystem};
use ash::extensions::khr;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{CStr, CString};

const APPLICATION_NAME: &CStr = c"Hello Triangle";
const ENGINE_NAME: &CStr = c"No Engine";

/// Instance request: fixed metadata, the window system's extensions, and
/// the portability pair plus flag when the platform needs them.
pub fn instance_desc(
    window_extensions: Vec<CString>,
    layers: &[&CStr],
    platform: PlatformFlags,
) -> InstanceDesc {
    let mut extensions = window_extensions;
    let mut flags = vk::InstanceCreateFlags::empty();

    if platform.portability {
        extensions.push(vk::KhrPortabilityEnumerationFn::name().to_owned());
        extensions.push(vk::KhrGetPhysicalDeviceProperties2Fn::name().to_owned());
        flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    InstanceDesc {
        application_name: APPLICATION_NAME.to_owned(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        engine_name: ENGINE_NAME.to_owned(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_0,
        extensions,
        layers: layers.iter().map(|&l| l.to_owned()).collect(),
        flags,
    }
}

/// One queue per unique family; swapchain extension always, portability
/// subset only when the platform needs it.
pub fn device_desc(
    indices: &QueueFamilyIndices,
    layers: &[&CStr],
    platform: PlatformFlags,
) -> DeviceDesc {
    let mut extensions = vec![khr::Swapchain::name().to_owned()];
    if platform.portability {
        extensions.push(vk::KhrPortabilitySubsetFn::name().to_owned());
    }

    DeviceDesc {
        queue_families: indices.unique().into_iter().collect(),
        queue_priority: QUEUE_PRIORITY,
        extensions,
        layers: layers.iter().map(|&l| l.to_owned()).collect(),
    }
}

pub fn swapchain_desc(
    surface: vk::SurfaceKHR,
    params: &SwapchainParams,
    indices: &QueueFamilyIndices,
) -> SwapchainDesc {
    let sharing_mode = indices.sharing_mode();
    let queue_family_indices = if sharing_mode == vk::SharingMode::CONCURRENT {
        indices.unique().into_iter().collect()
    } else {
        Vec::new()
    };

    SwapchainDesc {
        surface,
        min_image_count: params.min_image_count,
        format: params.format,
        extent: params.extent,
        present_mode: params.present_mode,
        pre_transform: params.pre_transform,
        sharing_mode,
        queue_family_indices,
    }
}

/// Everything needed to issue a draw: window, device, swapchain and one
/// fixed graphics pipeline. Read-only once built; released on drop.
pub struct Context<W: WindowSystem, B: GpuBackend> {
    backend: B,
    windowing: Option<W>,
    window: Option<W::Window>,

    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: vk::Device,

    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    swapchain: vk::SwapchainKHR,
    swapchain_format: vk::Format,
    swapchain_extent: vk::Extent2D,
    swapchain_images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    shader_modules: ShaderMap,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl<W: WindowSystem, B: GpuBackend> Context<W, B> {
    fn empty(windowing: W, backend: B) -> Self {
        Self {
            backend,
            windowing: Some(windowing),
            window: None,
            instance: vk::Instance::null(),
            surface: vk::SurfaceKHR::null(),
            physical_device: vk::PhysicalDevice::null(),
            device: vk::Device::null(),
            queue_families: QueueFamilyIndices::default(),
            graphics_queue: vk::Queue::null(),
            present_queue: vk::Queue::null(),
            swapchain: vk::SwapchainKHR::null(),
            swapchain_format: vk::Format::UNDEFINED,
            swapchain_extent: vk::Extent2D::default(),
            swapchain_images: Vec::new(),
            image_views: Vec::new(),
            shader_modules: ShaderMap::new(),
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
        }
    }

    fn windowing(&mut self) -> Result<&mut W> {
        self.windowing
            .as_mut()
            .ok_or(Error::Uninitialized("windowing system"))
    }

    /// Pump window events until the user closes the window.
    pub fn wait_until_close(&mut self) -> Result<()> {
        let windowing = self.windowing()?;
        while !windowing.poll_close_requested() {}
        Ok(())
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> vk::Device {
        self.device
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn swapchain_format(&self) -> vk::Format {
        self.swapchain_format
    }

    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    pub fn swapchain_images(&self) -> &[vk::Image] {
        &self.swapchain_images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn shader_modules(&self) -> &ShaderMap {
        &self.shader_modules
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl<W: WindowSystem, B: GpuBackend> Drop for Context<W, B> {
    /// Reverse of acquisition. Safe on a partially built context.
    fn drop(&mut self) {
        log::info!("Tearing down Vulkan context");

        if self.device != vk::Device::null() {
            if let Err(e) = self.backend.wait_idle() {
                log::warn!("Device did not go idle before teardown: {}", e);
            }
        }

        if self.pipeline != vk::Pipeline::null() {
            self.backend.destroy_pipeline(self.pipeline);
        }
        if self.pipeline_layout != vk::PipelineLayout::null() {
            self.backend.destroy_pipeline_layout(self.pipeline_layout);
        }
        if self.render_pass != vk::RenderPass::null() {
            self.backend.destroy_render_pass(self.render_pass);
        }
        // Modules were created in key order, views in image order
        for (_, module) in std::mem::take(&mut self.shader_modules).into_iter().rev() {
            self.backend.destroy_shader_module(module);
        }
        for view in self.image_views.drain(..).rev() {
            self.backend.destroy_image_view(view);
        }
        // Images belong to the swapchain
        self.swapchain_images.clear();
        if self.swapchain != vk::SwapchainKHR::null() {
            self.backend.destroy_swapchain(self.swapchain);
        }
        if self.device != vk::Device::null() {
            self.backend.destroy_device(self.device);
        }
        if self.surface != vk::SurfaceKHR::null() {
            self.backend.destroy_surface(self.surface);
        }
        if self.instance != vk::Instance::null() {
            self.backend.destroy_instance(self.instance);
        }

        if let Some(mut windowing) = self.windowing.take() {
            if let Some(window) = self.window.take() {
                windowing.destroy_window(window);
            }
            windowing.terminate();
        }

        log::info!("Vulkan context destroyed");
    }
}

/// Collects the few knobs bring-up has and runs it.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    window: WindowDesc,
    validation: bool,
    platform: PlatformFlags,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            window: WindowDesc::default(),
            validation: cfg!(debug_assertions),
            platform: PlatformFlags::host(),
        }
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: WindowDesc) -> Self {
        self.window = window;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    pub fn with_platform_flags(mut self, platform: PlatformFlags) -> Self {
        self.platform = platform;
        self
    }

    /// Run every bring-up stage. On error nothing survives: whatever was
    /// already created is released before this returns.
    pub fn build<W, B, S>(&self, windowing: W, backend: B, shaders: &S) -> Result<Context<W, B>>
    where
        W: WindowSystem,
        B: GpuBackend,
        S: ShaderSource + ?Sized,
    {
        let mut ctx = Context::empty(windowing, backend);

        let window = ctx.windowing()?.create_window(&self.window)?;
        ctx.window = Some(window);

        let layers: &[&CStr] = if self.validation {
            check_layers(&ctx.backend, VALIDATION_LAYERS)?;
            log::info!("Validation layers enabled");
            VALIDATION_LAYERS
        } else {
            &[]
        };

        self.create_instance(&mut ctx, layers)?;
        Self::create_surface(&mut ctx)?;
        Self::pick_physical_device(&mut ctx)?;
        self.create_logical_device(&mut ctx, layers)?;
        Self::create_swapchain(&mut ctx)?;
        Self::create_image_views(&mut ctx)?;
        Self::create_shader_modules(&mut ctx, shaders)?;
        Self::create_pipeline(&mut ctx)?;

        log::info!("Vulkan context ready");
        Ok(ctx)
    }

    fn create_instance<W: WindowSystem, B: GpuBackend>(
        &self,
        ctx: &mut Context<W, B>,
        layers: &[&CStr],
    ) -> Result<()> {
        let available = ctx.backend.instance_extensions()?;
        log::info!("{} instance extensions supported", available.len());
        log::debug!("Instance extensions: {:?}", available);

        let window_extensions = ctx.windowing()?.required_instance_extensions()?;
        let desc = instance_desc(window_extensions, layers, self.platform);
        log::debug!("Requesting instance extensions: {:?}", desc.extensions);

        ctx.instance = ctx.backend.create_instance(&desc)?;
        log::info!("Vulkan instance created");
        Ok(())
    }

    fn create_surface<W: WindowSystem, B: GpuBackend>(ctx: &mut Context<W, B>) -> Result<()> {
        let window = ctx
            .window
            .as_ref()
            .ok_or(Error::Uninitialized("window"))?;
        let (display, handle) = (window.raw_display_handle(), window.raw_window_handle());

        ctx.surface = ctx.backend.create_surface(display, handle)?;
        log::debug!("Surface created");
        Ok(())
    }

    fn pick_physical_device<W: WindowSystem, B: GpuBackend>(ctx: &mut Context<W, B>) -> Result<()> {
        let devices = ctx.backend.physical_devices()?;
        log::debug!("{} physical devices", devices.len());

        ctx.physical_device = select_physical_device(&ctx.backend, &devices, ctx.surface)?;
        log::info!("GPU: {}", ctx.backend.device_name(ctx.physical_device)?);
        Ok(())
    }

    fn create_logical_device<W: WindowSystem, B: GpuBackend>(
        &self,
        ctx: &mut Context<W, B>,
        layers: &[&CStr],
    ) -> Result<()> {
        let indices = QueueFamilyIndices::find(&ctx.backend, ctx.physical_device, ctx.surface)?;
        let (graphics, present) = match (indices.graphics, indices.present) {
            (Some(g), Some(p)) => (g, p),
            _ => return Err(Error::NoSuitableDevice),
        };
        log::info!("Queue families: graphics={}, present={}", graphics, present);

        let desc = device_desc(&indices, layers, self.platform);
        ctx.device = ctx.backend.create_device(ctx.physical_device, &desc)?;
        ctx.queue_families = indices;

        ctx.graphics_queue = ctx.backend.device_queue(graphics, 0)?;
        ctx.present_queue = ctx.backend.device_queue(present, 0)?;
        log::debug!("Logical device created with {} queue(s)", desc.queue_families.len());
        Ok(())
    }

    fn create_swapchain<W: WindowSystem, B: GpuBackend>(ctx: &mut Context<W, B>) -> Result<()> {
        let support = SwapchainSupportDetails::query(&ctx.backend, ctx.physical_device, ctx.surface)?;
        let params = support.negotiate().ok_or(Error::NoSuitableDevice)?;

        let desc = swapchain_desc(ctx.surface, &params, &ctx.queue_families);
        ctx.swapchain = ctx.backend.create_swapchain(&desc)?;
        ctx.swapchain_format = params.format.format;
        ctx.swapchain_extent = params.extent;

        log::info!(
            "Swapchain: {}x{}, {:?}, {:?}, {:?} sharing, min {} images",
            params.extent.width,
            params.extent.height,
            params.format.format,
            params.present_mode,
            desc.sharing_mode,
            params.min_image_count
        );
        Ok(())
    }

    fn create_image_views<W: WindowSystem, B: GpuBackend>(ctx: &mut Context<W, B>) -> Result<()> {
        ctx.swapchain_images = ctx.backend.swapchain_images(ctx.swapchain)?;

        for &image in &ctx.swapchain_images {
            let view = ctx.backend.create_image_view(image, ctx.swapchain_format)?;
            ctx.image_views.push(view);
        }

        log::debug!("{} image views", ctx.image_views.len());
        Ok(())
    }

    fn create_shader_modules<W, B, S>(ctx: &mut Context<W, B>, shaders: &S) -> Result<()>
    where
        W: WindowSystem,
        B: GpuBackend,
        S: ShaderSource + ?Sized,
    {
        for (kind, file) in classify(shaders.binary_files()?)? {
            let module = ctx.backend.create_shader_module(&file.contents)?;
            log::debug!("{:?} shader module from {}", kind, file.name);
            ctx.shader_modules.insert(kind, module);
        }

        log::info!("{} shader module(s) loaded", ctx.shader_modules.len());
        Ok(())
    }

    fn create_pipeline<W: WindowSystem, B: GpuBackend>(ctx: &mut Context<W, B>) -> Result<()> {
        ctx.render_pass = ctx.backend.create_render_pass(ctx.swapchain_format)?;
        ctx.pipeline_layout = ctx.backend.create_pipeline_layout()?;

        if !ctx.shader_modules.contains_key(&ShaderKind::Vertex) {
            return Err(Error::MissingVertexStage);
        }

        let desc = PipelineDesc {
            render_pass: ctx.render_pass,
            layout: ctx.pipeline_layout,
            extent: ctx.swapchain_extent,
            stages: ctx
                .shader_modules
                .iter()
                .map(|(&kind, &module)| (kind, module))
                .collect(),
        };
        ctx.pipeline = ctx.backend.create_graphics_pipeline(&desc)?;
        log::info!("Graphics pipeline created ({} stages)", desc.stages.len());
        Ok(())
    }
}
