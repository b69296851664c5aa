// Windowing collaborator
//
// The context only needs four things from the window system: a fixed-size
// window it can hang a surface on, the instance extensions that surface
// needs, a way to notice the user closing the window, and shutdown. winit
// provides all of them; the event loop is pumped instead of run so the
// context can own it.

use crate::config::WindowConfig;
use crate::error::{Error, Result, VkResultExt};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{CStr, CString};
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

/// How long one poll may block waiting for events.
const POLL_TIMEOUT: Duration = Duration::from_millis(16);

/// What the window looks like. Never resizable; no client API attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            title: "Vulkan!".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl From<&WindowConfig> for WindowDesc {
    fn from(config: &WindowConfig) -> Self {
        Self {
            title: config.title.clone(),
            width: config.width,
            height: config.height,
        }
    }
}

pub trait WindowSystem {
    type Window: HasRawWindowHandle + HasRawDisplayHandle;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<Self::Window>;

    /// Instance extensions a surface on this window system needs.
    fn required_instance_extensions(&self) -> Result<Vec<CString>>;

    /// Process pending events; true once the user asked to close.
    fn poll_close_requested(&mut self) -> bool;

    fn destroy_window(&mut self, window: Self::Window);

    /// Shut the window system down. Called once, after every window is gone.
    fn terminate(self);
}

pub struct WinitWindowSystem {
    event_loop: EventLoop<()>,
}

impl WinitWindowSystem {
    pub fn new() -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| Error::WindowSystem(e.to_string()))?;
        log::debug!("Event loop created");
        Ok(Self { event_loop })
    }
}

impl WindowSystem for WinitWindowSystem {
    type Window = Window;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<Window> {
        let attributes = Window::default_attributes()
            .with_title(desc.title.clone())
            .with_inner_size(PhysicalSize::new(desc.width, desc.height))
            .with_resizable(false);

        // Windows are normally created from inside the running loop; this
        // one has to exist before the first pump.
        #[allow(deprecated)]
        let window = self
            .event_loop
            .create_window(attributes)
            .map_err(|e| Error::WindowSystem(e.to_string()))?;

        log::info!("Window created: {}x{} ({})", desc.width, desc.height, desc.title);
        Ok(window)
    }

    fn required_instance_extensions(&self) -> Result<Vec<CString>> {
        let names = ash_window::enumerate_required_extensions(self.event_loop.raw_display_handle())
            .querying("required surface extensions")?;

        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_owned())
            .collect())
    }

    fn poll_close_requested(&mut self) -> bool {
        let mut watcher = CloseWatcher::default();
        let status = self
            .event_loop
            .pump_app_events(Some(POLL_TIMEOUT), &mut watcher);

        watcher.close_requested || matches!(status, PumpStatus::Exit(_))
    }

    fn destroy_window(&mut self, window: Window) {
        drop(window);
        log::debug!("Window destroyed");
    }

    fn terminate(self) {
        drop(self.event_loop);
        log::debug!("Event loop shut down");
    }
}

#[derive(Default)]
struct CloseWatcher {
    close_requested: bool,
}

impl ApplicationHandler for CloseWatcher {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::CloseRequested = event {
            log::info!("Close requested");
            self.close_requested = true;
        }
    }
}
