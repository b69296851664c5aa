// =============================================================================
// VULKAN CONTEXT BRING-UP
// =============================================================================
//
// Opens a window, brings up everything needed to draw one triangle, waits
// for the user to close the window and tears it all down again.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  main (config, logging, exit code)                              │
// │    └── ContextBuilder                                           │
// │          ├── WindowSystem (winit)                               │
// │          └── GpuBackend (ash)                                   │
// │                ├── DeviceSelector / QueueFamilyIndices          │
// │                ├── SwapchainSupportDetails (negotiation)        │
// │                └── shader modules, render pass, pipeline        │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

mod backend;
mod config;
mod context;
mod error;
#[cfg(test)]
mod testing;
mod window;

use anyhow::{Context as _, Result};
use backend::{AshBackend, ShaderDir};
use config::{Config, PlatformFlags, CONFIG_PATH};
use context::ContextBuilder;
use std::process::ExitCode;
use window::{WindowDesc, WinitWindowSystem};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> ExitCode {
    let (config, config_error) = Config::load();
    init_logging(&config);

    match config_error {
        Some(e) => log::warn!("Failed to load {}: {:#}. Using defaults.", CONFIG_PATH, e),
        None => log::debug!("Config: {:?}", config),
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Not logged as well: env_logger also writes to stderr
            eprintln!("{}", failure_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// The whole cause chain on one line.
fn failure_line(error: &anyhow::Error) -> String {
    format!("{:#}", error)
}

/// Default level comes from config; RUST_LOG still wins.
fn init_logging(config: &Config) {
    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();
}

fn run(config: &Config) -> Result<()> {
    log::info!(
        "Starting: {}x{} window, shaders from {:?}",
        config.window.width,
        config.window.height,
        config.shaders.directory
    );

    let windowing = WinitWindowSystem::new().context("Windowing system unavailable")?;
    let backend = AshBackend::load().context("Vulkan unavailable")?;
    let shaders = ShaderDir::new(&config.shaders.directory);

    let mut ctx = ContextBuilder::new()
        .with_window(WindowDesc::from(&config.window))
        .with_validation(config.validation_enabled())
        .with_platform_flags(PlatformFlags::host())
        .build(windowing, backend, &shaders)
        .context("Failed to bring up Vulkan context")?;

    let extent = ctx.swapchain_extent();
    log::info!(
        "Ready: {} image views at {}x{} ({:?}), {} shader stages",
        ctx.image_views().len(),
        extent.width,
        extent.height,
        ctx.swapchain_format(),
        ctx.shader_modules().len()
    );
    log::debug!(
        "Handles: instance {:?}, surface {:?}, gpu {:?}, device {:?}, queues {:?}/{:?} ({:?})",
        ctx.instance(),
        ctx.surface(),
        ctx.physical_device(),
        ctx.device(),
        ctx.graphics_queue(),
        ctx.present_queue(),
        ctx.queue_families()
    );
    log::debug!(
        "Handles: swapchain {:?} ({} images), render pass {:?}, layout {:?}, pipeline {:?}",
        ctx.swapchain(),
        ctx.swapchain_images().len(),
        ctx.render_pass(),
        ctx.pipeline_layout(),
        ctx.pipeline()
    );

    ctx.wait_until_close()?;
    Ok(())
}
