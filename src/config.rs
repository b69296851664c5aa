// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Window, shader location and debug switches. Missing or broken config files
// fall back to defaults so the triangle still comes up.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan!".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Where compiled SPIR-V lives
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub directory: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./shaders/spirv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
        }
    }
}

/// Where `Config::load` looks.
pub const CONFIG_PATH: &str = "config.toml";

impl Config {
    /// Load `config.toml`, falling back to defaults.
    ///
    /// Nothing is logged here: this runs before the logger exists, so a load
    /// failure is handed back for the caller to report once it does.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default(CONFIG_PATH)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path. A missing file is not an
    /// error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validation layers only ever run in debug builds.
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.debug
            .log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

/// Host-platform switches that change which extensions bring-up requests.
///
/// Resolved from the build target by [`PlatformFlags::host`], but passed to
/// the builder as a plain value so both branches can be exercised anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformFlags {
    /// MoltenVK-style portability subset: adds the portability enumeration
    /// instance extensions and flag, and the portability subset device
    /// extension.
    pub portability: bool,
}

impl PlatformFlags {
    pub fn host() -> Self {
        Self {
            portability: cfg!(target_os = "macos"),
        }
    }
}
