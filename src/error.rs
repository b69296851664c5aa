// Bring-up errors
//
// Every failure is fatal to context construction. Variants are tagged so
// callers can tell environment problems from negotiation problems, but the
// process boundary only ever prints the message.

use ash::prelude::VkResult;
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Event loop or window could not be created.
    #[error("Failed to initialize windowing system: {0}")]
    WindowSystem(String),

    /// The Vulkan loader library is missing.
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Failed to create {what}: {result}")]
    Creation {
        what: &'static str,
        result: vk::Result,
    },

    #[error("Failed to query {what}: {result}")]
    Query {
        what: &'static str,
        result: vk::Result,
    },

    #[error("Failed to find a suitable GPU")]
    NoSuitableDevice,

    #[error("Shader type not found: {0}")]
    UnknownShaderStage(String),

    #[error("No vertex shader found")]
    MissingVertexStage,

    #[error("Failed to read shader file {path:?}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(#[source] std::io::Error),

    #[error("Validation layer not available: {0}")]
    MissingLayer(String),

    #[error("{0} used before it was created")]
    Uninitialized(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach the failing operation to a raw `vk::Result`.
pub trait VkResultExt<T> {
    fn creating(self, what: &'static str) -> Result<T>;
    fn querying(self, what: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn creating(self, what: &'static str) -> Result<T> {
        self.map_err(|result| Error::Creation { what, result })
    }

    fn querying(self, what: &'static str) -> Result<T> {
        self.map_err(|result| Error::Query { what, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_failure_names_the_resource() {
        let result: VkResult<()> = Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = result.creating("swapchain").unwrap_err();
        assert!(matches!(err, Error::Creation { what: "swapchain", .. }));
        assert!(err.to_string().starts_with("Failed to create swapchain"));
    }

    #[test]
    fn query_failure_is_distinct_from_creation() {
        let result: VkResult<u32> = Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        assert!(matches!(
            result.querying("physical devices"),
            Err(Error::Query { what: "physical devices", .. })
        ));
    }
}
