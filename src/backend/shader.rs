// Shader module loading and management
//
// Vulkan consumes SPIR-V. Compiled files are discovered by walking a
// directory; the stage of each file is taken from its name.

use crate::error::{Error, Result, VkResultExt};
use ash::vk;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A file name and its raw contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl BinaryFile {
    pub fn new(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }
}

/// Ordered so pipeline stages come out vertex, fragment, geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderKind {
    /// `.vert`, `.frag` or `.geom` anywhere in the name, checked in that order.
    pub fn from_file_name(name: &str) -> Result<Self> {
        if name.contains(".vert") {
            Ok(Self::Vertex)
        } else if name.contains(".frag") {
            Ok(Self::Fragment)
        } else if name.contains(".geom") {
            Ok(Self::Geometry)
        } else {
            Err(Error::UnknownShaderStage(name.to_string()))
        }
    }

    pub fn stage(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Self::Geometry => vk::ShaderStageFlags::GEOMETRY,
        }
    }
}

/// One module per stage kind.
pub type ShaderMap = BTreeMap<ShaderKind, vk::ShaderModule>;

/// Where compiled shader binaries come from.
pub trait ShaderSource {
    fn binary_files(&self) -> Result<Vec<BinaryFile>>;
}

/// Recursive scan of a directory on disk.
#[derive(Debug, Clone)]
pub struct ShaderDir {
    root: PathBuf,
}

impl ShaderDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderSource for ShaderDir {
    fn binary_files(&self) -> Result<Vec<BinaryFile>> {
        let mut files = Vec::new();
        search_files(&self.root, &mut files)?;
        log::debug!("Found {} shader files under {:?}", files.len(), self.root);
        Ok(files)
    }
}

impl ShaderSource for [BinaryFile] {
    fn binary_files(&self) -> Result<Vec<BinaryFile>> {
        Ok(self.to_vec())
    }
}

impl ShaderSource for Vec<BinaryFile> {
    fn binary_files(&self) -> Result<Vec<BinaryFile>> {
        Ok(self.clone())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::ShaderIo {
        path: path.to_path_buf(),
        source,
    }
}

fn search_files(dir: &Path, files: &mut Vec<BinaryFile>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_error(dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_error(dir))?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            search_files(&path, files)?;
        } else if path.is_file() {
            let contents = std::fs::read(&path).map_err(io_error(&path))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(BinaryFile::new(name, contents));
        }
    }

    Ok(())
}

/// Sort by file name and classify every file. Later files of the same kind
/// replace earlier ones.
pub fn classify(mut files: Vec<BinaryFile>) -> Result<Vec<(ShaderKind, BinaryFile)>> {
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let mut by_kind: BTreeMap<ShaderKind, BinaryFile> = BTreeMap::new();
    for file in files {
        let kind = ShaderKind::from_file_name(&file.name)?;
        if let Some(replaced) = by_kind.insert(kind, file) {
            log::warn!("{:?} shader {} replaced by a later file", kind, replaced.name);
        }
    }

    Ok(by_kind.into_iter().collect())
}

/// Load SPIR-V from bytes and create a shader module
pub fn create_shader_module(device: &ash::Device, code: &[u8]) -> Result<vk::ShaderModule> {
    // SPIR-V is a stream of 4-byte words; read_spv copies into aligned storage
    let words = ash::util::read_spv(&mut std::io::Cursor::new(code)).map_err(Error::InvalidSpirv)?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

    unsafe { device.create_shader_module(&create_info, None) }.creating("shader module")
}
