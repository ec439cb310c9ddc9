/// Shader template store
///
/// A logical shader `foo` is stored as two text files, `foo_vert.glsl` and
/// `foo_frag.glsl`. Both suffixes have the same length so the logical name is
/// obtained by cutting a fixed number of characters from either file name.
///
/// Files are located through an `AssetRegistry`, which keeps the store
/// independent from where templates actually live (directory, archive,
/// memory for tests, ...).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use crate::error::{Error, Result};
use crate::gpu::ShaderStage;
use crate::shader::{ShaderData, ShaderTemplatePair};

/// File name suffix of vertex templates
pub const VERTEX_SUFFIX: &str = "_vert.glsl";

/// File name suffix of fragment templates
pub const FRAGMENT_SUFFIX: &str = "_frag.glsl";

const _: () = assert!(VERTEX_SUFFIX.len() == FRAGMENT_SUFFIX.len());

const SUFFIX_LEN: usize = VERTEX_SUFFIX.len();

/// Template suffix of `stage`
pub fn stage_suffix(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => VERTEX_SUFFIX,
        ShaderStage::Fragment => FRAGMENT_SUFFIX,
    }
}

/// Whether `path` names a vertex or fragment template
pub fn is_template_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(VERTEX_SUFFIX) || name.ends_with(FRAGMENT_SUFFIX))
        .unwrap_or(false)
}

/// Logical shader name of a template file name
///
/// # Errors
///
/// `InvalidAssetFilename` if the name carries neither template suffix or
/// nothing is left once the suffix is removed.
pub fn logical_name(file_name: &str) -> Result<String> {
    if !(file_name.ends_with(VERTEX_SUFFIX) || file_name.ends_with(FRAGMENT_SUFFIX)) {
        return Err(Error::InvalidAssetFilename(file_name.to_string()));
    }
    let name = &file_name[..file_name.len() - SUFFIX_LEN];
    if name.is_empty() {
        return Err(Error::InvalidAssetFilename(file_name.to_string()));
    }
    Ok(name.to_string())
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

// ===== ASSET REGISTRY =====

/// Source of template files
pub trait AssetRegistry: Send + Sync {
    /// Template files whose logical name is `name`, in a stable order
    fn resolve_files_for_logical_name(&self, name: &str) -> Vec<PathBuf>;

    /// Raw content of a file returned by `resolve_files_for_logical_name`
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Registry over the template files of a single directory
#[derive(Debug, Clone)]
pub struct DirectoryAssetRegistry {
    root: PathBuf,
}

impl DirectoryAssetRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn template_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && is_template_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Every logical name with at least one template file, sorted
    pub fn logical_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.template_files()?
            .iter()
            .filter_map(|path| file_name_of(path))
            .filter_map(|file_name| logical_name(file_name).ok())
            .collect();
        // File order interleaves shared prefixes: a_frag, a_g_frag, a_g_vert, a_vert
        names.sort();
        names.dedup();
        Ok(names)
    }
}

impl AssetRegistry for DirectoryAssetRegistry {
    fn resolve_files_for_logical_name(&self, name: &str) -> Vec<PathBuf> {
        match self.template_files() {
            Ok(files) => files.into_iter()
                .filter(|path| {
                    file_name_of(path)
                        .and_then(|file_name| logical_name(file_name).ok())
                        .map(|logical| logical == name)
                        .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                crate::engine_warn!(
                    "lumen::TemplateStore",
                    "Cannot list shader directory '{}': {}", self.root.display(), e
                );
                Vec::new()
            }
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }
}

/// In-memory registry, keyed by file path
///
/// Files can be replaced at any time, which makes it handy for hot-reload
/// scenarios and tests.
#[derive(Debug, Default)]
pub struct MemoryAssetRegistry {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryAssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), content.into());
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        if let Ok(mut files) = self.files.write() {
            files.remove(path.as_ref());
        }
    }

    /// Add or replace both templates of `name`
    pub fn insert_pair(&self, name: &str, vertex: &str, fragment: &str) {
        self.insert(format!("{}{}", name, VERTEX_SUFFIX), vertex);
        self.insert(format!("{}{}", name, FRAGMENT_SUFFIX), fragment);
    }
}

impl AssetRegistry for MemoryAssetRegistry {
    fn resolve_files_for_logical_name(&self, name: &str) -> Vec<PathBuf> {
        let Ok(files) = self.files.read() else {
            return Vec::new();
        };
        files.keys()
            .filter(|path| {
                file_name_of(path)
                    .and_then(|file_name| logical_name(file_name).ok())
                    .map(|logical| logical == name)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self.files.read()
            .map_err(|_| Error::Io("Memory registry lock poisoned".to_string()))?;
        files.get(path)
            .cloned()
            .ok_or_else(|| Error::Io(format!("File not found: {}", path.display())))
    }
}

// ===== TEMPLATE STORE =====

/// Loads template pairs by logical name
#[derive(Clone)]
pub struct ShaderTemplateStore {
    registry: Arc<dyn AssetRegistry>,
}

impl ShaderTemplateStore {
    pub fn new(registry: Arc<dyn AssetRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn AssetRegistry> {
        &self.registry
    }

    /// Load both templates of `name`
    ///
    /// # Errors
    ///
    /// - `MissingStage` if either template is absent
    /// - `Io` if a template cannot be read or is not UTF-8
    pub fn load(&self, name: &str) -> Result<ShaderTemplatePair> {
        let files = self.registry.resolve_files_for_logical_name(name);
        let vertex = self.read_stage(name, &files, ShaderStage::Vertex)?;
        let fragment = self.read_stage(name, &files, ShaderStage::Fragment)?;
        Ok(ShaderTemplatePair::new(vertex, fragment))
    }

    /// Load the templates of `name` and derive its parameters
    pub fn load_data(&self, name: &str) -> Result<ShaderData> {
        Ok(ShaderData::new(self.load(name)?))
    }

    fn read_stage(&self, name: &str, files: &[PathBuf], stage: ShaderStage) -> Result<String> {
        let suffix = stage_suffix(stage);
        let path = files.iter()
            .find(|path| file_name_of(path).map(|f| f.ends_with(suffix)).unwrap_or(false))
            .ok_or_else(|| Error::MissingStage(format!("{} (no {} template)", name, stage.name())))?;

        let bytes = self.registry.read(path)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::Io(format!("Template '{}' is not valid UTF-8", path.display())))
    }
}

#[cfg(test)]
#[path = "template_store_tests.rs"]
mod tests;
