//! The [`FileProvider`] trait decouples the compiler from the file system;
//! the driver reads real files, tests feed sources from memory.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

pub trait FileProvider {
    /// Gets the contents of the file with the specified name
    fn read_file(&self, name: &str) -> Option<String>;
}

/// Reads files relative to a root directory
#[derive(Debug, Default)]
pub struct FsFileProvider {
    pub root: PathBuf,
}

impl FsFileProvider {
    pub fn new(root: PathBuf) -> Self {
        FsFileProvider { root }
    }
}

impl FileProvider for FsFileProvider {
    fn read_file(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(name)).ok()
    }
}

/// An in-memory pool of files
#[derive(Debug, Default)]
pub struct MemoryFileProvider {
    files: FxHashMap<String, String>,
}

impl MemoryFileProvider {
    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileProvider for MemoryFileProvider {
    fn read_file(&self, name: &str) -> Option<String> {
        self.files.get(name).cloned()
    }
}
