//! Path-keyed read-through byte cache
//!
//! Each archive file is loaded once and shared read-only across every
//! scanning routine of one discovery run. The cache is owned by the engine
//! and dies with it; there is no process-wide state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::common::Result;

/// Lazily populated cache of file contents
#[derive(Debug, Default)]
pub struct FileCache {
    buffers: HashMap<PathBuf, Rc<Vec<u8>>>,
}

impl FileCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `path`, read from disk on first access
    pub fn bytes(&mut self, path: &Path) -> Result<Rc<Vec<u8>>> {
        if let Some(buffer) = self.buffers.get(path) {
            return Ok(Rc::clone(buffer));
        }
        let buffer = Rc::new(fs::read(path)?);
        self.buffers.insert(path.to_path_buf(), Rc::clone(&buffer));
        Ok(buffer)
    }

    /// Seed the cache with an in-memory buffer for `path`
    ///
    /// Later lookups return this buffer instead of touching the filesystem.
    pub fn preload(&mut self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.buffers.insert(path.into(), Rc::new(data));
    }
}
