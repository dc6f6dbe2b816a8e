// src/fs/mock.rs

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, bail};

use super::FileSystem;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

/// In-memory checkout and artifact trees for oracle tests.
///
/// Clones share the same tree, so a test can edit files after handing a
/// clone to the oracle.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    nodes: Arc<Mutex<BTreeMap<PathBuf, Node>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn nodes(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        // A panic while holding the lock leaves the map itself intact.
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write `content` at `path`, creating missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut nodes = self.nodes();
        if let Some(parent) = path.parent() {
            insert_dirs(&mut nodes, parent);
        }
        nodes.insert(path.to_path_buf(), Node::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        insert_dirs(&mut self.nodes(), path.as_ref());
    }

    /// Drop `path` together with everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes().retain(|p, _| !p.starts_with(path));
    }
}

fn insert_dirs(nodes: &mut BTreeMap<PathBuf, Node>, dir: &Path) {
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
    }
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        match self.nodes().get(path) {
            Some(Node::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(Node::Dir) => bail!("{} is a directory", path.display()),
            None => bail!("{} does not exist", path.display()),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.nodes().get(path), Some(Node::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.nodes().get(path), Some(Node::Dir))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let nodes = self.nodes();
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            bail!("{} is not a directory", path.display());
        }
        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}
