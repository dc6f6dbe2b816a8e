// src/oracle/hash.rs

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::types::PackageName;

/// File name (inside the state directory) of the recorded build hashes.
pub const HASH_FILE_NAME: &str = "hashes";

/// Directory entries never included in a source tree hash.
const IGNORED_ENTRIES: &[&str] = &[".git"];

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut reader = fs.open_read(path)?;
    let mut hasher = Hasher::new();
    io::copy(&mut reader, &mut hasher).with_context(|| format!("hashing {}", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute a deterministic hash over every file below `root`.
///
/// Paths are hashed relative to `root` and sorted, so the result only depends
/// on tree contents. `.git` directories are skipped.
pub fn compute_tree_hash(fs: &dyn FileSystem, root: &Path) -> Result<String> {
    let mut files = Vec::new();
    collect_files(fs, root, &mut files)?;
    files.sort();

    let mut hasher = Hasher::new();
    for path in &files {
        let relative = path.strip_prefix(root).unwrap_or(path);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(compute_file_hash(fs, path)?.as_bytes());
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(root = ?root, files = files.len(), hash = %hash, "computed source tree hash");
    Ok(hash)
}

fn collect_files(fs: &dyn FileSystem, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs.read_dir(dir)? {
        let ignored = entry
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| IGNORED_ENTRIES.contains(&n));
        if ignored {
            continue;
        }
        if fs.is_dir(&entry) {
            collect_files(fs, &entry, out)?;
        } else if fs.is_file(&entry) {
            out.push(entry);
        }
    }
    Ok(())
}

/// Combine a source tree hash with the package's source identity.
///
/// A branch or origin switch counts as a change even when the checked-out
/// tree happens to be identical.
pub fn compute_package_hash(origin: &str, branch: &str, tree_hash: &str) -> String {
    let mut hasher = Hasher::new();
    for part in [origin, branch, tree_hash] {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    hasher.finalize().to_hex().to_string()
}

/// Abstract storage for the hash of each package's last successful build.
pub trait HashStore: Send + Sync {
    fn load(&self, package: &str) -> Result<Option<String>>;
    fn save(&mut self, package: &str, hash: &str) -> Result<()>;
    /// Remove hashes for packages that are not in the `active` list.
    fn prune(&mut self, active: &[&str]) -> Result<()>;
}

/// Stores hashes in `<state_dir>/hashes`, one `name hash` pair per line.
pub struct FileHashStore {
    state_dir: PathBuf,
}

impl FileHashStore {
    pub fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    fn path(&self) -> PathBuf {
        self.state_dir.join(HASH_FILE_NAME)
    }
}

impl HashStore for FileHashStore {
    fn load(&self, package: &str) -> Result<Option<String>> {
        Ok(read_table(&self.path())?.remove(package))
    }

    fn save(&mut self, package: &str, hash: &str) -> Result<()> {
        let path = self.path();
        let mut table = read_table(&path)?;
        if table.get(package).map(String::as_str) == Some(hash) {
            return Ok(());
        }
        table.insert(package.to_string(), hash.to_string());
        write_table(&path, &table)?;
        debug!(%package, %hash, path = %path.display(), "build hash written");
        Ok(())
    }

    fn prune(&mut self, active: &[&str]) -> Result<()> {
        let path = self.path();
        let mut table = read_table(&path)?;
        let stale: Vec<PackageName> = table
            .keys()
            .filter(|name| !active.contains(&name.as_str()))
            .cloned()
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        for name in &stale {
            table.remove(name);
        }
        write_table(&path, &table)?;
        info!(?stale, "forgot build hashes of removed packages");
        Ok(())
    }
}

/// Stores hashes in memory only.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    map: HashMap<PackageName, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known set of recorded hashes.
    pub fn with_hashes<I, K, V>(hashes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            map: hashes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, package: &str) -> Result<Option<String>> {
        Ok(self.map.get(package).cloned())
    }

    fn save(&mut self, package: &str, hash: &str) -> Result<()> {
        self.map.insert(package.to_string(), hash.to_string());
        info!(package = %package, hash = %hash, "recorded build hash (memory)");
        Ok(())
    }

    fn prune(&mut self, active: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale build hashes (memory)"
            );
        }
        Ok(())
    }
}

type HashTable = BTreeMap<PackageName, String>;

/// Missing file means nothing was ever recorded. Malformed lines are skipped.
fn read_table(path: &Path) -> Result<HashTable> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashTable::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("reading build hashes from {}", path.display()));
        }
    };

    Ok(text
        .lines()
        .filter_map(|line| line.trim().split_once(char::is_whitespace))
        .map(|(name, hash)| (name.to_string(), hash.trim().to_string()))
        .collect())
}

fn write_table(path: &Path, table: &HashTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating state directory {}", parent.display()))?;
    }

    let body: String = table
        .iter()
        .map(|(name, hash)| format!("{name} {hash}\n"))
        .collect();
    fs::write(path, body).with_context(|| format!("writing build hashes to {}", path.display()))
}
