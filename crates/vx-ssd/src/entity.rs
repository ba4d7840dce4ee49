use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde_json::Value;

use vx_core::Error;
use vx_skel::SkeletonGraph;

use crate::coherent::Cached;

/// Two-level fan-out directory for one entity, `id % 100` then
/// `(id / 100) % 100`, keeping directory sizes bounded for millions of
/// entities.
pub fn entity_dir(storage_root: &Path, id: u64) -> PathBuf {
    storage_root
        .join(format!("{}", id % 100))
        .join(format!("{}", (id / 100) % 100))
        .join(format!("{id}"))
}

/// Exclusive advisory lock on an entity directory.
///
/// Created atomically with `create_new`; dropping the guard removes the
/// lock file. A held lock makes a second `acquire` fail rather than
/// block.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn acquire(dir: &Path) -> Result<Self, Error> {
        fs::create_dir_all(dir)?;
        let path = dir.join("lock");
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::Io(format!("lock {path:?}: {e}")))?;
        Ok(Self { path })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Handle to one aggregated entity's on-disk state.
///
/// The attribute dictionary is loaded lazily and written back only when
/// modified. The skeleton is stored next to it as a separate file since
/// it is much larger and rarely needed together with the attributes.
#[derive(Debug)]
pub struct AggregatedObject {
    pub id: u64,
    dir: PathBuf,
    attr_dict: Cached<BTreeMap<String, Value>>,
}

impl AggregatedObject {
    pub fn new(storage_root: &Path, id: u64) -> Self {
        Self {
            id,
            dir: entity_dir(storage_root, id),
            attr_dict: Cached::empty(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn attr_path(&self) -> PathBuf {
        self.dir.join("attr_dict.json")
    }

    fn skeleton_path(&self) -> PathBuf {
        self.dir.join("skeleton.json")
    }

    fn load_attr_dict(path: &Path) -> Result<BTreeMap<String, Value>, Error> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn attr(&mut self, key: &str) -> Result<Option<Value>, Error> {
        let path = self.attr_path();
        let dict = self.attr_dict.get_or_try_load(|| Self::load_attr_dict(&path))?;
        Ok(dict.get(key).cloned())
    }

    pub fn set_attr(&mut self, key: &str, value: Value) -> Result<(), Error> {
        let path = self.attr_path();
        let dict = self
            .attr_dict
            .get_mut_or_try_load(|| Self::load_attr_dict(&path))?;
        dict.insert(key.to_owned(), value);
        Ok(())
    }

    /// Persists the attribute dictionary under an entity lock. A clean
    /// cache is a no-op.
    pub fn save_attr_dict(&mut self) -> Result<(), Error> {
        if !self.attr_dict.is_dirty() {
            return Ok(());
        }
        let dict = match self.attr_dict.loaded() {
            Some(d) => d,
            None => return Ok(()),
        };

        let _lock = LockGuard::acquire(&self.dir)?;
        let file = fs::File::create(self.attr_path())?;
        serde_json::to_writer(BufWriter::new(file), dict)?;
        self.attr_dict.mark_clean();
        Ok(())
    }

    /// Cached voxel count; an entity never written yet reads as size 0.
    pub fn size(&mut self) -> Result<u64, Error> {
        Ok(self
            .attr("size")?
            .and_then(|v| v.as_u64())
            .unwrap_or_default())
    }

    pub fn skeleton_exists(&self) -> bool {
        self.skeleton_path().exists()
    }

    pub fn save_skeleton(&self, skeleton: &SkeletonGraph) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        let file = fs::File::create(self.skeleton_path())?;
        serde_json::to_writer(BufWriter::new(file), skeleton)?;
        Ok(())
    }

    /// The stored skeleton, or an empty graph when none was written.
    /// Unknown and empty entities are valid reads, never errors.
    pub fn load_skeleton(&self) -> Result<SkeletonGraph, Error> {
        let path = self.skeleton_path();
        if !path.exists() {
            return Ok(SkeletonGraph::new());
        }
        let file = fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
