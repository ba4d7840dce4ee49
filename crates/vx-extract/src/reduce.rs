use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use vx_core::{BoundingBox, Error, Vec3i};
use vx_exec::TaskExecutor;

use crate::records::{object_path, ObjectRecord, ObjectType, PartialObject};

/// End-of-stage summary for phase two.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReduceSummary {
    pub objects: usize,
    pub failed_objects: usize,
}

fn list_partials(root: &Path, object_type: ObjectType) -> Result<BTreeMap<u64, Vec<PathBuf>>, Error> {
    let dir = root.join("partials").join(object_type.as_str());
    let mut groups: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    if !dir.exists() {
        return Ok(groups);
    }

    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Consistency(format!("bad partial file {path:?}")))?;
        let id_part = stem
            .split('_')
            .next()
            .ok_or_else(|| Error::Consistency(format!("bad partial file {path:?}")))?;
        let id: u64 = id_part
            .parse()
            .map_err(|_| Error::Consistency(format!("bad partial file {path:?}")))?;
        groups.entry(id).or_default().push(path);
    }
    Ok(groups)
}

fn load_partial(path: &Path) -> Result<PartialObject, Error> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Member voxel closest to the bounding-box center, ties broken by scan
/// order.
fn representative_coord(voxels: &[Vec3i], center: vx_core::Vec3f) -> Vec3i {
    let mut best = voxels[0];
    let mut best_d2 = f32::MAX;
    for &v in voxels {
        let d = v.to_f() - center;
        let d2 = d.dot(d);
        if d2 < best_d2 {
            best_d2 = d2;
            best = v;
        }
    }
    best
}

fn reduce_one(
    root: &Path,
    object_type: ObjectType,
    id: u64,
    paths: &[PathBuf],
) -> Result<(), Error> {
    let mut voxels: Vec<Vec3i> = Vec::new();
    let mut bounding_box: Option<BoundingBox> = None;

    for path in paths {
        let partial = load_partial(path)?;
        if partial.id != id {
            return Err(Error::Consistency(format!(
                "partial {path:?} claims ID {} in group {id}",
                partial.id
            )));
        }
        bounding_box = Some(match bounding_box {
            None => partial.bounding_box,
            Some(bb) => bb.union(&partial.bounding_box),
        });
        voxels.extend(partial.voxels);
    }

    let bounding_box =
        bounding_box.ok_or_else(|| Error::Consistency(format!("object {id} has no partials")))?;
    voxels.sort_unstable_by_key(|v| (v.z, v.y, v.x));
    voxels.dedup();

    let record = ObjectRecord {
        id,
        object_type,
        size: voxels.len() as u64,
        rep_coord: representative_coord(&voxels, bounding_box.center()),
        voxels,
        bounding_box,
    };

    let path = object_path(root, object_type, id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), &record)?;
    Ok(())
}

/// Phase two: groups partial records by object ID and merges each group
/// in exactly one task, so every final object file has a single writer.
pub fn reduce_objects<E: TaskExecutor>(
    root: &Path,
    object_type: ObjectType,
    executor: &E,
) -> Result<ReduceSummary, Error> {
    let groups = list_partials(root, object_type)?;
    let payloads: Vec<(u64, Vec<PathBuf>)> = groups.into_iter().collect();

    let mut summary = ReduceSummary {
        objects: payloads.len(),
        ..Default::default()
    };

    let results = executor.execute(payloads, |(id, paths)| {
        reduce_one(root, object_type, id, &paths)
    });
    for result in results {
        if let Err(failure) = result {
            warn!(task = failure.task_index, error = %failure.message, "object reduce failed");
            summary.failed_objects += 1;
        }
    }

    info!(
        object_type = %object_type,
        objects = summary.objects,
        failed = summary.failed_objects,
        "finished object reduce"
    );
    Ok(summary)
}

/// Loads one reduced object record.
pub fn load_object(root: &Path, object_type: ObjectType, id: u64) -> Result<ObjectRecord, Error> {
    let file = fs::File::open(object_path(root, object_type, id))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
