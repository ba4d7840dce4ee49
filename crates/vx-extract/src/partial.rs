use std::collections::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use vx_core::{BoundingBox, Error, Vec3i, Volume};
use vx_exec::TaskExecutor;
use vx_grid::{load_container, stage_path, write_error_marker, ChunkDataset, MarkerKind, Stage};

use crate::records::{ObjectType, PartialObject};

/// Collects the per-object voxel lists of one stitched label volume.
///
/// `origin` is the absolute coordinate of the volume's first voxel; the
/// returned voxel lists are absolute and in scan order.
pub fn extract_partial_objects(
    labels: &Volume<u64>,
    origin: Vec3i,
    chunk_number: usize,
) -> Vec<PartialObject> {
    let shape = labels.shape();
    let mut objects: HashMap<u64, PartialObject> = HashMap::new();

    for z in 0..shape[2] {
        for y in 0..shape[1] {
            for x in 0..shape[0] {
                let id = labels.at(x, y, z);
                if id == 0 {
                    continue;
                }
                let voxel = origin + Vec3i::new(x as i64, y as i64, z as i64);
                objects
                    .entry(id)
                    .and_modify(|o| {
                        o.voxels.push(voxel);
                        o.bounding_box.extend_voxel(voxel);
                    })
                    .or_insert_with(|| PartialObject {
                        id,
                        chunk_number,
                        voxels: vec![voxel],
                        bounding_box: BoundingBox::of_voxel(voxel),
                    });
            }
        }
    }

    let mut out: Vec<PartialObject> = objects.into_values().collect();
    out.sort_by_key(|o| o.id);
    out
}

/// Partial-record path; the `(ID, chunk)` key makes phase-one writes
/// collision-free.
pub fn partial_path(root: &Path, object_type: ObjectType, id: u64, chunk_number: usize) -> PathBuf {
    root.join("partials")
        .join(object_type.as_str())
        .join(format!("{id}_{chunk_number}.json"))
}

pub fn save_partial(
    root: &Path,
    object_type: ObjectType,
    partial: &PartialObject,
) -> Result<(), Error> {
    let path = partial_path(root, object_type, partial.id, partial.chunk_number);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), partial)?;
    Ok(())
}

/// End-of-stage summary for phase one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub chunks: usize,
    /// Partial records written across all chunks.
    pub partials: usize,
    /// Chunks with missing or unreadable input, recorded as marker files.
    pub marked_chunks: usize,
    pub failed_chunks: usize,
}

/// Phase one: one task per chunk, reading the `_stitched_components`
/// artifact and writing one partial record per object seen in the chunk.
///
/// Missing or unreadable chunk input is recorded as an `existence error`
/// or `load error` marker and the chunk is skipped; extraction of the
/// remaining chunks continues.
pub fn extract_partials<E: TaskExecutor>(
    dataset: &ChunkDataset,
    filename: &str,
    suffix: &str,
    channel: &str,
    object_type: ObjectType,
    root: &Path,
    executor: &E,
) -> Result<ExtractSummary, Error> {
    let chunk_numbers: Vec<usize> = dataset.chunks().iter().map(|c| c.number).collect();

    let results = executor.execute(chunk_numbers, |number| {
        let chunk = dataset
            .chunk(number)
            .ok_or_else(|| Error::Consistency(format!("unknown chunk {number}")))?;
        let path = stage_path(&chunk.folder, filename, Stage::StitchedComponents, suffix);

        if !path.exists() {
            write_error_marker(&chunk.folder, filename, &MarkerKind::Existence)?;
            return Ok(None);
        }
        let container = match load_container(&path) {
            Ok(c) => c,
            Err(_) => {
                write_error_marker(&chunk.folder, filename, &MarkerKind::Load)?;
                return Ok(None);
            }
        };
        let labels = container.get(channel)?;

        let partials = extract_partial_objects(labels, chunk.coordinates, number);
        for partial in &partials {
            save_partial(root, object_type, partial)?;
        }
        Ok(Some(partials.len()))
    });

    let mut summary = ExtractSummary {
        chunks: dataset.len(),
        ..Default::default()
    };
    for result in results {
        match result {
            Ok(Some(n)) => summary.partials += n,
            Ok(None) => summary.marked_chunks += 1,
            Err(failure) => {
                warn!(task = failure.task_index, error = %failure.message, "partial extraction failed");
                summary.failed_chunks += 1;
            }
        }
    }

    info!(
        object_type = %object_type,
        chunks = summary.chunks,
        partials = summary.partials,
        marked = summary.marked_chunks,
        failed = summary.failed_chunks,
        "finished partial extraction"
    );
    Ok(summary)
}
