use std::collections::BTreeMap;

use tracing::info;

use vx_core::Error;
use vx_grid::{load_container, save_container, stage_path, ChunkDataset, Stage};

/// Rewrites per-chunk component labels into disjoint global ranges.
///
/// Chunks are visited in chunk-number order and every non-zero label gets
/// the per-channel running maximum added, so the assignment is
/// deterministic and no two chunks ever share a label. Reads the
/// `_connected_components` artifact of each chunk and writes the
/// `_unique_components` one. Returns the final label count per channel.
pub fn make_unique_labels(
    dataset: &ChunkDataset,
    filename: &str,
    suffix: &str,
) -> Result<BTreeMap<String, u64>, Error> {
    let mut offsets: BTreeMap<String, u64> = BTreeMap::new();

    for chunk in dataset.chunks() {
        let src = stage_path(&chunk.folder, filename, Stage::ConnectedComponents, suffix);
        let mut container = load_container(&src)?;

        let names: Vec<String> = container.channel_names().map(str::to_owned).collect();
        for name in &names {
            let offset = offsets.entry(name.clone()).or_insert(0);
            let volume = container.get_mut(name)?;
            let mut chunk_max = *offset;
            for v in volume.data_mut() {
                if *v != 0 {
                    *v += *offset;
                    chunk_max = chunk_max.max(*v);
                }
            }
            *offset = chunk_max;
        }

        save_container(
            &stage_path(&chunk.folder, filename, Stage::UniqueComponents, suffix),
            &container,
        )?;
    }

    info!(channels = offsets.len(), "assigned globally unique labels");
    Ok(offsets)
}
