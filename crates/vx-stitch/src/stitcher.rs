use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

use vx_core::{Error, Vec3i, Volume};
use vx_exec::TaskExecutor;
use vx_grid::{load_container, save_container, stage_path, ChunkDataset, Stage};

use crate::union_find::UnionFind;

/// Label pairs that meet across chunk boundaries, keyed by channel.
pub type MergePairs = BTreeMap<String, Vec<(u64, u64)>>;

/// End-of-stage summary for the stitching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StitchSummary {
    pub chunks: usize,
    /// Boundary label pairs collected before deduplication.
    pub merge_pairs: usize,
    /// Labels rewritten to a smaller canonical label.
    pub remapped_labels: usize,
    pub failed_chunks: usize,
}

/// Compares thin voxel bands of one chunk against its positive-direction
/// neighbors and collects co-located label pairs per channel.
///
/// Both chunks see the boundary voxels through their read padding, so the
/// band of half-width `stitch_overlap` around each face is present in both
/// `_unique_components` artifacts. Only the three forward neighbors are
/// visited; the backward pairs are collected by the neighbors themselves.
/// Immediately repeated pairs are dropped to keep the lists short.
pub fn collect_chunk_merge_pairs(
    dataset: &ChunkDataset,
    chunk_number: usize,
    filename: &str,
    suffix: &str,
    stitch_overlap: Vec3i,
) -> Result<MergePairs, Error> {
    for d in 0..3 {
        if stitch_overlap.axis(d) < 0 || stitch_overlap.axis(d) > dataset.overlap.axis(d) {
            return Err(Error::Consistency(format!(
                "stitch overlap {stitch_overlap:?} exceeds chunk overlap {:?}",
                dataset.overlap
            )));
        }
    }

    let chunk = dataset
        .chunk(chunk_number)
        .ok_or_else(|| Error::Consistency(format!("unknown chunk {chunk_number}")))?;
    let own = load_container(&stage_path(
        &chunk.folder,
        filename,
        Stage::UniqueComponents,
        suffix,
    ))?;

    let padded = (chunk.size + dataset.overlap * 2).to_shape();
    let mut pairs = MergePairs::new();

    for (d, neighbor) in dataset.forward_neighbors(chunk).iter().enumerate() {
        let Some(neighbor) = neighbor else {
            continue;
        };
        let neighbor = dataset
            .chunk(*neighbor)
            .ok_or_else(|| Error::Consistency(format!("unknown chunk {neighbor}")))?;
        let other = load_container(&stage_path(
            &neighbor.folder,
            filename,
            Stage::UniqueComponents,
            suffix,
        ))?;

        // Band around the shared face, in this chunk's padded coordinates.
        let band_lo = (dataset.overlap.axis(d) + chunk.size.axis(d) - stitch_overlap.axis(d))
            .max(0) as usize;
        let band_hi = ((dataset.overlap.axis(d) + chunk.size.axis(d) + stitch_overlap.axis(d))
            as usize)
            .min(padded[d]);
        // Same global voxel in the neighbor's padded coordinates.
        let shift = dataset.chunk_size.axis(d);

        for name in own.channel_names() {
            let a = own.get(name)?;
            let b = other.get(name)?;
            let list = pairs.entry(name.to_owned()).or_default();
            let mut last: Option<(u64, u64)> = None;

            let mut range = [0..padded[0], 0..padded[1], 0..padded[2]];
            range[d] = band_lo..band_hi;

            for z in range[2].clone() {
                for y in range[1].clone() {
                    for x in range[0].clone() {
                        let va = a.at(x, y, z);
                        if va == 0 {
                            continue;
                        }
                        let mut n = [x as i64, y as i64, z as i64];
                        n[d] -= shift;
                        let vb = b.at(n[0] as usize, n[1] as usize, n[2] as usize);
                        // Unique labeling gives the two chunks disjoint
                        // label ranges, so va == vb only in artifacts that
                        // skipped it; a self-pair is a union no-op anyway.
                        if vb == 0 || va == vb {
                            continue;
                        }
                        let pair = (va, vb);
                        if last == Some(pair) {
                            continue;
                        }
                        list.push(pair);
                        last = Some(pair);
                    }
                }
            }
        }
    }

    Ok(pairs)
}

/// Resolves a flat pair list into a union-find with smallest-member roots.
pub fn build_merge_list(pairs: &[(u64, u64)]) -> UnionFind {
    let mut uf = UnionFind::new();
    for &(a, b) in pairs {
        uf.union(a, b);
    }
    uf
}

/// Rewrites every label through `map`; labels without an entry stay.
pub fn relabel_volume(volume: &mut Volume<u64>, map: &HashMap<u64, u64>) {
    if map.is_empty() {
        return;
    }
    for v in volume.data_mut() {
        if let Some(&canonical) = map.get(v) {
            *v = canonical;
        }
    }
}

/// Runs the full stitching stage over a dataset whose chunks carry
/// `_unique_components` artifacts.
///
/// Pair collection and final relabeling fan out one task per chunk; the
/// union-find resolution in between is a single-threaded barrier. Any
/// failure during pair collection aborts the stage, since a missed
/// boundary would silently split objects; relabel failures are counted
/// and skipped like in the other per-chunk stages. The relabeled volumes
/// are cropped to the logical chunk extent before being written as
/// `_stitched_components`.
pub fn stitch_chunks<E: TaskExecutor>(
    dataset: &ChunkDataset,
    filename: &str,
    suffix: &str,
    stitch_overlap: Vec3i,
    executor: &E,
) -> Result<StitchSummary, Error> {
    let chunk_numbers: Vec<usize> = dataset.chunks().iter().map(|c| c.number).collect();

    let collected = executor.execute(chunk_numbers.clone(), |number| {
        collect_chunk_merge_pairs(dataset, number, filename, suffix, stitch_overlap)
    });

    let mut all_pairs = MergePairs::new();
    for result in collected {
        let pairs = result.map_err(|f| Error::Consistency(f.to_string()))?;
        for (name, mut list) in pairs {
            all_pairs.entry(name).or_default().append(&mut list);
        }
    }

    let mut summary = StitchSummary {
        chunks: dataset.len(),
        merge_pairs: all_pairs.values().map(Vec::len).sum(),
        ..Default::default()
    };

    let mut maps: BTreeMap<String, HashMap<u64, u64>> = BTreeMap::new();
    for (name, list) in &all_pairs {
        let map = build_merge_list(list).canonical_map();
        summary.remapped_labels += map.len();
        maps.insert(name.clone(), map);
    }

    let applied = executor.execute(chunk_numbers, |number| {
        let chunk = dataset
            .chunk(number)
            .ok_or_else(|| Error::Consistency(format!("unknown chunk {number}")))?;
        let container = load_container(&stage_path(
            &chunk.folder,
            filename,
            Stage::UniqueComponents,
            suffix,
        ))?;

        let offset = dataset.overlap.to_shape();
        let size = chunk.size.to_shape();
        let mut out = vx_grid::ChannelContainer::new();
        for name in container.channel_names() {
            let mut volume = container.get(name)?.subvolume(offset, size)?;
            if let Some(map) = maps.get(name) {
                relabel_volume(&mut volume, map);
            }
            out.insert(name, volume);
        }

        save_container(
            &stage_path(&chunk.folder, filename, Stage::StitchedComponents, suffix),
            &out,
        )?;
        Ok(())
    });

    for result in applied {
        if let Err(failure) = result {
            warn!(task = failure.task_index, error = %failure.message, "chunk relabel failed");
            summary.failed_chunks += 1;
        }
    }

    info!(
        chunks = summary.chunks,
        merge_pairs = summary.merge_pairs,
        remapped = summary.remapped_labels,
        failed = summary.failed_chunks,
        "finished stitching"
    );
    Ok(summary)
}
