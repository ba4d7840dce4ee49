use tracing::{info, warn};

use vx_core::{Error, PipelineConfig};
use vx_exec::TaskExecutor;
use vx_grid::{
    load_container, save_container, stage_path, write_error_marker, ChannelContainer,
    ChunkDataset, MarkerKind, Stage, VolumeStore,
};

use crate::contact::detect_contact_sites;
use crate::labeler::{label_block, BlockLabelConfig};

/// End-of-stage summary for the labeling pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelStageSummary {
    pub chunks: usize,
    pub failed_chunks: usize,
    pub zero_channels: usize,
    /// Connected-component count per `(chunk number, channel)`.
    pub component_counts: Vec<(usize, String, u64)>,
}

/// Runs per-chunk labeling over the whole dataset, one task per chunk.
///
/// Each task reads the padded block for every configured channel, labels
/// it, and persists a `_connected_components` artifact in the chunk
/// folder. All-zero channels are recorded as marker files; failed chunks
/// are counted and skipped, never aborting siblings.
pub fn label_chunks<E: TaskExecutor>(
    dataset: &ChunkDataset,
    store: &dyn VolumeStore,
    config: &PipelineConfig,
    filename: &str,
    suffix: &str,
    executor: &E,
) -> Result<LabelStageSummary, Error> {
    let chunk_numbers: Vec<usize> = dataset.chunks().iter().map(|c| c.number).collect();

    let results = executor.execute(chunk_numbers, |number| {
        let chunk = dataset
            .chunk(number)
            .ok_or_else(|| Error::Consistency(format!("unknown chunk {number}")))?;

        let offset = chunk.coordinates - dataset.overlap;
        let size = chunk.size + dataset.overlap * 2;

        let needs_membrane = config.channels.iter().any(|c| c.mask_with_membrane);
        let membrane = if needs_membrane {
            Some(store.read(offset, size, "membrane")?)
        } else {
            None
        };

        let block_cfg = BlockLabelConfig {
            chunk_size: chunk.size,
            overlap: dataset.overlap,
            membrane_fraction: config.membrane_fraction,
            dynamic_range: config.dynamic_range,
        };

        let mut container = ChannelContainer::new();
        let mut counts = Vec::with_capacity(config.channels.len());
        let mut zero_channels = 0usize;

        for spec in &config.channels {
            let block = store.read(offset, size, &spec.name)?;
            let out = label_block(&block, membrane.as_ref(), spec, &block_cfg)?;
            if out.component_count == 0 {
                write_error_marker(
                    &chunk.folder,
                    filename,
                    &MarkerKind::Zero {
                        channel: spec.name.clone(),
                    },
                )?;
                zero_channels += 1;
            }
            counts.push((number, spec.name.clone(), out.component_count));
            container.insert(&spec.name, out.labels);
        }

        save_container(
            &stage_path(&chunk.folder, filename, Stage::ConnectedComponents, suffix),
            &container,
        )?;
        Ok((counts, zero_channels))
    });

    let mut summary = LabelStageSummary {
        chunks: dataset.len(),
        ..Default::default()
    };
    for result in results {
        match result {
            Ok((counts, zero_channels)) => {
                summary.component_counts.extend(counts);
                summary.zero_channels += zero_channels;
            }
            Err(failure) => {
                warn!(task = failure.task_index, error = %failure.message, "chunk labeling failed");
                summary.failed_chunks += 1;
            }
        }
    }

    info!(
        chunks = summary.chunks,
        failed = summary.failed_chunks,
        zero_channels = summary.zero_channels,
        "finished chunk labeling"
    );
    Ok(summary)
}

/// End-of-stage summary for contact-site detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactStageSummary {
    pub chunks: usize,
    pub contact_voxels: usize,
    pub failed_chunks: usize,
}

/// Derives contact-site labels from stitched segmentation chunks.
///
/// Each task reads `<in_filename>_stitched_components`, runs contact-site
/// detection on `channel`, and writes the site labels as the
/// `<out_filename>_stitched_components` artifact under the same channel
/// name, so the generic object-extraction pipeline can pick them up
/// unchanged.
pub fn detect_contact_chunks<E: TaskExecutor>(
    dataset: &ChunkDataset,
    in_filename: &str,
    out_filename: &str,
    suffix: &str,
    channel: &str,
    window: [usize; 3],
    executor: &E,
) -> Result<ContactStageSummary, Error> {
    let chunk_numbers: Vec<usize> = dataset.chunks().iter().map(|c| c.number).collect();

    let results = executor.execute(chunk_numbers, |number| {
        let chunk = dataset
            .chunk(number)
            .ok_or_else(|| Error::Consistency(format!("unknown chunk {number}")))?;
        let container = load_container(&stage_path(
            &chunk.folder,
            in_filename,
            Stage::StitchedComponents,
            suffix,
        ))?;

        let sites = detect_contact_sites(container.get(channel)?, window);
        let contact_voxels = sites.data().iter().filter(|&&v| v != 0).count();

        let mut out = ChannelContainer::new();
        out.insert(channel, sites);
        save_container(
            &stage_path(&chunk.folder, out_filename, Stage::StitchedComponents, suffix),
            &out,
        )?;
        Ok(contact_voxels)
    });

    let mut summary = ContactStageSummary {
        chunks: dataset.len(),
        ..Default::default()
    };
    for result in results {
        match result {
            Ok(n) => summary.contact_voxels += n,
            Err(failure) => {
                warn!(task = failure.task_index, error = %failure.message, "contact detection failed");
                summary.failed_chunks += 1;
            }
        }
    }

    info!(
        chunks = summary.chunks,
        contact_voxels = summary.contact_voxels,
        failed = summary.failed_chunks,
        "finished contact-site detection"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::label_chunks;
    use vx_core::{
        BoundingBox, ChannelConfig, MapSource, PipelineConfig, Vec3f, Vec3i, Volume,
    };
    use vx_exec::SerialExecutor;
    use vx_grid::{
        load_container, read_error_markers, stage_path, ChunkDataset, MemoryVolumeStore, Stage,
    };

    fn test_config() -> PipelineConfig {
        let mut src = MapSource::new();
        src.insert("chunks", "chunk_size", "4,4,4");
        src.insert("chunks", "overlap", "1,1,1");
        src.insert("chunks", "stitch_overlap", "1,1,1");
        src.insert("skeleton", "dust_threshold", "0");
        let mut cfg = PipelineConfig::from_source(&src).expect("config");
        cfg.channels.push(ChannelConfig {
            name: "mi".to_owned(),
            sigma: Vec3f::default(),
            threshold: 0.5,
            mask_with_membrane: false,
        });
        cfg
    }

    #[test]
    fn labels_all_chunks_and_marks_empty_ones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ds = ChunkDataset::build(
            dir.path(),
            BoundingBox::new(Vec3i::default(), Vec3i::new(8, 4, 4)),
            Vec3i::splat(4),
            Vec3i::splat(1),
        )
        .expect("grid");

        // One blob in chunk 0 only; chunk 1 stays empty.
        let mut channel = Volume::new_fill([8, 4, 4], 0.0f32);
        channel.set(1, 1, 1, 1.0);
        channel.set(2, 1, 1, 1.0);
        let mut store = MemoryVolumeStore::new();
        store.insert("mi", channel);

        let summary = label_chunks(
            &ds,
            &store,
            &test_config(),
            "seg",
            "",
            &SerialExecutor,
        )
        .expect("label stage");

        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.failed_chunks, 0);
        assert_eq!(summary.zero_channels, 1);
        assert_eq!(
            summary.component_counts,
            vec![(0, "mi".to_owned(), 1), (1, "mi".to_owned(), 0)]
        );

        let c0 = load_container(&stage_path(
            &ds.chunks()[0].folder,
            "seg",
            Stage::ConnectedComponents,
            "",
        ))
        .expect("chunk 0 artifact");
        // Padded block: blob voxel (1,1,1) sits at (2,2,2).
        assert_eq!(c0.get("mi").expect("channel").at(2, 2, 2), 1);

        let markers = read_error_markers(&ds.chunks()[1].folder, "seg").expect("markers");
        assert_eq!(markers, vec!["zero error @ mi"]);
    }

    #[test]
    fn contact_stage_feeds_the_extraction_layout() {
        use crate::contact::contact_partners;
        use vx_grid::{save_container, ChannelContainer};

        let dir = tempfile::tempdir().expect("tempdir");
        let ds = ChunkDataset::build(
            dir.path(),
            BoundingBox::new(Vec3i::default(), Vec3i::new(8, 5, 5)),
            Vec3i::new(8, 5, 5),
            Vec3i::splat(1),
        )
        .expect("grid");

        // Two stitched slabs meeting at x = 4.
        let mut labels = Volume::new_fill([8, 5, 5], 0u64);
        for z in 0..5 {
            for y in 0..5 {
                for x in 0..4 {
                    labels.set(x, y, z, 3);
                }
                for x in 4..8 {
                    labels.set(x, y, z, 9);
                }
            }
        }
        let mut container = ChannelContainer::new();
        container.insert("sv", labels);
        save_container(
            &stage_path(&ds.chunks()[0].folder, "seg", Stage::StitchedComponents, ""),
            &container,
        )
        .expect("save");

        let summary = super::detect_contact_chunks(
            &ds,
            "seg",
            "cs_seg",
            "",
            "sv",
            [13, 13, 7],
            &SerialExecutor,
        )
        .expect("contact stage");
        assert_eq!(summary.failed_chunks, 0);
        assert_eq!(summary.contact_voxels, 25);

        let out = load_container(&stage_path(
            &ds.chunks()[0].folder,
            "cs_seg",
            Stage::StitchedComponents,
            "",
        ))
        .expect("artifact");
        let id = out.get("sv").expect("channel").at(4, 2, 2);
        assert_eq!(contact_partners(id), (3, 9));
    }

    #[test]
    fn missing_channel_counts_as_failed_chunk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ds = ChunkDataset::build(
            dir.path(),
            BoundingBox::new(Vec3i::default(), Vec3i::new(4, 4, 4)),
            Vec3i::splat(4),
            Vec3i::splat(1),
        )
        .expect("grid");

        let store = MemoryVolumeStore::new();
        let summary = label_chunks(
            &ds,
            &store,
            &test_config(),
            "seg",
            "",
            &SerialExecutor,
        )
        .expect("label stage");

        assert_eq!(summary.failed_chunks, 1);
        assert!(summary.component_counts.is_empty());
    }
}
