use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vx_core::{BoundingBox, ChannelConfig, MapSource, PipelineConfig, Vec3f, Vec3i, Volume};
use vx_exec::{PoolExecutor, SerialExecutor, TaskExecutor};
use vx_extract::{extract_partials, load_object, reduce_objects, ObjectType};
use vx_grid::{validate_chunks, ChunkDataset, MemoryVolumeStore};
use vx_label::{detect_contact_chunks, label_chunks};
use vx_skel::{
    sparsify_skeleton, MaskSkeletonizer, SampleSkeletonizer, Skeletonizer, SparsifyConfig,
};
use vx_ssd::AggregationDataset;
use vx_stitch::{make_unique_labels, stitch_chunks};

#[derive(Parser, Debug)]
#[command(name = "vx_pipeline")]
#[command(about = "Run the voxconn chunk-processing pipeline")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline on a synthetic segmentation volume.
    #[command(name = "run")]
    Run(RunArgs),
    /// Validate the raw per-chunk artifacts of an existing working
    /// directory.
    #[command(name = "validate")]
    Validate(ValidateArgs),
    /// Skeletonize one reduced object and sparsify the result.
    #[command(name = "skeletonize")]
    Skeletonize(SkeletonizeArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Working directory for chunk folders, objects and the aggregation
    /// dataset.
    #[arg(long, required = true)]
    out: PathBuf,
    /// Cube edge length of the synthetic volume, in voxels.
    #[arg(long, default_value_t = 64)]
    size: i64,
    #[arg(long, default_value = "32,32,32")]
    chunk_size: String,
    #[arg(long, default_value = "4,4,4")]
    overlap: String,
    #[arg(long, default_value = "2,2,2")]
    stitch_overlap: String,
    /// Physical voxel size in nanometers.
    #[arg(long, default_value = "10,10,20")]
    scaling: String,
    #[arg(long, default_value_t = 10)]
    dust_threshold: usize,
    /// Skeletonize by mask thinning instead of surface sampling.
    #[arg(long, default_value_t = false)]
    mask_skeletonization: bool,
    /// Run every stage on the calling thread.
    #[arg(long, default_value_t = false)]
    serial: bool,
}

#[derive(Args, Debug, Clone)]
struct ValidateArgs {
    /// Working directory of a previous run.
    #[arg(long, required = true)]
    root: PathBuf,
    #[arg(long, default_value = "seg")]
    filename: String,
    #[arg(long, default_value = "sv")]
    channel: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct SkeletonizeArgs {
    /// Working directory holding `objects/` from a previous run.
    #[arg(long, required = true)]
    root: PathBuf,
    #[arg(long, default_value = "sv")]
    object_type: String,
    #[arg(long, required = true)]
    id: u64,
    #[arg(long, default_value = "10,10,20")]
    scaling: String,
    #[arg(long, default_value_t = 8)]
    sample_step: usize,
    #[arg(long, default_value_t = 10)]
    dust_threshold: u64,
    /// Skeletonize by mask thinning instead of surface sampling.
    #[arg(long, default_value_t = false)]
    mask_skeletonization: bool,
    /// Write the sparsified skeleton here as JSON.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => run(args),
        Command::Validate(args) => validate(args),
        Command::Skeletonize(args) => skeletonize(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    if args.serial {
        run_with(&args, &SerialExecutor)
    } else {
        run_with(&args, &PoolExecutor)
    }
}

fn build_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut src = MapSource::new();
    src.insert("chunks", "chunk_size", &args.chunk_size);
    src.insert("chunks", "overlap", &args.overlap);
    src.insert("chunks", "stitch_overlap", &args.stitch_overlap);
    src.insert("dataset", "scaling", &args.scaling);
    src.insert("skeleton", "dust_threshold", &args.dust_threshold.to_string());
    src.insert(
        "skeleton",
        "mask_skeletonization",
        &args.mask_skeletonization.to_string(),
    );

    let mut config = PipelineConfig::from_source(&src).context("pipeline configuration")?;
    config.channels.push(ChannelConfig {
        name: "sv".to_owned(),
        sigma: Vec3f::default(),
        threshold: 0.5,
        mask_with_membrane: false,
    });
    Ok(config)
}

/// Lattice of solid spheres, one every 16 voxels, radius 5.
fn synthetic_segmentation(size: i64) -> Volume<f32> {
    let shape = [size as usize; 3];
    let mut vol = Volume::new_fill(shape, 0.0f32);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let dx = (x % 16) - 8;
                let dy = (y % 16) - 8;
                let dz = (z % 16) - 8;
                if dx * dx + dy * dy + dz * dz <= 25 {
                    vol.set(x as usize, y as usize, z as usize, 1.0);
                }
            }
        }
    }
    vol
}

fn run_with<E: TaskExecutor>(args: &RunArgs, executor: &E) -> Result<()> {
    if args.size <= 0 {
        bail!("volume size must be positive, got {}", args.size);
    }
    let config = build_config(args)?;

    let mut store = MemoryVolumeStore::new();
    store.insert("sv", synthetic_segmentation(args.size));

    let dataset = ChunkDataset::build(
        &args.out.join("chunks"),
        BoundingBox::new(Vec3i::default(), Vec3i::splat(args.size)),
        config.chunk_size,
        config.overlap,
    )
    .context("chunk grid")?;
    save_json(&args.out.join("chunk_dataset.json"), &dataset)?;

    let labeled = label_chunks(&dataset, &store, &config, "seg", "", executor)
        .context("labeling stage")?;
    if labeled.failed_chunks > 0 {
        bail!("{} chunks failed during labeling", labeled.failed_chunks);
    }

    let label_counts = make_unique_labels(&dataset, "seg", "").context("unique labels")?;
    let stitched = stitch_chunks(&dataset, "seg", "", config.stitch_overlap, executor)
        .context("stitching stage")?;

    let extracted = extract_partials(&dataset, "seg", "", "sv", ObjectType::Sv, &args.out, executor)
        .context("partial extraction")?;
    let reduced = reduce_objects(&args.out, ObjectType::Sv, executor).context("object reduce")?;

    // Contact sites ride the same extraction pipeline under their own
    // artifact name.
    let contact = detect_contact_chunks(
        &dataset,
        "seg",
        "cs_seg",
        "",
        "sv",
        config.contact_window,
        executor,
    )
    .context("contact-site stage")?;
    extract_partials(&dataset, "cs_seg", "", "sv", ObjectType::Cs, &args.out, executor)
        .context("contact-site extraction")?;
    let contact_objects =
        reduce_objects(&args.out, ObjectType::Cs, executor).context("contact-site reduce")?;

    // Demo aggregation: every supervoxel becomes its own entity.
    let sv_ids = list_object_ids(&args.out, ObjectType::Sv)?;
    let mergelist: Vec<(u64, u64)> = sv_ids.iter().map(|&id| (id, id)).collect();
    let mut aggregation =
        AggregationDataset::new(&args.out, ObjectType::Sv, "0", config.scaling);
    aggregation
        .apply_mergelist(&mergelist)
        .context("aggregation mapping")?;
    aggregation.save_dataset_shallow().context("shallow save")?;

    let deep = if config.mask_skeletonization {
        let skeletonizer = MaskSkeletonizer {
            dust_threshold: config.dust_threshold as u64,
        };
        aggregation.save_dataset_deep(&args.out, &skeletonizer, 8, executor)
    } else {
        let skeletonizer = SampleSkeletonizer {
            sample_step: 8,
            dust_threshold: config.dust_threshold as u64,
        };
        aggregation.save_dataset_deep(&args.out, &skeletonizer, 8, executor)
    }
    .context("deep save")?;

    info!(
        chunks = dataset.len(),
        components = label_counts.get("sv").copied().unwrap_or(0),
        merge_pairs = stitched.merge_pairs,
        partials = extracted.partials,
        objects = reduced.objects,
        contact_voxels = contact.contact_voxels,
        contact_sites = contact_objects.objects,
        entities = deep.entities,
        missing_skeletons = deep.missing_skeletons,
        "pipeline finished"
    );
    println!(
        "{} chunks, {} objects, {} entities ({} missing skeletons)",
        dataset.len(),
        reduced.objects,
        deep.entities,
        deep.missing_skeletons
    );
    Ok(())
}

fn validate(args: ValidateArgs) -> Result<()> {
    let dataset: ChunkDataset = load_json(&args.root.join("chunk_dataset.json"))
        .context("chunk dataset manifest")?;

    let summary =
        validate_chunks(&dataset, &args.filename, &args.channel).context("validation")?;
    println!(
        "checked {} chunks: {} missing, {} unreadable, {} all-zero channels",
        summary.checked, summary.missing, summary.unreadable, summary.zero
    );
    if summary.missing + summary.unreadable > 0 {
        bail!("dataset has broken chunks");
    }
    Ok(())
}

fn skeletonize(args: SkeletonizeArgs) -> Result<()> {
    let object_type = parse_object_type(&args.object_type)?;
    let scaling = parse_scaling(&args.scaling)?;
    let record = load_object(&args.root, object_type, args.id)
        .with_context(|| format!("object {} of type {}", args.id, object_type))?;

    let builder: Box<dyn Skeletonizer> = if args.mask_skeletonization {
        Box::new(MaskSkeletonizer {
            dust_threshold: args.dust_threshold,
        })
    } else {
        Box::new(SampleSkeletonizer {
            sample_step: args.sample_step,
            dust_threshold: args.dust_threshold,
        })
    };
    let Some(skeleton) = builder
        .skeletonize(&record.voxels, scaling)
        .context("skeletonization")?
    else {
        bail!(
            "object {} has {} voxels, below the dust threshold {}",
            args.id,
            record.size,
            args.dust_threshold
        );
    };

    let sparse = sparsify_skeleton(&skeleton, &SparsifyConfig::default());
    println!(
        "object {}: {} nodes / {} edges, {} after sparsification",
        args.id,
        skeleton.nodes.len(),
        skeleton.edges.len(),
        sparse.nodes.len()
    );

    if let Some(out) = &args.out {
        save_json(out, &sparse)?;
        info!(path = %out.display(), "wrote sparsified skeleton");
    }
    Ok(())
}

fn parse_object_type(raw: &str) -> Result<ObjectType> {
    Ok(match raw {
        "sv" => ObjectType::Sv,
        "mi" => ObjectType::Mi,
        "vc" => ObjectType::Vc,
        "sj" => ObjectType::Sj,
        "cs" => ObjectType::Cs,
        "syn" => ObjectType::Syn,
        other => bail!("unknown object type {other:?}"),
    })
}

fn parse_scaling(raw: &str) -> Result<Vec3f> {
    let parts: Vec<f32> = raw
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("scaling {raw:?}"))?;
    if parts.len() != 3 {
        bail!("scaling must have three components, got {raw:?}");
    }
    Ok(Vec3f::new(parts[0], parts[1], parts[2]))
}

fn list_object_ids(root: &Path, object_type: ObjectType) -> Result<Vec<u64>> {
    let dir = root.join("objects").join(object_type.as_str());
    let mut ids = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("listing {dir:?}"))? {
        let path = entry?.path();
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            ids.push(
                stem.parse::<u64>()
                    .with_context(|| format!("object file {path:?}"))?,
            );
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

fn save_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path).with_context(|| format!("creating {path:?}"))?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path).with_context(|| format!("opening {path:?}"))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
