use std::fs;
use std::io::Write;
use std::path::Path;

use vx_core::Error;

use crate::artifact::{load_container, stage_path, Stage};
use crate::chunk::ChunkDataset;

/// Per-chunk data-quality marker taxonomy. Markers record problems without
/// aborting sibling chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    /// Channel produced an empty or all-zero result.
    Zero { channel: String },
    /// Expected input existed but could not be read.
    Load,
    /// Expected input is missing entirely.
    Existence,
}

impl MarkerKind {
    fn line(&self) -> String {
        match self {
            Self::Zero { channel } => format!("zero error @ {channel}"),
            Self::Load => "load error".to_owned(),
            Self::Existence => "existence error".to_owned(),
        }
    }
}

/// Appends one marker line to `errors_<filename>.txt` in the chunk folder.
pub fn write_error_marker(folder: &Path, filename: &str, kind: &MarkerKind) -> Result<(), Error> {
    fs::create_dir_all(folder)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(folder.join(format!("errors_{filename}.txt")))?;
    writeln!(file, "{}", kind.line())?;
    Ok(())
}

/// Marker lines recorded for one chunk, empty if no marker file exists.
pub fn read_error_markers(folder: &Path, filename: &str) -> Result<Vec<String>, Error> {
    let path = folder.join(format!("errors_{filename}.txt"));
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    Ok(text.lines().map(str::to_owned).collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub checked: usize,
    pub missing: usize,
    pub unreadable: usize,
    pub zero: usize,
}

/// Validates the raw per-chunk artifacts of a dataset: existence, loadability
/// and a non-zero sum per channel. Problems are recorded as marker files and
/// counted; validation itself never fails on bad chunk data.
pub fn validate_chunks(
    dataset: &ChunkDataset,
    filename: &str,
    channels: &[String],
) -> Result<ValidationSummary, Error> {
    let mut summary = ValidationSummary::default();

    for chunk in dataset.chunks() {
        summary.checked += 1;
        let path = stage_path(&chunk.folder, filename, Stage::Raw, "");

        if !path.exists() {
            write_error_marker(&chunk.folder, filename, &MarkerKind::Existence)?;
            summary.missing += 1;
            continue;
        }

        let container = match load_container(&path) {
            Ok(c) => c,
            Err(_) => {
                write_error_marker(&chunk.folder, filename, &MarkerKind::Load)?;
                summary.unreadable += 1;
                continue;
            }
        };

        for channel in channels {
            let all_zero = match container.get(channel) {
                Ok(vol) => vol.data().iter().all(|&v| v == 0),
                Err(_) => true,
            };
            if all_zero {
                write_error_marker(
                    &chunk.folder,
                    filename,
                    &MarkerKind::Zero {
                        channel: channel.clone(),
                    },
                )?;
                summary.zero += 1;
            }
        }
    }

    Ok(summary)
}
