use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use vx_core::{Error, Volume};

/// Sequential pipeline-stage artifacts kept per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Raw per-chunk channel data.
    Raw,
    ConnectedComponents,
    UniqueComponents,
    StitchedComponents,
}

impl Stage {
    fn file_infix(self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::ConnectedComponents => "_connected_components",
            Self::UniqueComponents => "_unique_components",
            Self::StitchedComponents => "_stitched_components",
        }
    }
}

/// Path of a per-chunk stage artifact; `suffix` distinguishes parallel
/// pipeline variants and may be empty.
pub fn stage_path(folder: &Path, filename: &str, stage: Stage, suffix: &str) -> PathBuf {
    folder.join(format!("{filename}{}{suffix}.json", stage.file_infix()))
}

/// Named label channels of one chunk at one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChannelContainer {
    channels: BTreeMap<String, Volume<u64>>,
}

impl ChannelContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: &str, volume: Volume<u64>) {
        self.channels.insert(channel.to_owned(), volume);
    }

    pub fn get(&self, channel: &str) -> Result<&Volume<u64>, Error> {
        self.channels
            .get(channel)
            .ok_or_else(|| Error::MissingChannel(channel.to_owned()))
    }

    pub fn get_mut(&mut self, channel: &str) -> Result<&mut Volume<u64>, Error> {
        self.channels
            .get_mut(channel)
            .ok_or_else(|| Error::MissingChannel(channel.to_owned()))
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

pub fn save_container(path: &Path, container: &ChannelContainer) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), container)?;
    Ok(())
}

pub fn load_container(path: &Path) -> Result<ChannelContainer, Error> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::{load_container, save_container, stage_path, ChannelContainer, Stage};
    use std::path::Path;
    use vx_core::Volume;

    #[test]
    fn stage_paths_follow_naming_scheme() {
        let folder = Path::new("/data/chunky_3");
        assert_eq!(
            stage_path(folder, "seg", Stage::Raw, ""),
            folder.join("seg.json")
        );
        assert_eq!(
            stage_path(folder, "seg", Stage::UniqueComponents, "_v2"),
            folder.join("seg_unique_components_v2.json")
        );
    }

    #[test]
    fn container_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chunky_0").join("seg_connected_components.json");

        let mut container = ChannelContainer::new();
        let mut vol = Volume::new_fill([2, 2, 2], 0u64);
        vol.set(1, 1, 1, 42);
        container.insert("sv", vol);

        save_container(&path, &container).expect("save");
        let back = load_container(&path).expect("load");
        assert_eq!(back, container);
        assert_eq!(back.get("sv").expect("channel").at(1, 1, 1), 42);
    }
}
