use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use vx_core::{BoundingBox, Error, Vec3f, Vec3i};
use vx_exec::{chunkify, TaskExecutor};
use vx_extract::{load_object, ObjectType};
use vx_skel::Skeletonizer;

use crate::entity::AggregatedObject;

fn no_mapping() -> Error {
    Error::Consistency("no mapping information found".to_owned())
}

/// Entity-to-supervoxel mapping with derived lookup structures.
#[derive(Debug, Clone, Default)]
struct Mapping {
    /// Entity ID to sorted member supervoxel IDs.
    dict: BTreeMap<u64, Vec<u64>>,
    /// Supervoxel ID to owning entity.
    reversed: HashMap<u64, u64>,
    /// Dense supervoxel lookup, -1 where a supervoxel maps to nothing.
    id_changer: Vec<i64>,
}

impl Mapping {
    fn from_dict(dict: BTreeMap<u64, Vec<u64>>) -> Result<Self, Error> {
        let mut reversed = HashMap::new();
        let mut max_sv = 0u64;
        for (&entity, svs) in &dict {
            for &sv in svs {
                if let Some(previous) = reversed.insert(sv, entity) {
                    if previous != entity {
                        return Err(Error::Consistency(format!(
                            "supervoxel {sv} mapped to entities {previous} and {entity}"
                        )));
                    }
                }
                max_sv = max_sv.max(sv);
            }
        }

        let mut id_changer = vec![-1i64; (max_sv + 1) as usize];
        for (&sv, &entity) in &reversed {
            id_changer[sv as usize] = entity as i64;
        }

        Ok(Self {
            dict,
            reversed,
            id_changer,
        })
    }
}

/// End-of-stage summary for the deep save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepSaveSummary {
    pub entities: usize,
    pub missing_skeletons: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Clone)]
struct CacheRow {
    id: u64,
    size: u64,
    bounding_box: BoundingBox,
    rep_coord: Vec3i,
}

/// A versioned dataset of aggregated entities.
///
/// The dataset owns a directory `<object type>_<version>/` under the
/// working root with the entity-to-supervoxel mapping, per-entity storage
/// under `so_storage/`, and column-style attribute caches aligned with
/// `ids.json`. Every operation that needs the mapping fails hard when
/// none was applied or loaded.
#[derive(Debug)]
pub struct AggregationDataset {
    root: PathBuf,
    object_type: ObjectType,
    version: String,
    pub scaling: Vec3f,
    mapping: Option<Mapping>,
    version_dict: BTreeMap<String, String>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

impl AggregationDataset {
    pub fn new(root: &Path, object_type: ObjectType, version: &str, scaling: Vec3f) -> Self {
        Self {
            root: root.to_owned(),
            object_type,
            version: version.to_owned(),
            scaling,
            mapping: None,
            version_dict: BTreeMap::new(),
        }
    }

    /// Opens an existing dataset, restoring the mapping and the version
    /// dictionary if they were saved.
    pub fn load(
        root: &Path,
        object_type: ObjectType,
        version: &str,
        scaling: Vec3f,
    ) -> Result<Self, Error> {
        let mut dataset = Self::new(root, object_type, version, scaling);

        let mapping_path = dataset.dataset_dir().join("mapping_dict.json");
        if mapping_path.exists() {
            let dict: BTreeMap<u64, Vec<u64>> = read_json(&mapping_path)?;
            dataset.mapping = Some(Mapping::from_dict(dict)?);
        }
        let version_path = dataset.dataset_dir().join("version_dict.json");
        if version_path.exists() {
            dataset.version_dict = read_json(&version_path)?;
        }
        Ok(dataset)
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.root
            .join(format!("{}_{}", self.object_type.as_str(), self.version))
    }

    pub fn storage_root(&self) -> PathBuf {
        self.dataset_dir().join("so_storage")
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Records the version of a companion dataset this one was built
    /// against.
    pub fn register_version(&mut self, name: &str, version: &str) {
        self.version_dict.insert(name.to_owned(), version.to_owned());
    }

    pub fn version_dict(&self) -> &BTreeMap<String, String> {
        &self.version_dict
    }

    pub fn object(&self, id: u64) -> AggregatedObject {
        AggregatedObject::new(&self.storage_root(), id)
    }

    /// Installs a full entity-to-supervoxel mapping.
    pub fn apply_mapping(&mut self, dict: BTreeMap<u64, Vec<u64>>) -> Result<(), Error> {
        let mut dict = dict;
        for svs in dict.values_mut() {
            svs.sort_unstable();
            svs.dedup();
        }
        self.mapping = Some(Mapping::from_dict(dict)?);
        Ok(())
    }

    /// Installs a mapping from flat `(supervoxel, entity)` assignments.
    pub fn apply_mergelist(&mut self, entries: &[(u64, u64)]) -> Result<(), Error> {
        let mut dict: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for &(sv, entity) in entries {
            dict.entry(entity).or_default().push(sv);
        }
        self.apply_mapping(dict)
    }

    /// Reassigns the members of one entity. The reverse map and the dense
    /// lookup are rebuilt immediately, so they can never go stale against
    /// the forward map.
    pub fn map_entity(&mut self, entity: u64, mut svs: Vec<u64>) -> Result<(), Error> {
        let mut dict = self.mapping()?.dict.clone();
        svs.sort_unstable();
        svs.dedup();

        // Moved supervoxels leave their previous owner.
        for (&other, members) in dict.iter_mut() {
            if other != entity {
                members.retain(|sv| !svs.contains(sv));
            }
        }
        dict.retain(|&other, members| other == entity || !members.is_empty());

        if svs.is_empty() {
            dict.remove(&entity);
        } else {
            dict.insert(entity, svs);
        }
        self.mapping = Some(Mapping::from_dict(dict)?);
        Ok(())
    }

    fn mapping(&self) -> Result<&Mapping, Error> {
        self.mapping.as_ref().ok_or_else(no_mapping)
    }

    pub fn entity_ids(&self) -> Result<Vec<u64>, Error> {
        Ok(self.mapping()?.dict.keys().copied().collect())
    }

    /// Member supervoxels of one entity, sorted ascending.
    pub fn sv_ids_of(&self, entity: u64) -> Result<&[u64], Error> {
        self.mapping()?
            .dict
            .get(&entity)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Consistency(format!("unknown entity {entity}")))
    }

    /// Owning entity of a supervoxel, `None` for unmapped supervoxels.
    pub fn entity_of_sv(&self, sv: u64) -> Result<Option<u64>, Error> {
        let mapping = self.mapping()?;
        match mapping.id_changer.get(sv as usize) {
            Some(&entity) if entity >= 0 => Ok(Some(entity as u64)),
            _ => Ok(None),
        }
    }

    /// Persists the mapping, the dense supervoxel lookup, the entity ID
    /// column and the version dictionary. Per-entity storage is left
    /// untouched.
    pub fn save_dataset_shallow(&self) -> Result<(), Error> {
        let dir = self.dataset_dir();
        fs::create_dir_all(&dir)?;

        if let Some(mapping) = &self.mapping {
            write_json(&dir.join("mapping_dict.json"), &mapping.dict)?;
            let reversed: BTreeMap<u64, u64> =
                mapping.reversed.iter().map(|(&sv, &e)| (sv, e)).collect();
            write_json(&dir.join("mapping_dict_reversed.json"), &reversed)?;
            write_json(&dir.join("id_changer.json"), &mapping.id_changer)?;
            let ids: Vec<u64> = mapping.dict.keys().copied().collect();
            write_json(&dir.join("ids.json"), &ids)?;
        }
        write_json(&dir.join("version_dict.json"), &self.version_dict)?;
        Ok(())
    }

    /// One attribute column, aligned with the `ids.json` column.
    pub fn load_cached_data(&self, attr: &str) -> Result<Vec<Value>, Error> {
        let dir = self.dataset_dir();
        let ids: Vec<u64> = read_json(&dir.join("ids.json"))?;
        let values: Vec<Value> = read_json(&dir.join(format!("{attr}s.json")))?;
        if ids.len() != values.len() {
            return Err(Error::Consistency(format!(
                "attribute cache {attr} has {} rows for {} ids",
                values.len(),
                ids.len()
            )));
        }
        Ok(values)
    }

    /// Aggregates every entity from its member supervoxel records and
    /// persists per-entity attributes, skeletons and the column caches.
    ///
    /// Entities are processed in contiguous ID batches, one task per
    /// batch, so each entity directory has a single writer. Entities
    /// whose voxel count falls under the skeletonizer's dust threshold
    /// are counted as missing skeletons.
    pub fn save_dataset_deep<E, S>(
        &self,
        objects_root: &Path,
        skeletonizer: &S,
        n_batches: usize,
        executor: &E,
    ) -> Result<DeepSaveSummary, Error>
    where
        E: TaskExecutor,
        S: Skeletonizer + Sync,
    {
        let ids = self.entity_ids()?;
        let batches = chunkify(&ids, n_batches.max(1));

        let results = executor.execute(batches, |batch| {
            let mut rows = Vec::with_capacity(batch.len());
            let mut missing = 0usize;

            for id in batch {
                let svs = self.sv_ids_of(id)?;
                let mut voxels: Vec<Vec3i> = Vec::new();
                let mut bounding_box: Option<BoundingBox> = None;
                let mut size = 0u64;
                let mut rep_coord = Vec3i::default();
                let mut largest = 0u64;

                for &sv in svs {
                    let record = load_object(objects_root, ObjectType::Sv, sv)?;
                    size += record.size;
                    bounding_box = Some(match bounding_box {
                        None => record.bounding_box,
                        Some(bb) => bb.union(&record.bounding_box),
                    });
                    if record.size > largest {
                        largest = record.size;
                        rep_coord = record.rep_coord;
                    }
                    voxels.extend(record.voxels);
                }

                let bounding_box = bounding_box
                    .unwrap_or_else(|| BoundingBox::new(Vec3i::default(), Vec3i::default()));

                let mut object = self.object(id);
                object.set_attr("size", json!(size))?;
                object.set_attr("rep_coord", serde_json::to_value(rep_coord)?)?;
                object.set_attr("bounding_box", serde_json::to_value(bounding_box)?)?;
                object.set_attr("sv_ids", serde_json::to_value(svs)?)?;
                object.save_attr_dict()?;

                match skeletonizer.skeletonize(&voxels, self.scaling)? {
                    Some(skeleton) if !skeleton.is_empty() => object.save_skeleton(&skeleton)?,
                    _ => missing += 1,
                }

                rows.push(CacheRow {
                    id,
                    size,
                    bounding_box,
                    rep_coord,
                });
            }
            Ok((rows, missing))
        });

        let mut summary = DeepSaveSummary {
            entities: ids.len(),
            ..Default::default()
        };
        let mut rows: Vec<CacheRow> = Vec::with_capacity(ids.len());
        for result in results {
            match result {
                Ok((batch_rows, missing)) => {
                    rows.extend(batch_rows);
                    summary.missing_skeletons += missing;
                }
                Err(failure) => {
                    warn!(task = failure.task_index, error = %failure.message, "entity batch failed");
                    summary.failed_batches += 1;
                }
            }
        }
        rows.sort_unstable_by_key(|r| r.id);

        let dir = self.dataset_dir();
        fs::create_dir_all(&dir)?;
        write_json(
            &dir.join("ids.json"),
            &rows.iter().map(|r| r.id).collect::<Vec<_>>(),
        )?;
        write_json(
            &dir.join("sizes.json"),
            &rows.iter().map(|r| r.size).collect::<Vec<_>>(),
        )?;
        write_json(
            &dir.join("rep_coords.json"),
            &rows.iter().map(|r| r.rep_coord).collect::<Vec<_>>(),
        )?;
        write_json(
            &dir.join("bounding_boxs.json"),
            &rows.iter().map(|r| r.bounding_box).collect::<Vec<_>>(),
        )?;

        info!(
            entities = summary.entities,
            missing_skeletons = summary.missing_skeletons,
            failed = summary.failed_batches,
            "{} missing skeletons after deep save",
            summary.missing_skeletons
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::AggregationDataset;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::io::BufWriter;
    use vx_core::{BoundingBox, Vec3f, Vec3i};
    use vx_exec::SerialExecutor;
    use vx_extract::{object_path, ObjectRecord, ObjectType};
    use vx_skel::{MaskSkeletonizer, SampleSkeletonizer};

    fn scaling() -> Vec3f {
        Vec3f::new(10.0, 10.0, 20.0)
    }

    #[test]
    fn mergelist_builds_an_invertible_mapping() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ds = AggregationDataset::new(dir.path(), ObjectType::Sv, "0", scaling());
        ds.apply_mergelist(&[(1, 10), (3, 20), (2, 10)]).expect("mergelist");

        assert_eq!(ds.entity_ids().expect("ids"), vec![10, 20]);
        assert_eq!(ds.sv_ids_of(10).expect("svs"), &[1, 2]);
        for &(sv, entity) in &[(1u64, 10u64), (2, 10), (3, 20)] {
            assert_eq!(ds.entity_of_sv(sv).expect("lookup"), Some(entity));
        }
        assert_eq!(ds.entity_of_sv(0).expect("lookup"), None);
        assert_eq!(ds.entity_of_sv(999).expect("lookup"), None);
    }

    #[test]
    fn remapping_an_entity_keeps_the_reverse_map_coherent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ds = AggregationDataset::new(dir.path(), ObjectType::Sv, "0", scaling());
        ds.apply_mergelist(&[(1, 10), (2, 10), (3, 20)]).expect("mergelist");

        // Supervoxel 2 moves from entity 10 to entity 20.
        ds.map_entity(20, vec![2, 3]).expect("remap");
        assert_eq!(ds.sv_ids_of(10).expect("svs"), &[1]);
        assert_eq!(ds.sv_ids_of(20).expect("svs"), &[2, 3]);
        assert_eq!(ds.entity_of_sv(2).expect("lookup"), Some(20));

        ds.map_entity(10, Vec::new()).expect("drop");
        assert_eq!(ds.entity_ids().expect("ids"), vec![20]);
        assert_eq!(ds.entity_of_sv(1).expect("lookup"), None);
    }

    #[test]
    fn conflicting_mergelist_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ds = AggregationDataset::new(dir.path(), ObjectType::Sv, "0", scaling());
        assert!(ds.apply_mergelist(&[(1, 10), (1, 20)]).is_err());
    }

    #[test]
    fn missing_mapping_is_a_hard_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ds = AggregationDataset::new(dir.path(), ObjectType::Sv, "0", scaling());
        let err = ds.entity_ids().unwrap_err();
        assert!(err.to_string().contains("no mapping information"));
    }

    #[test]
    fn shallow_save_round_trips_mapping_and_versions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ds = AggregationDataset::new(dir.path(), ObjectType::Sv, "0", scaling());
        ds.apply_mergelist(&[(1, 10), (2, 10)]).expect("mergelist");
        ds.register_version("mi", "3");
        ds.save_dataset_shallow().expect("save");

        let back =
            AggregationDataset::load(dir.path(), ObjectType::Sv, "0", scaling()).expect("load");
        assert_eq!(back.entity_ids().expect("ids"), vec![10]);
        assert_eq!(back.sv_ids_of(10).expect("svs"), &[1, 2]);
        assert_eq!(back.entity_of_sv(2).expect("lookup"), Some(10));
        assert_eq!(back.version_dict().get("mi"), Some(&"3".to_owned()));
    }

    fn write_sv_record(root: &std::path::Path, id: u64, voxels: Vec<Vec3i>) {
        let mut bb = BoundingBox::of_voxel(voxels[0]);
        for &v in &voxels[1..] {
            bb.extend_voxel(v);
        }
        let record = ObjectRecord {
            id,
            object_type: ObjectType::Sv,
            size: voxels.len() as u64,
            rep_coord: voxels[voxels.len() / 2],
            voxels,
            bounding_box: bb,
        };
        let path = object_path(root, ObjectType::Sv, id);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let file = std::fs::File::create(path).expect("create");
        serde_json::to_writer(BufWriter::new(file), &record).expect("write");
    }

    #[test]
    fn deep_save_aggregates_attributes_and_skeletons() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        // Entity 10 = svs {1, 2} forming one rod; entity 20 is empty.
        write_sv_record(root, 1, (0..8).map(|x| Vec3i::new(x, 0, 0)).collect());
        write_sv_record(root, 2, (8..16).map(|x| Vec3i::new(x, 0, 0)).collect());

        let mut ds = AggregationDataset::new(root, ObjectType::Sv, "0", scaling());
        let mut dict = BTreeMap::new();
        dict.insert(10u64, vec![1u64, 2]);
        dict.insert(20u64, Vec::new());
        ds.apply_mapping(dict).expect("mapping");

        let skeletonizer = SampleSkeletonizer {
            sample_step: 4,
            dust_threshold: 1,
        };
        let summary = ds
            .save_dataset_deep(root, &skeletonizer, 2, &SerialExecutor)
            .expect("deep save");
        assert_eq!(summary.entities, 2);
        assert_eq!(summary.failed_batches, 0);
        // The empty entity has no voxels, hence no skeleton.
        assert_eq!(summary.missing_skeletons, 1);

        let mut entity = ds.object(10);
        assert_eq!(entity.attr("size").expect("attr"), Some(json!(16)));
        let skeleton = entity.load_skeleton().expect("skeleton");
        assert_eq!(skeleton.component_count(), 1);

        let mut empty = ds.object(20);
        assert_eq!(empty.attr("size").expect("attr"), Some(json!(0)));
        assert!(!empty.skeleton_exists());

        let sizes = ds.load_cached_data("size").expect("cache");
        assert_eq!(sizes, vec![json!(16), json!(0)]);
    }

    #[test]
    fn deep_save_accepts_a_mask_based_skeletonizer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        write_sv_record(root, 1, (0..16).map(|x| Vec3i::new(x, 0, 0)).collect());
        let mut ds = AggregationDataset::new(root, ObjectType::Sv, "0", scaling());
        ds.apply_mergelist(&[(1, 10)]).expect("mergelist");

        let skeletonizer = MaskSkeletonizer { dust_threshold: 1 };
        let summary = ds
            .save_dataset_deep(root, &skeletonizer, 1, &SerialExecutor)
            .expect("deep save");
        assert_eq!(summary.missing_skeletons, 0);

        // A one-voxel-wide rod thins to itself, node per voxel.
        let skeleton = ds.object(10).load_skeleton().expect("skeleton");
        assert_eq!(skeleton.nodes.len(), 16);
        assert_eq!(skeleton.component_count(), 1);
    }
}
