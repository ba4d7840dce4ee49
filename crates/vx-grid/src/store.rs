use std::collections::HashMap;

use vx_core::{Error, Vec3i, Volume};

/// Chunked volume store boundary.
///
/// Voxel values must round-trip bit-exactly. Reads may extend outside the
/// stored extent (padded chunk loads at the dataset edge); out-of-extent
/// voxels are zero-filled. Writes must stay inside the extent.
pub trait VolumeStore: Send + Sync {
    /// Probability/intensity channel read.
    fn read(&self, offset: Vec3i, size: Vec3i, channel: &str) -> Result<Volume<f32>, Error>;

    /// Integer label channel read.
    fn read_labels(&self, offset: Vec3i, size: Vec3i, channel: &str) -> Result<Volume<u64>, Error>;

    fn write(&mut self, offset: Vec3i, data: &Volume<f32>, channel: &str) -> Result<(), Error>;

    fn write_labels(&mut self, offset: Vec3i, data: &Volume<u64>, channel: &str)
        -> Result<(), Error>;
}

/// In-memory store backing tests and the demo pipeline. The extent starts
/// at the origin.
#[derive(Debug, Default)]
pub struct MemoryVolumeStore {
    raw: HashMap<String, Volume<f32>>,
    labels: HashMap<String, Volume<u64>>,
}

impl MemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: &str, volume: Volume<f32>) {
        self.raw.insert(channel.to_owned(), volume);
    }

    pub fn insert_labels(&mut self, channel: &str, volume: Volume<u64>) {
        self.labels.insert(channel.to_owned(), volume);
    }

    pub fn label_channel(&self, channel: &str) -> Option<&Volume<u64>> {
        self.labels.get(channel)
    }
}

fn read_padded<T: Copy + Default>(
    src: &Volume<T>,
    offset: Vec3i,
    size: Vec3i,
) -> Result<Volume<T>, Error> {
    if size.x < 0 || size.y < 0 || size.z < 0 {
        return Err(Error::OutOfBounds);
    }

    let shape = size.to_shape();
    let src_shape = src.shape();
    let mut out = Volume::new_fill(shape, T::default());
    for z in 0..shape[2] {
        let sz = offset.z + z as i64;
        if sz < 0 || sz >= src_shape[2] as i64 {
            continue;
        }
        for y in 0..shape[1] {
            let sy = offset.y + y as i64;
            if sy < 0 || sy >= src_shape[1] as i64 {
                continue;
            }
            for x in 0..shape[0] {
                let sx = offset.x + x as i64;
                if sx < 0 || sx >= src_shape[0] as i64 {
                    continue;
                }
                out.set(x, y, z, src.at(sx as usize, sy as usize, sz as usize));
            }
        }
    }
    Ok(out)
}

fn write_inside<T: Copy>(dst: &mut Volume<T>, offset: Vec3i, data: &Volume<T>) -> Result<(), Error> {
    let shape = data.shape();
    let dst_shape = dst.shape();
    if offset.x < 0 || offset.y < 0 || offset.z < 0 {
        return Err(Error::OutOfBounds);
    }
    for d in 0..3 {
        if offset.axis(d) as usize + shape[d] > dst_shape[d] {
            return Err(Error::OutOfBounds);
        }
    }

    for z in 0..shape[2] {
        for y in 0..shape[1] {
            for x in 0..shape[0] {
                dst.set(
                    offset.x as usize + x,
                    offset.y as usize + y,
                    offset.z as usize + z,
                    data.at(x, y, z),
                );
            }
        }
    }
    Ok(())
}

impl VolumeStore for MemoryVolumeStore {
    fn read(&self, offset: Vec3i, size: Vec3i, channel: &str) -> Result<Volume<f32>, Error> {
        let src = self
            .raw
            .get(channel)
            .ok_or_else(|| Error::MissingChannel(channel.to_owned()))?;
        read_padded(src, offset, size)
    }

    fn read_labels(&self, offset: Vec3i, size: Vec3i, channel: &str) -> Result<Volume<u64>, Error> {
        let src = self
            .labels
            .get(channel)
            .ok_or_else(|| Error::MissingChannel(channel.to_owned()))?;
        read_padded(src, offset, size)
    }

    fn write(&mut self, offset: Vec3i, data: &Volume<f32>, channel: &str) -> Result<(), Error> {
        let dst = self
            .raw
            .get_mut(channel)
            .ok_or_else(|| Error::MissingChannel(channel.to_owned()))?;
        write_inside(dst, offset, data)
    }

    fn write_labels(
        &mut self,
        offset: Vec3i,
        data: &Volume<u64>,
        channel: &str,
    ) -> Result<(), Error> {
        let dst = self
            .labels
            .get_mut(channel)
            .ok_or_else(|| Error::MissingChannel(channel.to_owned()))?;
        write_inside(dst, offset, data)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryVolumeStore, VolumeStore};
    use vx_core::{Error, Vec3i, Volume};

    #[test]
    fn labels_round_trip_bit_exact() {
        let mut store = MemoryVolumeStore::new();
        store.insert_labels("sv", Volume::new_fill([8, 8, 8], 0u64));

        let mut block = Volume::new_fill([4, 4, 4], 0u64);
        block.set(1, 2, 3, u64::MAX - 7);
        store
            .write_labels(Vec3i::new(2, 2, 2), &block, "sv")
            .expect("write in extent");

        let back = store
            .read_labels(Vec3i::new(2, 2, 2), Vec3i::splat(4), "sv")
            .expect("read back");
        assert_eq!(back, block);
    }

    #[test]
    fn padded_read_zero_fills_outside_extent() {
        let mut store = MemoryVolumeStore::new();
        store.insert("prob", Volume::new_fill([4, 4, 4], 1.5f32));

        let padded = store
            .read(Vec3i::splat(-2), Vec3i::splat(8), "prob")
            .expect("padded read");
        assert_eq!(padded.shape(), [8, 8, 8]);
        assert_eq!(padded.at(0, 0, 0), 0.0);
        assert_eq!(padded.at(2, 2, 2), 1.5);
        assert_eq!(padded.at(6, 3, 3), 0.0);
    }

    #[test]
    fn missing_channel_is_reported() {
        let store = MemoryVolumeStore::new();
        let err = store
            .read(Vec3i::default(), Vec3i::splat(2), "nope")
            .unwrap_err();
        assert_eq!(err, Error::MissingChannel("nope".to_owned()));
    }

    #[test]
    fn write_outside_extent_is_rejected() {
        let mut store = MemoryVolumeStore::new();
        store.insert_labels("sv", Volume::new_fill([4, 4, 4], 0u64));
        let block = Volume::new_fill([4, 4, 4], 1u64);
        let err = store
            .write_labels(Vec3i::new(1, 0, 0), &block, "sv")
            .unwrap_err();
        assert_eq!(err, Error::OutOfBounds);
    }
}
