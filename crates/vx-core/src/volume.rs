use serde::{Deserialize, Serialize};

use crate::Error;

/// Dense 3D voxel volume with shape `[sx, sy, sz]` and x-fastest layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume<T> {
    shape: [usize; 3],
    data: Vec<T>,
}

impl<T> Volume<T> {
    pub fn from_vec(shape: [usize; 3], data: Vec<T>) -> Result<Self, Error> {
        let expected = shape[0]
            .checked_mul(shape[1])
            .and_then(|v| v.checked_mul(shape[2]))
            .ok_or(Error::ShapeMismatch {
                expected: usize::MAX,
                actual: data.len(),
            })?;

        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.shape[1] + y) * self.shape[0] + x
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        if x >= self.shape[0] || y >= self.shape[1] || z >= self.shape[2] {
            return None;
        }
        self.data.get(self.index(x, y, z))
    }

    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> Option<&mut T> {
        if x >= self.shape[0] || y >= self.shape[1] || z >= self.shape[2] {
            return None;
        }
        let idx = self.index(x, y, z);
        self.data.get_mut(idx)
    }
}

impl<T: Copy> Volume<T> {
    pub fn new_fill(shape: [usize; 3], value: T) -> Self {
        let len = shape[0]
            .checked_mul(shape[1])
            .and_then(|v| v.checked_mul(shape[2]))
            .expect("volume size overflow");
        Self {
            shape,
            data: vec![value; len],
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize, z: usize) -> T {
        debug_assert!(x < self.shape[0] && y < self.shape[1] && z < self.shape[2]);
        self.data[self.index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, v: T) {
        debug_assert!(x < self.shape[0] && y < self.shape[1] && z < self.shape[2]);
        let idx = self.index(x, y, z);
        self.data[idx] = v;
    }

    /// Copies a sub-box `[offset, offset + size)` into a new volume.
    pub fn subvolume(&self, offset: [usize; 3], size: [usize; 3]) -> Result<Volume<T>, Error> {
        for d in 0..3 {
            if offset[d] > self.shape[d] || size[d] > self.shape[d] - offset[d] {
                return Err(Error::OutOfBounds);
            }
        }

        let mut out = Vec::with_capacity(size[0] * size[1] * size[2]);
        for z in 0..size[2] {
            for y in 0..size[1] {
                let base = self.index(offset[0], offset[1] + y, offset[2] + z);
                out.extend_from_slice(&self.data[base..base + size[0]]);
            }
        }

        Volume::from_vec(size, out)
    }

    /// Cuts the band `[start, end)` along one axis, keeping the full extent
    /// of the other two axes.
    pub fn cut_axis(&self, axis: usize, start: usize, end: usize) -> Result<Volume<T>, Error> {
        if axis > 2 || start > end || end > self.shape[axis] {
            return Err(Error::OutOfBounds);
        }

        let mut offset = [0usize; 3];
        let mut size = self.shape;
        offset[axis] = start;
        size[axis] = end - start;
        self.subvolume(offset, size)
    }

    /// Symmetric center crop to `target`. The margin on each side is
    /// `(shape - target) / 2`; shapes smaller than `target` are an error.
    pub fn crop_center(&self, target: [usize; 3]) -> Result<Volume<T>, Error> {
        let mut offset = [0usize; 3];
        for d in 0..3 {
            if target[d] > self.shape[d] {
                return Err(Error::OutOfBounds);
            }
            offset[d] = (self.shape[d] - target[d]) / 2;
        }
        self.subvolume(offset, target)
    }

    pub fn map<U: Copy, F: Fn(T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            shape: self.shape,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Volume;
    use crate::Error;

    fn seq_volume(shape: [usize; 3]) -> Volume<u32> {
        let n = shape[0] * shape[1] * shape[2];
        Volume::from_vec(shape, (0..n as u32).collect()).expect("valid volume")
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Volume::from_vec([2, 2, 2], vec![0u8; 7]).unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn indexing_is_x_fastest() {
        let v = seq_volume([3, 2, 2]);
        assert_eq!(v.at(0, 0, 0), 0);
        assert_eq!(v.at(2, 0, 0), 2);
        assert_eq!(v.at(0, 1, 0), 3);
        assert_eq!(v.at(0, 0, 1), 6);
        assert_eq!(v.get(3, 0, 0), None);
    }

    #[test]
    fn subvolume_copies_expected_box() {
        let v = seq_volume([4, 3, 2]);
        let sub = v.subvolume([1, 1, 0], [2, 2, 2]).expect("valid subvolume");

        assert_eq!(sub.shape(), [2, 2, 2]);
        assert_eq!(sub.at(0, 0, 0), v.at(1, 1, 0));
        assert_eq!(sub.at(1, 1, 1), v.at(2, 2, 1));

        assert_eq!(v.subvolume([3, 0, 0], [2, 1, 1]).unwrap_err(), Error::OutOfBounds);
    }

    #[test]
    fn cut_axis_band() {
        let v = seq_volume([4, 3, 2]);
        let band = v.cut_axis(0, 1, 3).expect("valid band");
        assert_eq!(band.shape(), [2, 3, 2]);
        assert_eq!(band.at(0, 0, 0), v.at(1, 0, 0));
        assert_eq!(band.at(1, 2, 1), v.at(2, 2, 1));
    }

    #[test]
    fn crop_center_removes_symmetric_margin() {
        let v = seq_volume([6, 6, 4]);
        let c = v.crop_center([2, 2, 2]).expect("valid crop");
        assert_eq!(c.shape(), [2, 2, 2]);
        assert_eq!(c.at(0, 0, 0), v.at(2, 2, 1));
    }
}
