use core::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Signed voxel coordinate or offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3i {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Vec3i {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    pub fn splat(v: i64) -> Self {
        Self { x: v, y: v, z: v }
    }

    pub fn axis(self, dim: usize) -> i64 {
        match dim {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => panic!("axis index out of range"),
        }
    }

    pub fn with_axis(mut self, dim: usize, v: i64) -> Self {
        match dim {
            0 => self.x = v,
            1 => self.y = v,
            2 => self.z = v,
            _ => panic!("axis index out of range"),
        }
        self
    }

    /// Unit step along one axis, scaled by `v`.
    pub fn unit(dim: usize, v: i64) -> Self {
        Self::default().with_axis(dim, v)
    }

    pub fn to_f(self) -> Vec3f {
        Vec3f {
            x: self.x as f32,
            y: self.y as f32,
            z: self.z as f32,
        }
    }

    /// Shape conversion; negative components are a caller bug.
    pub fn to_shape(self) -> [usize; 3] {
        debug_assert!(self.x >= 0 && self.y >= 0 && self.z >= 0);
        [self.x as usize, self.y as usize, self.z as usize]
    }
}

impl Add for Vec3i {
    type Output = Vec3i;

    fn add(self, rhs: Vec3i) -> Self::Output {
        Vec3i::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3i {
    type Output = Vec3i;

    fn sub(self, rhs: Vec3i) -> Self::Output {
        Vec3i::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<i64> for Vec3i {
    type Output = Vec3i;

    fn mul(self, rhs: i64) -> Self::Output {
        Vec3i::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Physical-space position or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3f {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            Self::default()
        } else {
            self * (1.0 / n)
        }
    }

    pub fn scale(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl Add for Vec3f {
    type Output = Vec3f;

    fn add(self, rhs: Vec3f) -> Self::Output {
        Vec3f::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3f {
    type Output = Vec3f;

    fn sub(self, rhs: Vec3f) -> Self::Output {
        Vec3f::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3f {
    type Output = Vec3f;

    fn mul(self, rhs: f32) -> Self::Output {
        Vec3f::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Half-open axis-aligned box: `min` inclusive, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3i,
    pub max: Vec3i,
}

impl BoundingBox {
    pub fn new(min: Vec3i, max: Vec3i) -> Self {
        Self { min, max }
    }

    /// Smallest box containing a single voxel.
    pub fn of_voxel(v: Vec3i) -> Self {
        Self {
            min: v,
            max: v + Vec3i::splat(1),
        }
    }

    pub fn size(&self) -> Vec3i {
        self.max - self.min
    }

    pub fn volume(&self) -> i64 {
        let s = self.size();
        if s.x <= 0 || s.y <= 0 || s.z <= 0 {
            return 0;
        }
        s.x * s.y * s.z
    }

    pub fn contains(&self, v: Vec3i) -> bool {
        v.x >= self.min.x
            && v.y >= self.min.y
            && v.z >= self.min.z
            && v.x < self.max.x
            && v.y < self.max.y
            && v.z < self.max.z
    }

    pub fn extend_voxel(&mut self, v: Vec3i) {
        self.min.x = self.min.x.min(v.x);
        self.min.y = self.min.y.min(v.y);
        self.min.z = self.min.z.min(v.z);
        self.max.x = self.max.x.max(v.x + 1);
        self.max.y = self.max.y.max(v.y + 1);
        self.max.z = self.max.z.max(v.z + 1);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: Vec3i::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3i::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn center(&self) -> Vec3f {
        (self.min.to_f() + self.max.to_f()) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundingBox, Vec3f, Vec3i};

    #[test]
    fn vec_ops_and_normalize() {
        let a = Vec3f::new(0.0, 3.0, 4.0);
        let b = Vec3f::new(1.0, -1.0, 2.0);

        assert_eq!(a + b, Vec3f::new(1.0, 2.0, 6.0));
        assert_eq!(a - b, Vec3f::new(-1.0, 4.0, 2.0));
        assert!((a.dot(b) - 5.0).abs() < 1e-6);
        assert!((a.norm() - 5.0).abs() < 1e-6);

        let n = a.normalize();
        assert!((n.norm() - 1.0).abs() < 1e-6);

        let z = Vec3f::default().normalize();
        assert_eq!(z, Vec3f::default());
    }

    #[test]
    fn axis_access_and_unit() {
        let v = Vec3i::new(7, -2, 5);
        assert_eq!(v.axis(0), 7);
        assert_eq!(v.axis(2), 5);
        assert_eq!(Vec3i::unit(1, 3), Vec3i::new(0, 3, 0));
        assert_eq!(v.with_axis(1, 9), Vec3i::new(7, 9, 5));
    }

    #[test]
    fn bounding_box_extend_and_union() {
        let mut bb = BoundingBox::of_voxel(Vec3i::new(2, 2, 2));
        bb.extend_voxel(Vec3i::new(5, 1, 2));

        assert_eq!(bb.min, Vec3i::new(2, 1, 2));
        assert_eq!(bb.max, Vec3i::new(6, 3, 3));
        assert!(bb.contains(Vec3i::new(5, 1, 2)));
        assert!(!bb.contains(Vec3i::new(6, 1, 2)));

        let other = BoundingBox::of_voxel(Vec3i::new(0, 0, 10));
        let u = bb.union(&other);
        assert_eq!(u.min, Vec3i::new(0, 0, 2));
        assert_eq!(u.max, Vec3i::new(6, 3, 11));
        assert_eq!(u.volume(), 6 * 3 * 9);
    }
}
