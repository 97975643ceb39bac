use crate::{Interval, Ray, Vec3};

/// Smallest extent a box built from points is padded to on each axis.
const MIN_EXTENT: f32 = 0.0001;

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// Defined by its min and max corners. Boxes built through [`Aabb::from_points`]
/// or [`Aabb::surrounding`] always satisfy `min <= max` on every axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create an AABB from two corner points, in any order.
    ///
    /// Flat boxes (e.g. for axis-aligned planes) are padded so the slab test
    /// never sees a zero-width slab.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut aabb = Self {
            min: a.min(b),
            max: a.max(b),
        };
        aabb.pad_to_minimums();
        aabb
    }

    /// Create an AABB that surrounds two other AABBs.
    ///
    /// Component-wise min of the mins and max of the maxes, no padding.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// Parametric range over which `r` is inside the box, clipped to `ray_t`.
    ///
    /// Slab method: for each axis the entry and exit distances of the two
    /// bounding planes are computed (swapped when the ray travels towards
    /// -axis) and the three per-axis ranges are intersected. Returns `None`
    /// when the combined range is empty. Tangent rays count as hits.
    pub fn slab(&self, r: &Ray, ray_t: Interval) -> Option<Interval> {
        let mut range = ray_t;

        for axis in 0..3 {
            let adinv = 1.0 / r.direction[axis];
            let mut t0 = (self.min[axis] - r.origin[axis]) * adinv;
            let mut t1 = (self.max[axis] - r.origin[axis]) * adinv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            range = range.intersect(&Interval::new(t0, t1));
            if range.is_empty() {
                return None;
            }
        }

        Some(range)
    }

    /// Test if a ray intersects this AABB within the given interval.
    #[inline]
    pub fn hit(&self, r: &Ray, ray_t: Interval) -> bool {
        self.slab(r, ray_t).is_some()
    }

    /// Pad intervals to avoid zero-width AABBs (degenerate cases).
    fn pad_to_minimums(&mut self) {
        for axis in 0..3 {
            if self.max[axis] - self.min[axis] < MIN_EXTENT {
                self.min[axis] -= MIN_EXTENT / 2.0;
                self.max[axis] += MIN_EXTENT / 2.0;
            }
        }
    }

    /// Box containing nothing; the identity of [`Aabb::surrounding`].
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };
}
