//! Hittable trait and HitRecord for ray-object intersection.

use crate::{Material, Ray};
use lumen_math::{Aabb, Interval, Vec3};
use std::fmt;
use std::sync::Arc;

/// Record of a ray-object intersection.
///
/// The material is borrowed from the primitive that was hit, so the record
/// cannot outlive the scene.
#[derive(Clone, Copy)]
pub struct HitRecord<'a> {
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Point of intersection
    pub p: Vec3,
    /// Unit surface normal at intersection (always points against ray)
    pub normal: Vec3,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    /// Material at the intersection point
    pub material: &'a dyn Material,
}

impl<'a> HitRecord<'a> {
    /// Build a record from the outward normal at the hit point.
    ///
    /// The normal is always stored pointing against the ray direction,
    /// so we need to track whether we hit the front or back face.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3, material: &'a dyn Material) -> Self {
        let front_face = ray.direction().dot(outward_normal) < 0.0;
        let normal = if front_face {
            outward_normal
        } else {
            -outward_normal
        };

        Self {
            t,
            p: ray.at(t),
            normal,
            front_face,
            material,
        }
    }

    /// True if the record carries the very same material instance.
    pub fn same_material(&self, material: &dyn Material) -> bool {
        std::ptr::addr_eq(self.material, material)
    }

    /// Address of the material, usable as an identity.
    pub fn material_id(&self) -> *const () {
        std::ptr::from_ref(self.material).cast::<()>()
    }
}

impl fmt::Debug for HitRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HitRecord")
            .field("t", &self.t)
            .field("p", &self.p)
            .field("normal", &self.normal)
            .field("front_face", &self.front_face)
            .field("material", &self.material_id())
            .finish()
    }
}

/// Keep the nearer of two optional hits.
///
/// A missing hit is farther than any real hit. On equal distances the first
/// argument wins.
#[inline]
pub fn closest<'a>(first: Option<HitRecord<'a>>, second: Option<HitRecord<'a>>) -> Option<HitRecord<'a>> {
    match (first, second) {
        (Some(a), Some(b)) => Some(if b.t < a.t { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Trait for objects that can be hit by rays.
pub trait Hittable: Send + Sync {
    /// Nearest intersection of `ray` with this object with `t` inside the
    /// closed range `ray_t`, if any.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>>;

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;
}

/// Primitives are shared between the scene list and the BVH leaves.
pub type SharedHittable = Arc<dyn Hittable>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Diffuse;

    #[test]
    fn test_face_normal_against_ray() {
        let material = Diffuse::new(Vec3::ONE);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        let front = HitRecord::new(&ray, 1.0, Vec3::Z, &material);
        assert!(front.front_face);
        assert_eq!(front.normal, Vec3::Z);

        let back = HitRecord::new(&ray, 1.0, -Vec3::Z, &material);
        assert!(!back.front_face);
        assert_eq!(back.normal, Vec3::Z);
        assert_eq!(back.p, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_closest() {
        let material = Diffuse::new(Vec3::ONE);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let near = HitRecord::new(&ray, 1.0, -Vec3::X, &material);
        let far = HitRecord::new(&ray, 2.0, -Vec3::X, &material);

        assert_eq!(closest(Some(far), Some(near)).unwrap().t, 1.0);
        assert_eq!(closest(Some(near), Some(far)).unwrap().t, 1.0);
        assert_eq!(closest(None, Some(far)).unwrap().t, 2.0);
        assert_eq!(closest(Some(far), None).unwrap().t, 2.0);
        assert!(closest(None, None).is_none());
    }

    #[test]
    fn test_closest_tie_keeps_first() {
        let first_material = Diffuse::new(Vec3::ONE);
        let second_material = Diffuse::new(Vec3::ZERO);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let a = HitRecord::new(&ray, 1.0, -Vec3::X, &first_material);
        let b = HitRecord::new(&ray, 1.0, -Vec3::X, &second_material);

        let kept = closest(Some(a), Some(b)).unwrap();
        assert!(kept.same_material(&first_material));
        assert!(!kept.same_material(&second_material));
    }
}
