//! Sphere primitive for ray tracing.

use crate::{
    hittable::{HitRecord, Hittable},
    Material, Ray,
};
use lumen_math::{Aabb, Interval, Vec3};
use std::sync::Arc;

/// A sphere primitive.
///
/// Materials are reference counted so several spheres can share one.
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f32, material: Arc<dyn Material>) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            material,
            bbox,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn material(&self) -> &dyn Material {
        self.material.as_ref()
    }
}

impl Hittable for Sphere {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 || a == 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !ray_t.contains(root) {
            root = (h + sqrtd) / a;
            if !ray_t.contains(root) {
                return None;
            }
        }

        let outward_normal = if self.radius > 0.0 {
            (ray.at(root) - self.center) / self.radius
        } else {
            -ray.direction().normalize()
        };

        Some(HitRecord::new(ray, root, outward_normal, self.material.as_ref()))
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Diffuse;

    fn grey_sphere(center: Vec3, radius: f32) -> Sphere {
        Sphere::new(center, radius, Arc::new(Diffuse::new(Vec3::splat(0.5))))
    }

    #[test]
    fn test_sphere_hit() {
        let sphere = grey_sphere(Vec3::new(0.0, 0.0, -1.0), 0.5);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        let rec = sphere.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();
        assert!((rec.t - 0.5).abs() < 0.001); // Should hit at t=0.5
        assert!((rec.normal - Vec3::Z).length() < 1e-5);
        assert!(rec.front_face);
        assert!(rec.same_material(sphere.material()));
    }

    #[test]
    fn test_sphere_miss() {
        let sphere = grey_sphere(Vec3::new(0.0, 0.0, -1.0), 0.5);

        // Ray pointing away from sphere
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0));
        assert!(sphere.hit(&ray, Interval::new(0.001, f32::INFINITY)).is_none());
    }

    #[test]
    fn test_sphere_hit_from_inside_uses_far_root() {
        let sphere = grey_sphere(Vec3::ZERO, 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        let rec = sphere.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();
        assert!((rec.t - 1.0).abs() < 1e-5);
        assert!(!rec.front_face);
        // Normal faces back towards the ray origin
        assert!((rec.normal + Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_sphere_respects_max_distance() {
        let sphere = grey_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert!(sphere.hit(&ray, Interval::new(0.0, 5.0)).is_none());
    }

    #[test]
    fn test_sphere_bounding_box() {
        let sphere = grey_sphere(Vec3::new(1.0, 2.0, 3.0), 2.0);
        let bbox = sphere.bounding_box();
        assert_eq!(bbox.min, Vec3::new(-1.0, 0.0, 1.0));
        assert_eq!(bbox.max, Vec3::new(3.0, 4.0, 5.0));
    }
}
