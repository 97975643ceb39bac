//! Scene registry: the ordered primitive list plus an optional BVH.

use crate::bvh::BvhNode;
use crate::hittable::{closest, HitRecord, Hittable, SharedHittable};
use crate::{Ray, RenderResult};
use lumen_math::{Aabb, Interval};

/// Ordered collection of primitives.
///
/// Queries go through the BVH once [`Scene::build_index`] has run, otherwise
/// every primitive is tested. Both paths return the same nearest hit. Any
/// structural change drops the index; it is never updated incrementally.
#[derive(Default)]
pub struct Scene {
    objects: Vec<SharedHittable>,
    index: Option<BvhNode>,
    index_enabled: bool,
}

impl Scene {
    /// Create a new empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a primitive at the end of the list.
    pub fn add(&mut self, object: SharedHittable) {
        self.invalidate_index();
        self.objects.push(object);
    }

    /// Remove every primitive.
    pub fn clear(&mut self) {
        self.invalidate_index();
        self.objects.clear();
    }

    /// Get the number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[SharedHittable] {
        &self.objects
    }

    /// Build the BVH over the current primitives and route queries through it.
    pub fn build_index(&mut self) -> RenderResult<()> {
        self.index = Some(BvhNode::new(&self.objects)?);
        self.index_enabled = true;
        Ok(())
    }

    /// Go back to brute-force queries. A built index is kept for later reuse.
    pub fn disable_index(&mut self) {
        self.index_enabled = false;
    }

    /// True when queries are currently answered by the BVH.
    pub fn has_index(&self) -> bool {
        self.index_enabled && self.index.is_some()
    }

    pub fn index(&self) -> Option<&BvhNode> {
        self.index.as_ref()
    }

    fn invalidate_index(&mut self) {
        if self.index.take().is_some() {
            log::debug!("Scene changed, dropping BVH");
        }
        self.index_enabled = false;
    }

    /// Nearest hit of `ray` with `t` in `[t_min, t_max]`.
    pub fn raycast(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<HitRecord<'_>> {
        self.hit(ray, Interval::new(t_min, t_max))
    }

    fn linear_hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        self.objects
            .iter()
            .fold(None, |best, object| closest(best, object.hit(ray, ray_t)))
    }
}

impl Hittable for Scene {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        match &self.index {
            Some(bvh) if self.index_enabled => bvh.hit(ray, ray_t),
            _ => self.linear_hit(ray, ray_t),
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.objects
            .iter()
            .fold(Aabb::EMPTY, |acc, o| Aabb::surrounding(&acc, &o.bounding_box()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Diffuse, Material, RenderError, Sphere};
    use lumen_math::Vec3;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn sphere(center: Vec3, radius: f32, material: &Arc<dyn Material>) -> SharedHittable {
        Arc::new(Sphere::new(center, radius, material.clone()))
    }

    fn two_sphere_scene() -> (Scene, Arc<dyn Material>, Arc<dyn Material>) {
        let first: Arc<dyn Material> = Arc::new(Diffuse::new(Vec3::new(0.8, 0.3, 0.4)));
        let second: Arc<dyn Material> = Arc::new(Diffuse::new(Vec3::new(0.8, 0.6, 0.2)));
        let mut scene = Scene::new();
        scene.add(sphere(Vec3::new(-2.0, 0.0, -5.0), 1.0, &first));
        scene.add(sphere(Vec3::new(2.0, 0.0, -5.0), 1.0, &second));
        (scene, first, second)
    }

    #[test]
    fn test_empty_scene() {
        let mut scene = Scene::new();
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(scene.raycast(&ray, 0.0, f32::INFINITY).is_none());
        assert!(matches!(scene.build_index(), Err(RenderError::EmptyBvh)));
        assert!(!scene.has_index());
    }

    #[test]
    fn test_second_sphere_material() {
        let (mut scene, first, second) = two_sphere_scene();
        let ray = Ray::new(Vec3::ZERO, Vec3::new(2.0, 0.0, -5.0));

        for use_index in [false, true] {
            if use_index {
                scene.build_index().unwrap();
            }
            let rec = scene.raycast(&ray, 0.0, f32::INFINITY).unwrap();
            assert!(rec.same_material(second.as_ref()));
            assert!(!rec.same_material(first.as_ref()));
        }
    }

    #[test]
    fn test_add_invalidates_index() {
        let (mut scene, first, _) = two_sphere_scene();
        scene.build_index().unwrap();
        assert!(scene.has_index());

        scene.add(sphere(Vec3::new(0.0, 0.0, -3.0), 0.5, &first));
        assert!(!scene.has_index());
        assert!(scene.index().is_none());

        // The new sphere is still found through the linear path
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let rec = scene.raycast(&ray, 0.0, f32::INFINITY).unwrap();
        assert!((rec.t - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_clear() {
        let (mut scene, _, _) = two_sphere_scene();
        scene.build_index().unwrap();
        scene.clear();
        assert!(scene.is_empty());
        assert!(!scene.has_index());
    }

    #[test]
    fn test_disable_index() {
        let (mut scene, _, _) = two_sphere_scene();
        scene.build_index().unwrap();
        scene.disable_index();
        assert!(!scene.has_index());
        assert!(scene.index().is_some());
    }

    #[test]
    fn test_raycast_range() {
        let (scene, _, _) = two_sphere_scene();
        let ray = Ray::new(Vec3::ZERO, Vec3::new(2.0, 0.0, -5.0).normalize());
        assert!(scene.raycast(&ray, 0.0, 1.0).is_none());
        assert!(scene.raycast(&ray, 0.0, 10.0).is_some());
    }

    fn arb_vec3(range: f32) -> impl Strategy<Value = Vec3> {
        (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    proptest! {
        /// The BVH and the linear scan agree on the nearest hit.
        #[test]
        fn bvh_matches_linear_scan(
            spheres in prop::collection::vec((arb_vec3(10.0), 0.1f32..2.0), 1..48),
            origin in arb_vec3(15.0),
            direction in arb_vec3(1.0),
        ) {
            prop_assume!(direction.length() > 1e-3);

            let materials: Vec<Arc<dyn Material>> = (0..spheres.len())
                .map(|i| Arc::new(Diffuse::new(Vec3::splat(i as f32 / 64.0))) as Arc<dyn Material>)
                .collect();

            let mut scene = Scene::new();
            for ((center, radius), material) in spheres.iter().zip(&materials) {
                scene.add(sphere(*center, *radius, material));
            }

            let ray = Ray::new(origin, direction);
            let linear = scene.raycast(&ray, 0.001, f32::INFINITY).map(|h| (h.t, h.p, h.normal, h.material_id()));
            scene.build_index().unwrap();
            let indexed = scene.raycast(&ray, 0.001, f32::INFINITY).map(|h| (h.t, h.p, h.normal, h.material_id()));

            match (linear, indexed) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    prop_assert!((a.0 - b.0).abs() <= 1e-4 * a.0.abs().max(1.0));
                    prop_assert!((a.1 - b.1).length() <= 1e-3);
                    prop_assert!((a.2 - b.2).length() <= 1e-3);
                    prop_assert_eq!(a.3, b.3);
                }
                (a, b) => prop_assert!(false, "linear {:?} vs indexed {:?}", a, b),
            }
        }
    }
}
