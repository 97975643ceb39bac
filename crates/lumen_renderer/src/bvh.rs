//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree over shared primitives. Construction splits the primitive
//! list by index at its midpoint, without any spatial sort or axis choice:
//! traversal cost depends on how spatially coherent the input order is, but
//! the returned hits do not.

use crate::hittable::{closest, HitRecord, Hittable, SharedHittable};
use crate::{Ray, RenderError, RenderResult};
use lumen_math::{Aabb, Interval};

/// BVH node - either a branch with two children or a leaf with one or two
/// primitives.
pub enum BvhNode {
    /// Internal node exclusively owning two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf node referring to one or two primitives of the scene.
    Leaf {
        objects: Vec<SharedHittable>,
        bbox: Aabb,
    },
}

impl BvhNode {
    /// Create a BVH over `objects`, preserving their order in the leaves.
    pub fn new(objects: &[SharedHittable]) -> RenderResult<Self> {
        if objects.is_empty() {
            return Err(RenderError::EmptyBvh);
        }

        let bvh = Self::build(objects);
        log::info!(
            "BVH built: {} primitives, {} nodes ({} leaves), depth {}",
            objects.len(),
            bvh.node_count(),
            bvh.leaf_count(),
            bvh.depth()
        );
        Ok(bvh)
    }

    /// Recursive BVH construction.
    fn build(objects: &[SharedHittable]) -> Self {
        if objects.len() <= 2 {
            let bbox = objects
                .iter()
                .fold(Aabb::EMPTY, |acc, o| Aabb::surrounding(&acc, &o.bounding_box()));
            return BvhNode::Leaf {
                objects: objects.to_vec(),
                bbox,
            };
        }

        // Split at midpoint
        let (left_objects, right_objects) = objects.split_at(objects.len() / 2);
        let left = Self::build(left_objects);
        let right = Self::build(right_objects);
        let bbox = Aabb::surrounding(&left.bounding_box(), &right.bounding_box());

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox,
        }
    }

    /// Children of a branch node, `None` for leaves.
    pub fn children(&self) -> Option<(&BvhNode, &BvhNode)> {
        match self {
            BvhNode::Branch { left, right, .. } => Some((left, right)),
            BvhNode::Leaf { .. } => None,
        }
    }

    /// Total number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        match self {
            BvhNode::Branch { left, right, .. } => 1 + left.node_count() + right.node_count(),
            BvhNode::Leaf { .. } => 1,
        }
    }

    /// Number of leaf nodes in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            BvhNode::Branch { left, right, .. } => left.leaf_count() + right.leaf_count(),
            BvhNode::Leaf { .. } => 1,
        }
    }

    /// Number of levels, a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
            BvhNode::Leaf { .. } => 1,
        }
    }
}

impl Hittable for BvhNode {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        if !self.bounding_box().hit(ray, ray_t) {
            return None;
        }

        match self {
            BvhNode::Leaf { objects, .. } => objects
                .iter()
                .fold(None, |best, obj| closest(best, obj.hit(ray, ray_t))),

            // Both children are always visited; the nearer hit wins
            BvhNode::Branch { left, right, .. } => {
                closest(left.hit(ray, ray_t), right.hit(ray, ray_t))
            }
        }
    }

    fn bounding_box(&self) -> Aabb {
        match self {
            BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Branch { bbox, .. } => *bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Diffuse, Material, Sphere};
    use lumen_math::Vec3;
    use std::sync::Arc;

    fn sphere_row(count: usize) -> Vec<SharedHittable> {
        let material: Arc<dyn Material> = Arc::new(Diffuse::new(Vec3::splat(0.5)));
        (0..count)
            .map(|i| {
                Arc::new(Sphere::new(Vec3::new(i as f32, 0.0, -5.0), 0.5, material.clone()))
                    as SharedHittable
            })
            .collect()
    }

    fn assert_boxes_are_unions(node: &BvhNode) {
        if let Some((left, right)) = node.children() {
            let union = Aabb::surrounding(&left.bounding_box(), &right.bounding_box());
            assert_eq!(node.bounding_box(), union);
            assert_boxes_are_unions(left);
            assert_boxes_are_unions(right);
        }
    }

    #[test]
    fn test_bvh_empty() {
        assert!(matches!(BvhNode::new(&[]), Err(RenderError::EmptyBvh)));
    }

    #[test]
    fn test_bvh_single_sphere() {
        let bvh = BvhNode::new(&sphere_row(1)).unwrap();

        // Should create a leaf
        assert!(matches!(bvh, BvhNode::Leaf { .. }));

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let rec = bvh.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();
        assert!((rec.t - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_bvh_two_spheres_is_one_leaf() {
        let bvh = BvhNode::new(&sphere_row(2)).unwrap();
        assert_eq!(bvh.node_count(), 1);
        assert_eq!(bvh.leaf_count(), 1);
        assert_eq!(bvh.depth(), 1);
    }

    #[test]
    fn test_bvh_shape() {
        // 5 -> (2 | 3) -> (2 | (1 | 2))
        let bvh = BvhNode::new(&sphere_row(5)).unwrap();
        assert_eq!(bvh.leaf_count(), 3);
        assert_eq!(bvh.node_count(), 5);
        assert_eq!(bvh.depth(), 3);
    }

    #[test]
    fn test_bvh_boxes_are_unions() {
        for n in 1..40 {
            assert_boxes_are_unions(&BvhNode::new(&sphere_row(n)).unwrap());
        }
    }

    #[test]
    fn test_bvh_multiple_spheres() {
        let bvh = BvhNode::new(&sphere_row(10)).unwrap();

        // Test ray that hits sphere at x=5
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        let rec = bvh.hit(&ray, Interval::new(0.001, f32::INFINITY)).unwrap();

        // Hit point should be near z = -4.5 (sphere at z=-5, radius 0.5)
        assert!((rec.p.z - (-4.5)).abs() < 0.01);
        assert!((rec.p.x - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_bvh_prunes_miss() {
        let bvh = BvhNode::new(&sphere_row(10)).unwrap();
        let ray = Ray::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(bvh.hit(&ray, Interval::new(0.0, f32::INFINITY)).is_none());
    }

    #[test]
    fn test_bvh_picks_nearest_across_subtrees() {
        let material: Arc<dyn Material> = Arc::new(Diffuse::new(Vec3::ONE));
        // Far sphere first in the list so it lands in the left subtree
        let objects: Vec<SharedHittable> = vec![
            Arc::new(Sphere::new(Vec3::new(0.0, 0.0, -20.0), 1.0, material.clone())),
            Arc::new(Sphere::new(Vec3::new(30.0, 0.0, 0.0), 1.0, material.clone())),
            Arc::new(Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, material.clone())),
            Arc::new(Sphere::new(Vec3::new(-30.0, 0.0, 0.0), 1.0, material)),
        ];
        let bvh = BvhNode::new(&objects).unwrap();

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let rec = bvh.hit(&ray, Interval::new(0.0, f32::INFINITY)).unwrap();
        assert!((rec.t - 4.0).abs() < 1e-4);
    }
}
