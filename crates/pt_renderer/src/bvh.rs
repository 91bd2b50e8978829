//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Nodes live in a flat arena addressed by `u32` handles. Each leaf holds
//! exactly one triangle, which keeps the layout identical to the flattened
//! GPU form.

use pt_core::Triangle;
use pt_math::{Aabb, Interval, Ray};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::intersect::{intersect_triangle, TriangleHit};

/// Handle of a node in the BVH arena.
pub type NodeId = u32;

/// Seed used when the caller does not pick one.
pub const DEFAULT_BVH_SEED: u64 = 0x5eed_b7b7;

/// BVH node - either an interior node with two children or a leaf with one
/// triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BvhNode {
    /// Box is the union of the children's boxes.
    Interior {
        bounds: Aabb,
        left: NodeId,
        right: NodeId,
    },
    /// Box of a single triangle.
    Leaf { bounds: Aabb, triangle: u32 },
}

impl BvhNode {
    pub fn bounds(&self) -> Aabb {
        match self {
            BvhNode::Interior { bounds, .. } | BvhNode::Leaf { bounds, .. } => *bounds,
        }
    }
}

/// Binary BVH over a triangle slice.
///
/// The tree stores triangle indices only; the triangle slice it was built
/// from must be passed back in for traversal.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<NodeId>,
}

impl Bvh {
    /// Build a BVH over `triangles`.
    ///
    /// Each step picks a random split axis, sorts the index range by the
    /// minimum box coordinate along it and splits at the median. The seed
    /// makes builds reproducible. An empty slice yields an empty tree that
    /// every ray misses.
    pub fn build(triangles: &[Triangle], seed: u64) -> Self {
        if triangles.is_empty() {
            return Self::default();
        }

        let boxes: Vec<Aabb> = triangles.iter().map(Triangle::bounds).collect();
        let mut indices: Vec<u32> = (0..triangles.len() as u32).collect();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * triangles.len() - 1),
            root: None,
        };
        let root = bvh.build_range(&boxes, &mut indices, &mut rng);
        bvh.root = Some(root);
        bvh
    }

    /// Recursive construction over one index range. Children are pushed
    /// before their parent, so the root ends up last.
    fn build_range(&mut self, boxes: &[Aabb], indices: &mut [u32], rng: &mut StdRng) -> NodeId {
        if indices.len() == 1 {
            let triangle = indices[0];
            return self.push(BvhNode::Leaf {
                bounds: boxes[triangle as usize],
                triangle,
            });
        }

        let axis = rng.gen_range(0..3);
        indices.sort_unstable_by(|&a, &b| {
            boxes[a as usize].min[axis].total_cmp(&boxes[b as usize].min[axis])
        });

        let mid = indices.len() / 2;
        let (lower, upper) = indices.split_at_mut(mid);
        let left = self.build_range(boxes, lower, rng);
        let right = self.build_range(boxes, upper, rng);

        let bounds = Aabb::surrounding(
            &self.nodes[left as usize].bounds(),
            &self.nodes[right as usize].bounds(),
        );
        self.push(BvhNode::Interior { bounds, left, right })
    }

    fn push(&mut self, node: BvhNode) -> NodeId {
        self.nodes.push(node);
        (self.nodes.len() - 1) as NodeId
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &BvhNode {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Bounds of the whole tree (empty box for an empty tree).
    pub fn bounds(&self) -> Aabb {
        self.root
            .map(|root| self.node(root).bounds())
            .unwrap_or(Aabb::EMPTY)
    }

    /// Number of levels from the root to the deepest leaf.
    pub fn depth(&self) -> usize {
        fn depth_of(bvh: &Bvh, id: NodeId) -> usize {
            match *bvh.node(id) {
                BvhNode::Leaf { .. } => 1,
                BvhNode::Interior { left, right, .. } => 1 + depth_of(bvh, left).max(depth_of(bvh, right)),
            }
        }
        self.root.map_or(0, |root| depth_of(self, root))
    }

    /// Find the closest hit within `ray_t`.
    ///
    /// `accept` sees every candidate hit; returning false discards it and
    /// the search continues past it (used for opacity cutouts).
    pub fn closest_hit<F>(
        &self,
        triangles: &[Triangle],
        ray: &Ray,
        ray_t: Interval,
        accept: &mut F,
    ) -> Option<TriangleHit>
    where
        F: FnMut(&TriangleHit) -> bool,
    {
        let root = self.root?;
        self.hit_node(root, triangles, ray, ray_t, accept)
    }

    fn hit_node<F>(
        &self,
        id: NodeId,
        triangles: &[Triangle],
        ray: &Ray,
        ray_t: Interval,
        accept: &mut F,
    ) -> Option<TriangleHit>
    where
        F: FnMut(&TriangleHit) -> bool,
    {
        match *self.node(id) {
            BvhNode::Leaf { triangle, .. } => {
                let (t, barycentric) = intersect_triangle(&triangles[triangle as usize], ray, ray_t)?;
                let hit = TriangleHit {
                    triangle,
                    t,
                    barycentric,
                };
                accept(&hit).then_some(hit)
            }

            BvhNode::Interior { bounds, left, right } => {
                if !bounds.hit(ray, ray_t) {
                    return None;
                }

                let hit_left = self.hit_node(left, triangles, ray, ray_t, accept);

                // Only check right up to closest hit
                let right_t = hit_left.map_or(ray_t, |h| ray_t.with_max(h.t));
                let hit_right = self.hit_node(right, triangles, ray, right_t, accept);

                hit_right.or(hit_left)
            }
        }
    }
}
