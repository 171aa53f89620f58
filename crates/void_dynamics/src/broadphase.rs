//! Broadphase: dynamic AABB tree
//!
//! Leaves hold "fat" boxes, enlarged beyond the body's tight bounds so that
//! predictable motion does not force a re-insert every step. Nodes live in a
//! flat array; freed nodes go onto a free list and are recycled, never
//! deallocated. Sibling choice on insert minimizes perimeter growth and
//! AVL-style rotations keep the tree shallow.

use crate::arena::BodyHandle;
use crate::body::RigidBody;
use glam::Vec3;
use std::collections::HashMap;

/// Null node sentinel
pub const NULL_NODE: u32 = u32::MAX;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// An empty box at the origin
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    /// Create from corners
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// World AABB enclosing a body's oriented box
    pub fn from_body(body: &RigidBody) -> Self {
        let center = body.world_center();
        let half = body.half_extents();
        let q = body.orientation;
        let extent = (q * Vec3::X).abs() * half.x
            + (q * Vec3::Y).abs() * half.y
            + (q * Vec3::Z).abs() * half.z;
        Self::new(center - extent, center + extent)
    }

    /// Smallest box containing both
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Overlap test (touching counts)
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Whether `other` lies entirely inside this box
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// Grow uniformly by `margin`
    #[inline]
    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb::new(self.min - Vec3::splat(margin), self.max + Vec3::splat(margin))
    }

    /// Perimeter-style cost metric (sum of edge lengths)
    #[inline]
    pub fn perimeter(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x + d.y + d.z)
    }

    /// Box center
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Padding rules for building a leaf's fat box
#[derive(Debug, Clone, Copy)]
pub struct FatMargin {
    /// Uniform margin added on every side
    pub margin: f32,
    /// Multiplier on the per-axis velocity sweep
    pub velocity_scale: f32,
    /// Sub-step duration the sweep covers
    pub dt: f32,
}

impl FatMargin {
    /// Fat box for a body: tight box + margin + angular padding, swept by
    /// `|v| dt` per axis in both directions.
    pub fn fatten(&self, body: &RigidBody, tight: Aabb) -> Aabb {
        let angular = body.angular_velocity.length() * body.bounding_radius() * self.dt;
        let sweep = (body.velocity * self.dt * self.velocity_scale).abs();
        let padded = tight.expanded(self.margin + angular);
        Aabb::new(padded.min - sweep, padded.max + sweep)
    }
}

/// A node in the dynamic tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Fat box (leaves) or union of children (internal)
    pub aabb: Aabb,
    /// Parent index or [`NULL_NODE`]
    pub parent: u32,
    /// Left child or [`NULL_NODE`]
    pub left: u32,
    /// Right child or [`NULL_NODE`]
    pub right: u32,
    /// Leaf = 0, free = -1
    pub height: i32,
    /// Body stored in a leaf
    pub body: Option<BodyHandle>,
}

impl TreeNode {
    fn free() -> Self {
        Self {
            aabb: Aabb::ZERO,
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: -1,
            body: None,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Dynamic AABB tree keyed by body handle
#[derive(Default)]
pub struct DynamicTree {
    nodes: Vec<TreeNode>,
    free_list: Vec<u32>,
    root: Option<u32>,
    leaves: HashMap<BodyHandle, u32>,
}

impl DynamicTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a body with an already-fattened box
    pub fn insert(&mut self, body: BodyHandle, fat: Aabb) -> u32 {
        if let Some(&existing) = self.leaves.get(&body) {
            self.remove_leaf(existing);
            self.nodes[existing as usize].aabb = fat;
            self.insert_leaf(existing);
            return existing;
        }
        let leaf = self.alloc_node();
        {
            let node = &mut self.nodes[leaf as usize];
            node.aabb = fat;
            node.height = 0;
            node.body = Some(body);
        }
        self.insert_leaf(leaf);
        self.leaves.insert(body, leaf);
        leaf
    }

    /// Remove a body's leaf. Returns false when the body is not in the tree.
    pub fn remove(&mut self, body: BodyHandle) -> bool {
        let Some(leaf) = self.leaves.remove(&body) else {
            return false;
        };
        self.remove_leaf(leaf);
        self.free_node(leaf);
        true
    }

    /// Refit a body's leaf.
    ///
    /// Nothing changes while the stored fat box still contains `tight`;
    /// otherwise the leaf is re-inserted with `fat`. Returns true when the
    /// tree was modified.
    pub fn update(&mut self, body: BodyHandle, tight: Aabb, fat: Aabb) -> bool {
        let Some(&leaf) = self.leaves.get(&body) else {
            self.insert(body, fat);
            return true;
        };
        if self.nodes[leaf as usize].aabb.contains(&tight) {
            return false;
        }
        self.remove_leaf(leaf);
        self.nodes[leaf as usize].aabb = fat;
        self.insert_leaf(leaf);
        true
    }

    /// Whether a body has a leaf
    #[inline]
    pub fn contains(&self, body: BodyHandle) -> bool {
        self.leaves.contains_key(&body)
    }

    /// Fat box stored for a body
    pub fn fat_aabb(&self, body: BodyHandle) -> Option<Aabb> {
        self.leaves
            .get(&body)
            .map(|&leaf| self.nodes[leaf as usize].aabb)
    }

    /// Number of leaves
    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.leaves.len()
    }

    /// Height of the root (0 for a single leaf or an empty tree)
    pub fn height(&self) -> i32 {
        self.root
            .map(|root| self.nodes[root as usize].height)
            .unwrap_or(0)
    }

    /// Visit every body whose fat box overlaps `aabb`
    pub fn query<F: FnMut(BodyHandle)>(&self, aabb: &Aabb, mut callback: F) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = Vec::with_capacity(64);
        stack.push(root);

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id as usize];
            if !node.aabb.intersects(aabb) {
                continue;
            }
            if node.is_leaf() {
                if let Some(body) = node.body {
                    callback(body);
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// All overlapping leaf pairs, each reported once as `(lower, higher)`
    /// handle, sorted.
    pub fn query_pairs(&self) -> Vec<(BodyHandle, BodyHandle)> {
        let mut pairs = Vec::new();
        for (&body, &leaf) in &self.leaves {
            let aabb = self.nodes[leaf as usize].aabb;
            self.query(&aabb, |other| {
                if body < other {
                    pairs.push((body, other));
                }
            });
        }
        pairs.sort_unstable();
        pairs
    }

    /// Check parent links, heights and box containment. Used by tests.
    pub fn validate(&self) -> bool {
        match self.root {
            None => self.leaves.is_empty(),
            Some(root) => {
                self.nodes[root as usize].parent == NULL_NODE && self.validate_node(root)
            }
        }
    }

    fn validate_node(&self, id: u32) -> bool {
        let node = &self.nodes[id as usize];
        if node.is_leaf() {
            return node.height == 0
                && node.body.is_some_and(|b| self.leaves.get(&b) == Some(&id));
        }
        let (l, r) = (node.left, node.right);
        let (ln, rn) = (&self.nodes[l as usize], &self.nodes[r as usize]);
        ln.parent == id
            && rn.parent == id
            && node.height == 1 + ln.height.max(rn.height)
            && node.aabb.contains(&ln.aabb)
            && node.aabb.contains(&rn.aabb)
            && self.validate_node(l)
            && self.validate_node(r)
    }

    // =========== Internal methods ===========

    fn alloc_node(&mut self) -> u32 {
        if let Some(id) = self.free_list.pop() {
            self.nodes[id as usize] = TreeNode::free();
            id
        } else {
            self.nodes.push(TreeNode::free());
            (self.nodes.len() - 1) as u32
        }
    }

    fn free_node(&mut self, id: u32) {
        self.nodes[id as usize] = TreeNode::free();
        self.free_list.push(id);
    }

    fn insert_leaf(&mut self, leaf: u32) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        };

        // Descend, choosing the child whose box grows least
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = root;
        while !self.nodes[index as usize].is_leaf() {
            let node = &self.nodes[index as usize];
            let (left, right) = (node.left, node.right);

            let area = node.aabb.perimeter();
            let combined_area = node.aabb.union(&leaf_aabb).perimeter();

            // Cost of pairing the leaf with this node
            let cost = 2.0 * combined_area;
            // Minimum cost pushed onto every ancestor by descending further
            let inheritance = 2.0 * (combined_area - area);

            let cost_left = self.descend_cost(left, &leaf_aabb) + inheritance;
            let cost_right = self.descend_cost(right, &leaf_aabb) + inheritance;

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.alloc_node();
        {
            let sibling_aabb = self.nodes[sibling as usize].aabb;
            let sibling_height = self.nodes[sibling as usize].height;
            let node = &mut self.nodes[new_parent as usize];
            node.parent = old_parent;
            node.aabb = leaf_aabb.union(&sibling_aabb);
            node.height = sibling_height + 1;
            node.left = sibling;
            node.right = leaf;
        }
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = Some(new_parent);
        } else if self.nodes[old_parent as usize].left == sibling {
            self.nodes[old_parent as usize].left = new_parent;
        } else {
            self.nodes[old_parent as usize].right = new_parent;
        }

        self.fix_upwards(new_parent);
    }

    fn descend_cost(&self, child: u32, leaf_aabb: &Aabb) -> f32 {
        let node = &self.nodes[child as usize];
        let combined = leaf_aabb.union(&node.aabb).perimeter();
        if node.is_leaf() {
            combined
        } else {
            combined - node.aabb.perimeter()
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grand_parent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == leaf {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grand_parent == NULL_NODE {
            self.root = Some(sibling);
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
        } else {
            if self.nodes[grand_parent as usize].left == parent {
                self.nodes[grand_parent as usize].left = sibling;
            } else {
                self.nodes[grand_parent as usize].right = sibling;
            }
            self.nodes[sibling as usize].parent = grand_parent;
            self.free_node(parent);
            self.fix_upwards(grand_parent);
        }
        self.nodes[leaf as usize].parent = NULL_NODE;
    }

    /// Rebalance and refit from `start` up to the root
    fn fix_upwards(&mut self, start: u32) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);

            let (left, right) = (self.nodes[index as usize].left, self.nodes[index as usize].right);
            let height = 1 + self.nodes[left as usize]
                .height
                .max(self.nodes[right as usize].height);
            let aabb = self.nodes[left as usize]
                .aabb
                .union(&self.nodes[right as usize].aabb);
            let node = &mut self.nodes[index as usize];
            node.height = height;
            node.aabb = aabb;

            index = node.parent;
        }
    }

    /// Rotate the taller grandchild up when `a` is out of balance.
    /// Returns the index of the subtree root after rotation.
    fn balance(&mut self, a: u32) -> u32 {
        if self.nodes[a as usize].is_leaf() || self.nodes[a as usize].height < 2 {
            return a;
        }

        let b = self.nodes[a as usize].left;
        let c = self.nodes[a as usize].right;
        let balance = self.nodes[c as usize].height - self.nodes[b as usize].height;

        if balance > 1 {
            self.rotate_up(a, c, b, false)
        } else if balance < -1 {
            self.rotate_up(a, b, c, true)
        } else {
            a
        }
    }

    /// Promote `up` (a child of `a`) above `a`. `other` is `a`'s remaining
    /// child. `up_was_left` records which side `up` hung from.
    fn rotate_up(&mut self, a: u32, up: u32, other: u32, up_was_left: bool) -> u32 {
        let f = self.nodes[up as usize].left;
        let g = self.nodes[up as usize].right;

        // `up` takes `a`'s place under the old parent
        let a_parent = self.nodes[a as usize].parent;
        self.nodes[up as usize].parent = a_parent;
        self.nodes[a as usize].parent = up;
        if a_parent == NULL_NODE {
            self.root = Some(up);
        } else if self.nodes[a_parent as usize].left == a {
            self.nodes[a_parent as usize].left = up;
        } else {
            self.nodes[a_parent as usize].right = up;
        }

        // The taller grandchild stays with `up`, the shorter one moves to `a`
        let (keep, give) = if self.nodes[f as usize].height > self.nodes[g as usize].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[up as usize].left = a;
        self.nodes[up as usize].right = keep;
        if up_was_left {
            self.nodes[a as usize].left = give;
        } else {
            self.nodes[a as usize].right = give;
        }
        self.nodes[give as usize].parent = a;

        let a_aabb = self.nodes[other as usize].aabb.union(&self.nodes[give as usize].aabb);
        let a_height = 1 + self.nodes[other as usize]
            .height
            .max(self.nodes[give as usize].height);
        self.nodes[a as usize].aabb = a_aabb;
        self.nodes[a as usize].height = a_height;

        let up_aabb = a_aabb.union(&self.nodes[keep as usize].aabb);
        let up_height = 1 + a_height.max(self.nodes[keep as usize].height);
        self.nodes[up as usize].aabb = up_aabb;
        self.nodes[up as usize].height = up_height;

        up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(x: f32, y: f32, z: f32) -> Aabb {
        let c = Vec3::new(x, y, z);
        Aabb::new(c - Vec3::splat(0.5), c + Vec3::splat(0.5))
    }

    #[test]
    fn test_aabb_ops() {
        let a = unit_box_at(0.0, 0.0, 0.0);
        let b = unit_box_at(0.9, 0.0, 0.0);
        let c = unit_box_at(3.0, 0.0, 0.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.expanded(0.1).contains(&a));
        assert!(!a.contains(&b));
        assert_eq!(a.perimeter(), 6.0);
    }

    #[test]
    fn test_aabb_from_rotated_body() {
        let mut body = RigidBody::dynamic();
        body.orientation = glam::Quat::from_rotation_y(core::f32::consts::FRAC_PI_4);
        let aabb = Aabb::from_body(&body);
        let expected = (2.0f32).sqrt() * 0.5;
        assert!((aabb.max.x - expected).abs() < 1e-5);
        assert!((aabb.max.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_pairs_reported_once() {
        let mut tree = DynamicTree::new();
        let a = BodyHandle::new(0, 0);
        let b = BodyHandle::new(1, 0);
        let c = BodyHandle::new(2, 0);
        tree.insert(a, unit_box_at(0.0, 0.0, 0.0));
        tree.insert(b, unit_box_at(0.8, 0.0, 0.0));
        tree.insert(c, unit_box_at(10.0, 0.0, 0.0));

        assert_eq!(tree.query_pairs(), vec![(a, b)]);
        assert!(tree.validate());
    }

    #[test]
    fn test_remove_and_recycle() {
        let mut tree = DynamicTree::new();
        let handles: Vec<_> = (0..8).map(|i| BodyHandle::new(i, 0)).collect();
        for (i, &h) in handles.iter().enumerate() {
            tree.insert(h, unit_box_at(i as f32 * 2.0, 0.0, 0.0));
        }
        let nodes_before = tree.nodes.len();

        assert!(tree.remove(handles[3]));
        assert!(!tree.remove(handles[3]));
        assert!(tree.validate());
        assert_eq!(tree.proxy_count(), 7);

        tree.insert(handles[3], unit_box_at(6.0, 0.0, 0.0));
        assert_eq!(tree.nodes.len(), nodes_before);
        assert!(tree.validate());
    }

    #[test]
    fn test_update_keeps_leaf_inside_fat_box() {
        let mut tree = DynamicTree::new();
        let a = BodyHandle::new(0, 0);
        tree.insert(a, unit_box_at(0.0, 0.0, 0.0).expanded(0.5));

        assert!(!tree.update(a, unit_box_at(0.2, 0.0, 0.0), unit_box_at(0.2, 0.0, 0.0)));
        assert!(tree.update(a, unit_box_at(2.0, 0.0, 0.0), unit_box_at(2.0, 0.0, 0.0).expanded(0.5)));
        let fat = tree.fat_aabb(a).unwrap();
        assert!(fat.contains(&unit_box_at(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_tree_stays_balanced() {
        let mut tree = DynamicTree::new();
        for i in 0..256u32 {
            tree.insert(BodyHandle::new(i, 0), unit_box_at(i as f32 * 1.5, 0.0, 0.0));
        }
        assert!(tree.validate());
        // A degenerate chain would be 255 deep
        assert!(tree.height() < 24, "height = {}", tree.height());

        let pairs = tree.query_pairs();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_query_pairs_matches_brute_force() {
        let mut tree = DynamicTree::new();
        let mut boxes = Vec::new();
        for i in 0..40u32 {
            let x = (i % 7) as f32 * 0.9;
            let y = (i / 7) as f32 * 0.95;
            let z = ((i * 13) % 5) as f32 * 0.3;
            let aabb = unit_box_at(x, y, z);
            let handle = BodyHandle::new(i, 0);
            tree.insert(handle, aabb);
            boxes.push((handle, aabb));
        }

        let mut expected = Vec::new();
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes[i].1.intersects(&boxes[j].1) {
                    expected.push((boxes[i].0, boxes[j].0));
                }
            }
        }
        expected.sort_unstable();
        assert_eq!(tree.query_pairs(), expected);
    }
}
