//! The region tree: a rooted tree of fixed depth `L` whose non-root
//! nodes carry Voronoi images and per-resampling bookkeeping (spec §3).
//!
//! Representation follows spec §9's "flat `Map<Id, NodeState>` plus
//! per-parent children lists" alternative: a `HashMap<NodeId, NodeState>`
//! plus a `HashMap<NodeId, Vec<NodeId>>` children index kept sorted by
//! birth order, rather than a graph crate (none of the five example
//! repos in this corpus pull one in for a tree this shape).

use std::collections::HashMap;

use crate::distance::DistanceMetric;
use crate::error::RegionTreeError;
use crate::mergeable;

/// Ordered tuple of non-negative integers identifying a node. The root
/// is the empty tuple. A node at depth `d` has an identifier of length
/// `d`; its parent is the length-`(d-1)` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(Vec<u32>);

impl NodeId {
    pub fn root() -> Self {
        NodeId(Vec::new())
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The ancestor identifier of length `len`. Panics if `len` is
    /// greater than this id's own depth.
    pub fn prefix(&self, len: usize) -> Self {
        assert!(len <= self.0.len(), "prefix longer than node depth");
        NodeId(self.0[..len].to_vec())
    }

    /// Parent of this node. `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.prefix(self.0.len() - 1))
        }
    }

    /// The child of this node born at the given birth order.
    pub fn child(&self, birth_order: u32) -> Self {
        let mut path = self.0.clone();
        path.push(birth_order);
        NodeId(path)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

/// Immutable-after-construction region tree parameters (spec §3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionTreeConfig {
    pub max_n_regions: Vec<usize>,
    pub max_region_sizes: Vec<f64>,
    pub pmin: f64,
    pub pmax: f64,
    pub max_num_walkers: usize,
    pub min_num_walkers: usize,
}

impl RegionTreeConfig {
    pub fn n_levels(&self) -> usize {
        self.max_n_regions.len()
    }

    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;
        if self.max_n_regions.is_empty() {
            return Err(ConfigError::MissingOrInvalidParameter {
                message: "max_n_regions must have at least one level".into(),
            });
        }
        if self.max_n_regions.len() != self.max_region_sizes.len() {
            return Err(ConfigError::MissingOrInvalidParameter {
                message: "max_n_regions and max_region_sizes must have the same length".into(),
            });
        }
        if self.max_n_regions.iter().any(|&n| n == 0) {
            return Err(ConfigError::MissingOrInvalidParameter {
                message: "every level must allow at least one region".into(),
            });
        }
        if !(self.pmin > 0.0 && self.pmin < self.pmax && self.pmax <= 1.0) {
            return Err(ConfigError::MissingOrInvalidParameter {
                message: "pmin/pmax must satisfy 0 < pmin < pmax <= 1".into(),
            });
        }
        if self.min_num_walkers > self.max_num_walkers {
            return Err(ConfigError::MissingOrInvalidParameter {
                message: "min_num_walkers must not exceed max_num_walkers".into(),
            });
        }
        Ok(())
    }
}

/// Per-node state, reset each resampling cycle before walker placement.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    /// Index into the image table. `None` only for the root, which
    /// carries no image.
    pub image_idx: Option<usize>,
    pub walker_idxs: Vec<usize>,
    pub n_walkers: usize,
    pub n_mergeable: usize,
    pub n_cloneable: usize,
    pub balance: i64,
}

impl NodeState {
    fn new(image_idx: Option<usize>) -> Self {
        Self { image_idx, ..Default::default() }
    }

    fn clear(&mut self) {
        self.walker_idxs.clear();
        self.n_walkers = 0;
        self.n_mergeable = 0;
        self.n_cloneable = 0;
        self.balance = 0;
    }
}

/// A newly created branch, recorded for the external reporters (spec §6).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BranchRecord<I> {
    pub branching_level: usize,
    pub distance: f64,
    pub new_leaf_id: NodeId,
    pub image: I,
}

/// The region tree itself. Generic over the walker's state type `S`
/// only insofar as `assign`/`place_walkers` need it to call the
/// distance metric; the tree stores only images, never states.
pub struct RegionTree<I> {
    config: RegionTreeConfig,
    images: Vec<I>,
    nodes: HashMap<NodeId, NodeState>,
    children: HashMap<NodeId, Vec<NodeId>>,
    walker_weights: Vec<f64>,
    walker_assignments: Vec<NodeId>,
}

impl<I: Clone> RegionTree<I> {
    /// Create a tree seeded with a single root-to-leaf spine built from
    /// `init_image` (spec §3 "Lifecycles").
    pub fn new(config: RegionTreeConfig, init_image: I) -> Self {
        let mut nodes = HashMap::new();
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        nodes.insert(NodeId::root(), NodeState::new(None));

        let images = vec![init_image];
        let mut parent = NodeId::root();
        for _level in 0..config.n_levels() {
            let child = parent.child(0);
            nodes.insert(child.clone(), NodeState::new(Some(0)));
            children.entry(parent.clone()).or_default().push(child.clone());
            parent = child;
        }

        Self { config, images, nodes, children, walker_weights: Vec::new(), walker_assignments: Vec::new() }
    }

    pub fn config(&self) -> &RegionTreeConfig {
        &self.config
    }

    pub fn images(&self) -> &[I] {
        &self.images
    }

    pub fn walker_weights(&self) -> &[f64] {
        &self.walker_weights
    }

    pub fn walker_assignments(&self) -> &[NodeId] {
        &self.walker_assignments
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut NodeState> {
        self.nodes.get_mut(id)
    }

    /// Children of `parent_id`, in ascending birth-index order.
    pub fn children(&self, parent_id: &NodeId) -> &[NodeId] {
        self.children.get(parent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All node identifiers at the given depth.
    pub fn level_nodes(&self, level: usize) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().filter(|id| id.depth() == level).cloned().collect();
        ids.sort();
        ids
    }

    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.level_nodes(self.config.n_levels())
    }

    fn add_child(&mut self, parent_id: &NodeId, image_idx: usize) -> NodeId {
        let siblings = self.children.entry(parent_id.clone()).or_default();
        let birth_order = siblings.len() as u32;
        let child_id = parent_id.child(birth_order);
        siblings.push(child_id.clone());
        self.nodes.insert(child_id.clone(), NodeState::new(Some(image_idx)));
        child_id
    }

    /// Create a new branch under `parent_id` carrying `image`, extending
    /// a single-child spine down to depth `L` (spec §4.2/§4.1).
    pub fn branch_tree(&mut self, parent_id: NodeId, image: I) -> NodeId {
        let image_idx = self.images.len();
        self.images.push(image);

        let branch_level = parent_id.depth();
        let mut cursor = parent_id;
        for _level in branch_level..self.config.n_levels() {
            cursor = self.add_child(&cursor, image_idx);
        }
        cursor
    }

    /// L-ary nearest-child descent (spec §4.1). Returns the chosen leaf
    /// identifier and the per-level distance to the chosen child.
    pub fn assign<D>(&self, distance: &D, state: &D::State) -> Result<(NodeId, Vec<f64>), RegionTreeError>
    where
        D: DistanceMetric<Image = I>,
    {
        let state_image = distance.image(state).map_err(RegionTreeError::assignment)?;

        let mut dist_cache: HashMap<usize, f64> = HashMap::new();
        let mut node = NodeId::root();
        let mut assignment_dists = Vec::with_capacity(self.config.n_levels());

        for _level in 0..self.config.n_levels() {
            let level_children = self.children(&node);
            debug_assert!(!level_children.is_empty(), "every non-leaf node must have children");

            let mut best_idx = 0usize;
            let mut best_dist = f64::INFINITY;
            for (idx, child_id) in level_children.iter().enumerate() {
                let image_idx = self.nodes[child_id].image_idx.expect("non-root node must have an image");
                let dist = if let Some(&cached) = dist_cache.get(&image_idx) {
                    cached
                } else {
                    let image = &self.images[image_idx];
                    let d = distance.image_distance(&state_image, image).map_err(RegionTreeError::assignment)?;
                    dist_cache.insert(image_idx, d);
                    d
                };
                if dist < best_dist {
                    best_dist = dist;
                    best_idx = idx;
                }
            }

            assignment_dists.push(best_dist);
            node = level_children[best_idx].clone();
        }

        Ok((node, assignment_dists))
    }

    /// Reset all per-cycle bookkeeping. Safe to call even after a fatal
    /// error mid-cycle (spec §9 "Cycle management").
    pub fn clear_walkers(&mut self) {
        self.walker_weights.clear();
        self.walker_assignments.clear();
        for node_state in self.nodes.values_mut() {
            node_state.clear();
        }
    }

    /// Assign every walker to a leaf, branching the tree as needed, and
    /// compute mergeable/cloneable counts for the cycle (spec §4.2).
    pub fn place_walkers<D>(
        &mut self,
        distance: &D,
        walkers: &[crate::distance::Walker<D::State>],
    ) -> Result<Vec<BranchRecord<I>>, RegionTreeError>
    where
        D: DistanceMetric<Image = I>,
    {
        self.clear_walkers();
        let mut new_branches = Vec::new();

        for (walker_idx, walker) in walkers.iter().enumerate() {
            let (mut assignment, distances) = self.assign(distance, &walker.state)?;

            for (level, &dist) in distances.iter().enumerate() {
                if dist > self.config.max_region_sizes[level] {
                    let parent_id = assignment.prefix(level);
                    if self.children(&parent_id).len() < self.config.max_n_regions[level] {
                        let image = distance.image(&walker.state).map_err(RegionTreeError::assignment)?;
                        let new_leaf = self.branch_tree(parent_id, image.clone());
                        new_branches.push(BranchRecord {
                            branching_level: level,
                            distance: dist,
                            new_leaf_id: new_leaf.clone(),
                            image,
                        });
                        assignment = new_leaf;
                        break;
                    }
                }
            }

            self.walker_assignments.push(assignment.clone());
            self.walker_weights.push(walker.weight);

            for level in 0..=assignment.depth() {
                let node_id = assignment.prefix(level);
                let node_state = self.nodes.get_mut(&node_id).expect("ancestor must exist");
                node_state.n_walkers += 1;
                node_state.walker_idxs.push(walker_idx);
            }
        }

        self.compute_mergeable_cloneable();
        Ok(new_branches)
    }

    fn compute_mergeable_cloneable(&mut self) {
        let n_levels = self.config.n_levels();
        let pmax = self.config.pmax;
        let pmin = self.config.pmin;
        let max_num_walkers = self.config.max_num_walkers;

        for leaf in self.leaf_nodes() {
            let (n_walkers, weights): (usize, Vec<f64>) = {
                let leaf_state = &self.nodes[&leaf];
                let weights = leaf_state.walker_idxs.iter().map(|&idx| self.walker_weights[idx]).collect();
                (leaf_state.n_walkers, weights)
            };

            if n_walkers > 1 {
                let n_mergeable = mergeable::n_mergeable(&weights, pmax);
                self.nodes.get_mut(&leaf).unwrap().n_mergeable = n_mergeable;
                for level in (0..n_levels).rev() {
                    let ancestor = leaf.prefix(level);
                    self.nodes.get_mut(&ancestor).unwrap().n_mergeable += n_mergeable;
                }
            }

            if n_walkers > 0 {
                let n_cloneable = mergeable::n_cloneable(&weights, pmin, max_num_walkers);
                self.nodes.get_mut(&leaf).unwrap().n_cloneable = n_cloneable;
                for level in (0..n_levels).rev() {
                    let ancestor = leaf.prefix(level);
                    self.nodes.get_mut(&ancestor).unwrap().n_cloneable += n_cloneable;
                }
            }
        }
    }
}
