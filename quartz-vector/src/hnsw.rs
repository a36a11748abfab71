//! HNSW (Hierarchical Navigable Small World) index.
//!
//! A layered graph-based approximate nearest-neighbor index. Higher layers
//! are sparser and used for long-range jumps; layer 0 holds every node.
//! Search descends greedily from the entry point down to layer 0, where a
//! bounded candidate pool (`searchLayer`) is explored to collect the k
//! nearest neighbors.

use crate::kernel;
use crate::{SearchResult, VectorError, VectorId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

type Result<T> = std::result::Result<T, VectorError>;

/// Configuration for an [`HnswIndex`]. Fixed for the lifetime of the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Dimension of every vector stored in the index.
    pub dimension: usize,
    /// Per-level neighbor cap (`M`). Level 0 uses `2 * m`.
    pub m: usize,
    /// Candidate-pool size used during insertion.
    pub ef_construction: usize,
    /// Candidate-pool size used during query.
    pub ef_search: usize,
    /// Level-assignment scale, typically `1 / ln(m)`.
    pub m_l: f64,
    /// Soft hint for pre-sizing the id→node map. Exceeding it is not an error.
    pub max_elements: usize,
}

impl HnswConfig {
    /// A configuration with the given dimension and `m`, deriving the
    /// remaining defaults from `m` the way the original system does.
    pub fn new(dimension: usize, m: usize) -> Self {
        Self {
            dimension,
            m,
            ef_construction: 200,
            ef_search: 50,
            m_l: 1.0 / (m as f64).ln(),
            max_elements: 10_000,
        }
    }

    /// A lower-recall, faster-to-build configuration.
    pub fn fast(dimension: usize) -> Self {
        let mut cfg = Self::new(dimension, 8);
        cfg.ef_construction = 100;
        cfg.ef_search = 50;
        cfg
    }

    /// The default, balanced configuration (`m = 16`).
    pub fn balanced(dimension: usize) -> Self {
        Self::new(dimension, 16)
    }

    /// A higher-recall, slower configuration.
    pub fn high_quality(dimension: usize) -> Self {
        let mut cfg = Self::new(dimension, 32);
        cfg.ef_construction = 400;
        cfg.ef_search = 200;
        cfg
    }

    fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VectorError::InvalidConfig("dimension must be positive".into()));
        }
        if self.m < 2 {
            return Err(VectorError::InvalidConfig("m must be >= 2".into()));
        }
        if self.ef_construction < self.m {
            return Err(VectorError::InvalidConfig(
                "ef_construction must be >= m".into(),
            ));
        }
        if self.ef_search < 1 {
            return Err(VectorError::InvalidConfig("ef_search must be >= 1".into()));
        }
        Ok(())
    }
}

/// Aggregate statistics over the current graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    pub node_count: usize,
    pub max_level: usize,
    pub average_out_degree: f64,
    pub estimated_memory_bytes: usize,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    config: HnswConfig,
    nodes: Vec<HnswNode>,
    entry_point: Option<VectorId>,
    max_level: usize,
    next_id: VectorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HnswNode {
    pub(crate) id: VectorId,
    pub(crate) vector: Vec<f32>,
    pub(crate) level: usize,
    /// Sorted neighbor ids per level, bounded by `2m` at level 0 and `m`
    /// above — a short contiguous buffer outperforms a hashed set at this
    /// size (Design Notes).
    pub(crate) neighbors: Vec<Vec<VectorId>>,
}

impl HnswNode {
    fn new(id: VectorId, vector: Vec<f32>, level: usize) -> Self {
        Self {
            id,
            vector,
            level,
            neighbors: vec![Vec::new(); level + 1],
        }
    }
}

/// An in-memory HNSW graph over fixed-dimension, unit-normalized vectors.
pub struct HnswIndex {
    config: HnswConfig,
    nodes: HashMap<VectorId, HnswNode>,
    entry_point: Option<VectorId>,
    max_level: usize,
    next_id: VectorId,
}

impl HnswIndex {
    /// Create a new, empty index.
    pub fn new(config: HnswConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            nodes: HashMap::new(),
            entry_point: None,
            max_level: 0,
            next_id: 0,
        })
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: VectorId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Draw a level from this index's configured distribution without
    /// inserting anything. Exposed so a leader can stamp the level into a
    /// command before replication (spec.md §5).
    pub fn draw_level(&self) -> usize {
        Self::draw_level_from_scale(self.config.m_l)
    }

    /// Insert `vector`, normalizing a copy before storing it. Returns the
    /// assigned id (caller-supplied `id`, or the next auto-assigned one).
    /// The level is drawn locally from the configured distribution.
    pub fn insert(&mut self, vector: &[f32], id: Option<VectorId>) -> Result<VectorId> {
        let level = self.draw_level();
        self.insert_at_level(vector, id, level)
    }

    /// Insert `vector` at a caller-specified level instead of drawing one.
    ///
    /// Used by the replicated state machine: the leader draws the level
    /// once and stamps it into the command before replication, so every
    /// replica's `apply` is a deterministic function of the same input
    /// rather than re-drawing independently.
    pub fn insert_at_level(
        &mut self,
        vector: &[f32],
        id: Option<VectorId>,
        level: usize,
    ) -> Result<VectorId> {
        if vector.len() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        let id = match id {
            Some(id) => {
                if self.nodes.contains_key(&id) {
                    return Err(VectorError::DuplicateId(id));
                }
                id
            }
            None => self.allocate_id(),
        };

        let mut owned = vector.to_vec();
        kernel::normalize(&mut owned).map_err(|_| VectorError::ZeroVector)?;

        if self.entry_point.is_none() {
            self.nodes.insert(id, HnswNode::new(id, owned, level));
            self.entry_point = Some(id);
            self.max_level = level;
            self.bump_next_id(id);
            return Ok(id);
        }

        let entry_id = self.entry_point.expect("checked above");
        let mut cursor = entry_id;

        // Greedy descent from the top layer down to level + 1.
        for layer in ((level + 1)..=self.max_level).rev() {
            cursor = self.greedy_descend(&owned, cursor, layer);
        }

        // Store the node before linking so `distance_to(id, ...)` resolves
        // its real vector instead of the "unknown id" f32::MAX fallback.
        // Otherwise `shrink_if_needed` ranks every fresh edge into `id` as
        // the worst candidate and prunes it back out immediately.
        self.nodes.insert(id, HnswNode::new(id, owned.clone(), level));
        self.bump_next_id(id);

        for layer in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(&owned, &[cursor], self.config.ef_construction, layer);
            let cap = if layer == 0 { 2 * self.config.m } else { self.config.m };
            let selected = self.select_neighbors(&candidates, cap, &owned);

            if let Some(node) = self.nodes.get_mut(&id) {
                let mut v = selected.clone();
                v.sort_unstable();
                node.neighbors[layer] = v;
            }

            for &neighbor_id in &selected {
                self.link_reverse(neighbor_id, id, layer);
                self.shrink_if_needed(neighbor_id, layer);
            }

            if let Some(&closest) = selected.first() {
                cursor = closest;
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(id);
        }

        Ok(id)
    }

    /// Ordered list of (id, distance) for the k nearest neighbors of
    /// `query`, ascending by distance. Empty if the index has no nodes.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Err(VectorError::InvalidK);
        }
        let Some(entry_id) = self.entry_point else {
            return Ok(Vec::new());
        };

        let mut normalized = query.to_vec();
        if kernel::normalize(&mut normalized).is_err() {
            return Err(VectorError::ZeroVector);
        }

        let mut cursor = entry_id;
        for layer in (1..=self.max_level).rev() {
            cursor = self.greedy_descend(&normalized, cursor, layer);
        }

        let ef = self.config.ef_search.max(k);
        let candidates = self.search_layer(&normalized, &[cursor], ef, 0);

        let mut results: Vec<SearchResult> = candidates
            .iter()
            .take(k)
            .map(|&id| SearchResult::new(id, self.distance_to(id, &normalized)))
            .collect();
        results.sort();
        Ok(results)
    }

    /// Remove `id` and every edge referencing it.
    pub fn delete(&mut self, id: VectorId) -> Result<()> {
        let node = self.nodes.remove(&id).ok_or(VectorError::NodeNotFound(id))?;

        for (level, neighbors) in node.neighbors.iter().enumerate() {
            for &neighbor_id in neighbors {
                if let Some(neighbor) = self.nodes.get_mut(&neighbor_id)
                    && level < neighbor.neighbors.len()
                {
                    neighbor.neighbors[level].retain(|&n| n != id);
                }
            }
        }

        if self.entry_point == Some(id) {
            if let Some((&next_id, next_node)) = self.nodes.iter().max_by_key(|(_, n)| n.level) {
                self.entry_point = Some(next_id);
                self.max_level = next_node.level;
            } else {
                self.entry_point = None;
                self.max_level = 0;
            }
        }

        Ok(())
    }

    /// Aggregate statistics over the current graph.
    pub fn stats(&self) -> IndexStats {
        let node_count = self.nodes.len();
        let total_edges: usize = self
            .nodes
            .values()
            .flat_map(|n| n.neighbors.iter())
            .map(|level| level.len())
            .sum();
        let average_out_degree = if node_count == 0 {
            0.0
        } else {
            total_edges as f64 / node_count as f64
        };
        let per_node_bytes = std::mem::size_of::<VectorId>()
            + self.config.dimension * std::mem::size_of::<f32>()
            + std::mem::size_of::<usize>();
        let estimated_memory_bytes =
            node_count * per_node_bytes + total_edges * std::mem::size_of::<VectorId>();
        IndexStats {
            node_count,
            max_level: self.max_level,
            average_out_degree,
            estimated_memory_bytes,
        }
    }

    /// Encode the exact graph state — every node, its level, its edges at
    /// every level, the entry point, and the id allocator — as a single
    /// content-addressable blob.
    ///
    /// Used to build Raft snapshots: a restored index is bit-for-bit
    /// equivalent to the one that produced the snapshot, not rebuilt
    /// heuristically from the raw vectors.
    pub fn to_snapshot(&self) -> Result<Vec<u8>> {
        let snapshot = Snapshot {
            config: self.config.clone(),
            nodes: self.nodes.values().cloned().collect(),
            entry_point: self.entry_point,
            max_level: self.max_level,
            next_id: self.next_id,
        };
        bincode::serialize(&snapshot)
            .map_err(|e| VectorError::SerializationError(e.to_string()))
    }

    /// Rebuild an index from a blob produced by [`HnswIndex::to_snapshot`].
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = bincode::deserialize(bytes)
            .map_err(|e| VectorError::SerializationError(e.to_string()))?;
        snapshot.config.validate()?;
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|n| (n.id, n))
            .collect();
        Ok(Self {
            config: snapshot.config,
            nodes,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            next_id: snapshot.next_id,
        })
    }

    // ---- inner algorithms -------------------------------------------------

    /// Greedy descent: repeatedly move to a strictly closer level-`level`
    /// neighbor of `cursor`; stop when none is closer. Ties do not move.
    fn greedy_descend(&self, query: &[f32], mut cursor: VectorId, level: usize) -> VectorId {
        loop {
            let Some(node) = self.nodes.get(&cursor) else {
                return cursor;
            };
            let Some(neighbors) = node.neighbors.get(level) else {
                return cursor;
            };
            let current_dist = self.distance_to(cursor, query);
            let mut best = cursor;
            let mut best_dist = current_dist;
            for &neighbor_id in neighbors {
                let d = self.distance_to(neighbor_id, query);
                if d < best_dist {
                    best = neighbor_id;
                    best_dist = d;
                }
            }
            if best == cursor {
                return cursor;
            }
            cursor = best;
        }
    }

    /// The canonical HNSW layer search: a frontier min-heap and a results
    /// max-heap, both seeded with `entry_points`, expanding until the
    /// closest remaining candidate can no longer improve the result set.
    /// Returns ids sorted ascending by distance.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[VectorId],
        ef: usize,
        level: usize,
    ) -> Vec<VectorId> {
        let mut visited: HashSet<VectorId> = HashSet::new();
        let mut frontier: BinaryHeap<Reverse<ScoredId>> = BinaryHeap::new();
        let mut results: BinaryHeap<ScoredId> = BinaryHeap::new();

        for &ep in entry_points {
            if self.nodes.contains_key(&ep) && visited.insert(ep) {
                let d = self.distance_to(ep, query);
                frontier.push(Reverse(ScoredId { distance: d, id: ep }));
                results.push(ScoredId { distance: d, id: ep });
            }
        }

        while let Some(Reverse(current)) = frontier.pop() {
            if let Some(farthest) = results.peek()
                && current.distance > farthest.distance
                && results.len() >= ef
            {
                break;
            }

            let Some(node) = self.nodes.get(&current.id) else {
                continue;
            };
            let Some(neighbors) = node.neighbors.get(level) else {
                continue;
            };

            for &neighbor_id in neighbors {
                if !visited.insert(neighbor_id) {
                    continue;
                }
                let d = self.distance_to(neighbor_id, query);
                let improves =
                    results.len() < ef || results.peek().map(|f| d < f.distance).unwrap_or(true);
                if improves {
                    frontier.push(Reverse(ScoredId { distance: d, id: neighbor_id }));
                    results.push(ScoredId { distance: d, id: neighbor_id });
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut sorted: Vec<ScoredId> = results.into_vec();
        sorted.sort();
        sorted.into_iter().map(|s| s.id).collect()
    }

    /// Select up to `m` neighbors from `candidates`, ascending by distance
    /// to `query`; ties broken by smaller id (simple heuristic).
    fn select_neighbors(&self, candidates: &[VectorId], m: usize, query: &[f32]) -> Vec<VectorId> {
        let mut scored: Vec<ScoredId> = candidates
            .iter()
            .map(|&id| ScoredId {
                distance: self.distance_to(id, query),
                id,
            })
            .collect();
        scored.sort();
        scored.into_iter().take(m).map(|s| s.id).collect()
    }

    fn link_reverse(&mut self, neighbor_id: VectorId, id: VectorId, level: usize) {
        if let Some(neighbor) = self.nodes.get_mut(&neighbor_id)
            && level < neighbor.neighbors.len()
        {
            if let Err(pos) = neighbor.neighbors[level].binary_search(&id) {
                neighbor.neighbors[level].insert(pos, id);
            }
        }
    }

    /// If `neighbor_id`'s level out-degree exceeds its cap after a new
    /// edge was installed, shrink it by re-running neighbor selection
    /// against its own neighborhood. Every dropped neighbor's reverse edge
    /// back to `neighbor_id` is removed too, so the bidirectional-edge
    /// invariant holds after the shrink, not just the forward direction.
    fn shrink_if_needed(&mut self, neighbor_id: VectorId, level: usize) {
        let cap = if level == 0 { 2 * self.config.m } else { self.config.m };
        let Some(neighbor) = self.nodes.get(&neighbor_id) else {
            return;
        };
        let Some(current) = neighbor.neighbors.get(level) else {
            return;
        };
        if current.len() <= cap {
            return;
        }
        let query = neighbor.vector.clone();
        let candidates = current.clone();
        let kept = self.select_neighbors(&candidates, cap, &query);
        let kept_set: HashSet<VectorId> = kept.iter().copied().collect();
        let dropped: Vec<VectorId> = candidates.into_iter().filter(|c| !kept_set.contains(c)).collect();

        if let Some(neighbor) = self.nodes.get_mut(&neighbor_id) {
            let mut v = kept;
            v.sort_unstable();
            neighbor.neighbors[level] = v;
        }

        for dropped_id in dropped {
            if let Some(node) = self.nodes.get_mut(&dropped_id)
                && level < node.neighbors.len()
            {
                node.neighbors[level].retain(|&n| n != neighbor_id);
            }
        }
    }

    fn distance_to(&self, id: VectorId, query: &[f32]) -> f32 {
        match self.nodes.get(&id) {
            Some(node) => kernel::euclidean(&node.vector, query).unwrap_or(f32::MAX),
            None => f32::MAX,
        }
    }

    fn draw_level_from_scale(m_l: f64) -> usize {
        let u: f64 = rand::rng().random_range(f64::EPSILON..1.0);
        (-u.ln() * m_l).floor() as usize
    }

    fn allocate_id(&mut self) -> VectorId {
        while self.nodes.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        self.next_id
    }

    fn bump_next_id(&mut self, used: VectorId) {
        if used >= self.next_id {
            self.next_id = used + 1;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ScoredId {
    distance: f32,
    id: VectorId,
}

impl PartialEq for ScoredId {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.id == other.id
    }
}
impl Eq for ScoredId {}
impl PartialOrd for ScoredId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}
