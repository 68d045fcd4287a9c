//! Segmentation: partition candidate nodes into connected runs.
//!
//! Two linear passes over the graph:
//!
//! 1. A post-order DFS from `_SOURCE` assigns every node a reverse
//!    topological rank, so that every edge `u -> v` satisfies
//!    `rank(v) < rank(u)`.
//! 2. A DFS from `_SINK` against edge direction grows segments: a candidate
//!    without a segment opens a new one, and the segment flows along data
//!    edges into candidate producers. The same walk records which nodes sit on
//!    a cluster boundary.

use std::collections::HashSet;
use std::fmt;

use carve_ir::{Graph, NodeId};

use crate::classify::NodeClassifier;

/// Errors that abort segmentation.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// An edge disagrees with the rank order; the graph has a cycle.
    #[error("cycle detected: edge '{src}' -> '{dst}' violates topological order")]
    CycleDetected { src: String, dst: String },

    /// A node cannot be reached from `_SOURCE`; only a cycle can cause this
    /// once source and sink edges are fixed up.
    #[error("node '{node}' is unreachable from the source; the graph has a cycle")]
    Unreachable { node: String },

    /// A node the walk from `_SINK` never reached; once source and sink
    /// edges are fixed up, only a cycle with no way out can cause this.
    #[error("node '{node}' has no path to the sink; the graph has a cycle")]
    NoPathToSink { node: String },

    /// A data edge joins two candidates already in different segments.
    #[error(
        "cannot merge segments: '{node}' is in segment {existing} but is also consumed by segment {incoming}"
    )]
    CrossSegmentMerge {
        node: String,
        existing: SegmentId,
        incoming: SegmentId,
    },
}

/// Identifier of a segment, in discovery order.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SegmentId(pub u32);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a cluster.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Boundary flags of a node.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct BoundaryMask(u8);

impl BoundaryMask {
    /// Candidate fed by a non-candidate or by any control edge.
    pub const ENTRY: Self = Self(1 << 0);
    /// Candidate feeding a non-candidate or any control edge.
    pub const EXIT: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Result of segmenting one graph snapshot.
///
/// Tables are indexed by [`NodeId::index`] and only valid for the graph they
/// were computed from.
#[derive(Clone, Debug)]
pub struct Segmentation {
    rank: Vec<Option<usize>>,
    post_order: Vec<NodeId>,
    candidate: Vec<bool>,
    segment: Vec<Option<SegmentId>>,
    mask: Vec<BoundaryMask>,
    segment_to_cluster: Vec<ClusterId>,
}

impl Segmentation {
    /// Reverse topological rank of a node.
    pub fn rank(&self, id: NodeId) -> Option<usize> {
        self.rank.get(id.index()).copied().flatten()
    }

    pub fn is_candidate(&self, id: NodeId) -> bool {
        self.candidate.get(id.index()).copied().unwrap_or(false)
    }

    pub fn segment(&self, id: NodeId) -> Option<SegmentId> {
        self.segment.get(id.index()).copied().flatten()
    }

    pub fn mask(&self, id: NodeId) -> BoundaryMask {
        self.mask.get(id.index()).copied().unwrap_or_default()
    }

    /// Cluster a node belongs to, if it was assigned a segment.
    pub fn cluster(&self, id: NodeId) -> Option<ClusterId> {
        self.segment(id)
            .map(|s| self.segment_to_cluster[s.0 as usize])
    }

    pub fn segment_count(&self) -> usize {
        self.segment_to_cluster.len()
    }

    pub fn cluster_count(&self) -> usize {
        self.segment_to_cluster
            .iter()
            .map(|c| c.0 as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// All ranked nodes, producers before consumers.
    pub fn topological_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.post_order.iter().rev().copied()
    }
}

/// Assigns every node its reverse topological rank with one iterative
/// post-order DFS from `_SOURCE`.
///
/// Returns the rank table and the nodes in post order (rank `i` at
/// position `i`).
pub fn reverse_topological_rank(
    graph: &Graph,
) -> Result<(Vec<Option<usize>>, Vec<NodeId>), SegmentError> {
    let bound = graph.node_id_bound();
    let mut rank = vec![None; bound];
    let mut visited = vec![false; bound];
    let mut post_order = Vec::with_capacity(graph.num_nodes());

    let source = graph.source();
    visited[source.index()] = true;
    let mut stack: Vec<(NodeId, usize)> = vec![(source, 0)];
    while let Some(top) = stack.last_mut() {
        let (node, cursor) = *top;
        let outs = graph.node(node).map_or(&[][..], |n| n.out_edge_ids());
        if cursor < outs.len() {
            top.1 += 1;
            if let Some(edge) = graph.edge(outs[cursor]) {
                let dst = edge.dst;
                if !visited[dst.index()] {
                    visited[dst.index()] = true;
                    stack.push((dst, 0));
                }
            }
        } else {
            rank[node.index()] = Some(post_order.len());
            post_order.push(node);
            stack.pop();
        }
    }

    if let Some(node) = graph.nodes().find(|n| rank[n.id.index()].is_none()) {
        return Err(SegmentError::Unreachable {
            node: node.name.clone(),
        });
    }
    Ok((rank, post_order))
}

/// Partitions the candidates of `graph` into segments.
///
/// The graph must have its source and sink edges fixed up. Every segment
/// becomes its own cluster.
pub fn segment_graph(
    graph: &Graph,
    classifier: &NodeClassifier<'_>,
) -> Result<Segmentation, SegmentError> {
    let (rank, post_order) = reverse_topological_rank(graph)?;
    let bound = graph.node_id_bound();

    let mut candidate = vec![false; bound];
    for node in graph.nodes() {
        candidate[node.id.index()] = classifier.is_candidate(node);
    }

    let mut segment: Vec<Option<SegmentId>> = vec![None; bound];
    let mut mask = vec![BoundaryMask::default(); bound];
    let mut visited = vec![false; bound];
    let mut next_segment = 0u32;

    let mut stack = vec![graph.sink()];
    while let Some(id) = stack.pop() {
        let i = id.index();
        if visited[i] {
            continue;
        }
        let is_candidate = candidate[i];
        if is_candidate && segment[i].is_none() {
            segment[i] = Some(SegmentId(next_segment));
            next_segment += 1;
        }
        visited[i] = true;

        let mut data_sources: HashSet<NodeId> = HashSet::new();
        for edge in graph.in_edges(id) {
            let src = edge.src;
            let s = src.index();
            if data_sources.contains(&src) {
                continue;
            }
            if rank[s] <= rank[i] {
                return Err(SegmentError::CycleDetected {
                    src: node_name(graph, src),
                    dst: node_name(graph, id),
                });
            }
            let is_control = edge.is_control();
            if !is_control {
                data_sources.insert(src);
            }

            if is_candidate && candidate[s] && !is_control {
                match (segment[s], segment[i]) {
                    (None, current) => segment[s] = current,
                    (Some(existing), Some(incoming)) if existing != incoming => {
                        return Err(SegmentError::CrossSegmentMerge {
                            node: node_name(graph, src),
                            existing,
                            incoming,
                        });
                    }
                    _ => {}
                }
            }
            if !visited[s] {
                stack.push(src);
            }

            if is_candidate && (!candidate[s] || is_control) {
                mask[i].insert(BoundaryMask::ENTRY);
            }
            if (!is_candidate || is_control) && candidate[s] {
                mask[s].insert(BoundaryMask::EXIT);
            }
        }
    }

    if let Some(node) = graph.nodes().find(|n| !visited[n.id.index()]) {
        return Err(SegmentError::NoPathToSink {
            node: node.name.clone(),
        });
    }

    // No merge policy: every segment stands alone.
    let segment_to_cluster = (0..next_segment).map(ClusterId).collect();
    log::debug!(
        "segmented {} nodes into {next_segment} segment(s)",
        graph.num_nodes()
    );

    Ok(Segmentation {
        rank,
        post_order,
        candidate,
        segment,
        mask,
        segment_to_cluster,
    })
}

fn node_name(graph: &Graph, id: NodeId) -> String {
    graph
        .node(id)
        .map_or_else(|| format!("{id:?}"), |n| n.name.clone())
}
