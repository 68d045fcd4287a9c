//! Materializes segments into clusters with ordered boundary edges.

use carve_ir::{EdgeId, Graph, NodeId};

use crate::segment::{BoundaryMask, ClusterId, Segmentation};

/// A cluster member in topological order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterMember {
    pub node: NodeId,
    /// Some value produced here leaves the cluster.
    pub is_exit: bool,
}

/// One extraction unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    /// Members, producers before consumers.
    pub members: Vec<ClusterMember>,
    /// Edges from outside into a member, in discovery order.
    pub input_edges: Vec<EdgeId>,
    /// Edges from a member to outside, in discovery order.
    pub output_edges: Vec<EdgeId>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.iter().any(|m| m.node == node)
    }

    /// Last member in topological order.
    pub fn last_member(&self) -> Option<NodeId> {
        self.members.last().map(|m| m.node)
    }
}

/// Clusters of one run, split by the size threshold.
#[derive(Clone, Debug, Default)]
pub struct ClusterSet {
    pub kept: Vec<Cluster>,
    pub discarded: Vec<Cluster>,
}

/// Builds clusters in one pass over the nodes in topological order.
///
/// Clusters with fewer than `min_size` members go to
/// [`ClusterSet::discarded`] and their nodes are left alone.
pub fn build_clusters(graph: &Graph, seg: &Segmentation, min_size: usize) -> ClusterSet {
    let mut clusters: Vec<Cluster> = (0..seg.cluster_count())
        .map(|i| Cluster {
            id: ClusterId(i as u32),
            ..Cluster::default()
        })
        .collect();

    for id in seg.topological_order() {
        let Some(cid) = seg.cluster(id) else {
            continue;
        };
        let mask = seg.mask(id);
        let cluster = &mut clusters[cid.0 as usize];
        cluster.members.push(ClusterMember {
            node: id,
            is_exit: mask.contains(BoundaryMask::EXIT),
        });
        if mask.contains(BoundaryMask::ENTRY) {
            cluster.input_edges.extend(
                graph
                    .in_edges(id)
                    .filter(|e| seg.cluster(e.src) != Some(cid))
                    .map(|e| e.id),
            );
        }
        if mask.contains(BoundaryMask::EXIT) {
            cluster.output_edges.extend(
                graph
                    .out_edges(id)
                    .filter(|e| seg.cluster(e.dst) != Some(cid))
                    .map(|e| e.id),
            );
        }
    }

    let mut set = ClusterSet::default();
    for cluster in clusters {
        if cluster.is_empty() {
            continue;
        }
        if cluster.len() < min_size {
            log::debug!(
                "discarding cluster {} with {} member(s), minimum is {min_size}",
                cluster.id,
                cluster.len()
            );
            set.discarded.push(cluster);
        } else {
            log::debug!(
                "formed cluster {}: {} member(s), {} input edge(s), {} output edge(s)",
                cluster.id,
                cluster.len(),
                cluster.input_edges.len(),
                cluster.output_edges.len()
            );
            set.kept.push(cluster);
        }
    }
    set
}
