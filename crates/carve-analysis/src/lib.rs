//! Graph analysis for accelerator offload.
//!
//! Decides which nodes may run on the accelerator, groups them into
//! segments with one reverse walk from the sink and turns those segments into
//! clusters with ordered boundary edges.

pub mod classify;
pub mod cluster;
pub mod segment;

pub use classify::{NodeClassifier, OpSupport};
pub use cluster::{Cluster, ClusterMember, ClusterSet, build_clusters};
pub use segment::{
    BoundaryMask, ClusterId, SegmentError, SegmentId, Segmentation, reverse_topological_rank,
    segment_graph,
};
