//! Accelerator offload for host graphs.
//!
//! [`Offloader`] classifies nodes, groups supported ones into clusters, lowers
//! each cluster into an accelerator program and splices an invocation node
//! in its place. [`OffloadConfig`] controls placement and the size threshold.

pub mod config;
mod offload;
pub mod splice;

pub use config::{MIN_CLUSTER_SIZE, OffloadConfig};
pub use offload::{OffloadError, OffloadReport, Offloader, offload};
pub use splice::{INVOCATION_OP, SpliceError, check_cluster, splice_cluster};
