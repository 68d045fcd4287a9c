//! Offload eligibility of individual nodes.

use std::collections::HashSet;

use carve_ir::{Node, names_cpu};

/// Answers whether an operation type has an IR lowering.
pub trait OpSupport {
    fn supports(&self, op: &str) -> bool;
}

impl OpSupport for HashSet<String> {
    fn supports(&self, op: &str) -> bool {
        self.contains(op)
    }
}

impl OpSupport for &[&str] {
    fn supports(&self, op: &str) -> bool {
        self.contains(&op)
    }
}

/// Decides which nodes may be offloaded.
///
/// A node is a candidate iff it is an operation (not a marker), its op type
/// is supported, and neither its requested nor its assigned device names a
/// CPU.
pub struct NodeClassifier<'a> {
    support: &'a dyn OpSupport,
}

impl<'a> NodeClassifier<'a> {
    pub fn new(support: &'a dyn OpSupport) -> Self {
        Self { support }
    }

    pub fn is_candidate(&self, node: &Node) -> bool {
        node.is_op()
            && self.support.supports(&node.op)
            && !names_cpu(&node.requested_device)
            && !names_cpu(&node.assigned_device)
    }
}
