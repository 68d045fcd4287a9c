//! Error types for graph surgery and IR construction.

use crate::graph::{EdgeId, NodeId};

/// Errors raised by [`Graph`](crate::Graph) mutation and
/// [`Program`](crate::Program) construction.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A node id does not name a live node.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// An edge id does not name a live edge.
    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),

    /// Another node already uses this name.
    #[error("duplicate node name '{0}'")]
    DuplicateName(String),

    /// A port index is outside the node's declared ports.
    #[error("node '{node}' has no {direction} port {port}")]
    BadPort {
        node: String,
        direction: &'static str,
        port: i32,
    },

    /// The two marker nodes cannot be removed.
    #[error("cannot remove marker node '{0}'")]
    MarkerNode(String),

    /// An instruction argument refers to a slot not yet in the program.
    #[error("instruction argument %{index} does not precede instruction %{at}")]
    DanglingArgument { index: usize, at: usize },
}
