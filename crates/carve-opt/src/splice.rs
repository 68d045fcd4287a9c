//! Replaces a cluster with a single invocation node.

use std::collections::HashSet;

use carve_analysis::{Cluster, ClusterId};
use carve_ir::{
    AttrValue, CONTROL_SLOT, DataType, Edge, EdgeId, Graph, IrError, NameAttrList, NodeDef,
    NodeId,
};

use crate::config::{CPU_PLACEMENT, OffloadConfig};

/// Op type of the nodes that replace clusters.
pub const INVOCATION_OP: &str = "invocation";

/// Errors detected before the graph is touched.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("cluster {0} has no members")]
    EmptyCluster(ClusterId),

    #[error("cluster {cluster}: member {node:?} is not in the graph")]
    MissingMember { cluster: ClusterId, node: NodeId },

    #[error("cluster {cluster}: edge {edge:?} is not a boundary edge ({reason})")]
    NotBoundary {
        cluster: ClusterId,
        edge: EdgeId,
        reason: &'static str,
    },

    #[error("node '{node}' declares no type for input {port}")]
    MissingPortType { node: String, port: i32 },

    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Swaps `cluster` for one invocation node running `function`.
///
/// Data edges keep their ids and move onto consecutive invocation ports in
/// the cluster's recorded order; control edges, repeated ones included, move
/// to the invocation as control edges. All members and the edges between
/// them are removed. Returns the new node.
pub fn splice_cluster(
    graph: &mut Graph,
    cluster: &Cluster,
    mut function: NameAttrList,
    config: &OffloadConfig,
) -> Result<NodeId, SpliceError> {
    let plan = Plan::new(graph, cluster)?;

    let name = graph.unique_name(&format!("invocation_{}", cluster.id));
    let placement = if config.accelerator_placement {
        plan.last_placement
    } else {
        CPU_PLACEMENT.to_string()
    };
    let tin: Vec<DataType> = plan.data_inputs.iter().map(|(_, t)| *t).collect();
    let tout: Vec<DataType> = plan.data_outputs.iter().map(|(_, t)| *t).collect();
    function.name = name.clone();

    let def = NodeDef::new(name.clone(), INVOCATION_OP)
        .attr("function", AttrValue::Func(function))
        .attr("Tin", AttrValue::Types(tin.clone()))
        .attr("Tout", AttrValue::Types(tout.clone()))
        .device(placement)
        .inputs(tin)
        .outputs(tout);
    let invocation = graph.add_node(def)?;

    for (port, (edge, _)) in plan.data_outputs.iter().enumerate() {
        graph.rewire_src(*edge, invocation, port_index(port))?;
    }
    for &edge in &plan.control_outputs {
        graph.rewire_src(edge, invocation, CONTROL_SLOT)?;
    }

    for (port, (edge, _)) in plan.data_inputs.iter().enumerate() {
        graph.rewire_dst(*edge, invocation, port_index(port))?;
    }
    for &edge in &plan.control_inputs {
        graph.rewire_dst(edge, invocation, CONTROL_SLOT)?;
    }

    for member in &cluster.members {
        graph.remove_node(member.node)?;
    }
    log::debug!(
        "spliced cluster {} ({} member(s)) into '{name}'",
        cluster.id,
        cluster.len()
    );
    Ok(invocation)
}

/// Checks that `cluster` can be spliced into `graph` as it is now.
///
/// Splicing one cluster keeps every edge id and only moves edge ends onto the
/// new invocation, so a cluster that passes here still passes after other
/// clusters have been spliced.
pub fn check_cluster(graph: &Graph, cluster: &Cluster) -> Result<(), SpliceError> {
    Plan::new(graph, cluster).map(|_| ())
}

/// Boundary edges sorted by kind, checked against the current graph.
struct Plan {
    data_inputs: Vec<(EdgeId, DataType)>,
    control_inputs: Vec<EdgeId>,
    data_outputs: Vec<(EdgeId, DataType)>,
    control_outputs: Vec<EdgeId>,
    last_placement: String,
}

impl Plan {
    fn new(graph: &Graph, cluster: &Cluster) -> Result<Self, SpliceError> {
        let last = cluster
            .last_member()
            .ok_or(SpliceError::EmptyCluster(cluster.id))?;
        let mut members = HashSet::with_capacity(cluster.len());
        for member in &cluster.members {
            if graph.node(member.node).is_none() {
                return Err(SpliceError::MissingMember {
                    cluster: cluster.id,
                    node: member.node,
                });
            }
            members.insert(member.node);
        }
        let last_placement = graph
            .node(last)
            .map(|n| n.placement().to_string())
            .unwrap_or_default();

        let not_boundary = |edge, reason| SpliceError::NotBoundary {
            cluster: cluster.id,
            edge,
            reason,
        };

        let mut plan = Plan {
            data_inputs: Vec::new(),
            control_inputs: Vec::new(),
            data_outputs: Vec::new(),
            control_outputs: Vec::new(),
            last_placement,
        };
        for &id in &cluster.input_edges {
            let edge = graph.edge(id).ok_or(IrError::UnknownEdge(id))?;
            if !members.contains(&edge.dst) || members.contains(&edge.src) {
                return Err(not_boundary(id, "input edge must enter the cluster"));
            }
            if edge.is_control() {
                plan.control_inputs.push(id);
            } else {
                plan.data_inputs.push((id, input_type(graph, edge)?));
            }
        }
        for &id in &cluster.output_edges {
            let edge = graph.edge(id).ok_or(IrError::UnknownEdge(id))?;
            if !members.contains(&edge.src) || members.contains(&edge.dst) {
                return Err(not_boundary(id, "output edge must leave the cluster"));
            }
            if edge.is_control() {
                plan.control_outputs.push(id);
            } else {
                plan.data_outputs.push((id, input_type(graph, edge)?));
            }
        }
        Ok(plan)
    }
}

/// Declared type of the destination port of a data edge.
fn input_type(graph: &Graph, edge: &Edge) -> Result<DataType, SpliceError> {
    let dst = graph.node(edge.dst).ok_or(IrError::UnknownNode(edge.dst))?;
    usize::try_from(edge.dst_input)
        .ok()
        .and_then(|port| dst.input_types.get(port).copied())
        .ok_or_else(|| SpliceError::MissingPortType {
            node: dst.name.clone(),
            port: edge.dst_input,
        })
}

fn port_index(port: usize) -> i32 {
    i32::try_from(port).unwrap_or(i32::MAX)
}
