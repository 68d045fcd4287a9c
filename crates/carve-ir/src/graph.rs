//! Host computation graph.
//!
//! A directed acyclic graph of operation nodes connected by data and control
//! edges. Every graph owns two marker nodes, `_SOURCE` and `_SINK`; after
//! [`Graph::fixup_source_and_sink_edges`] every node is reachable from the
//! source and reaches the sink.
//!
//! Node and edge ids are dense slot indices. Removing a node or edge vacates
//! its slot without renumbering, so ids held by callers stay meaningful
//! across graph surgery.

use std::collections::{BTreeMap, HashMap};

use crate::attr::AttrValue;
use crate::error::IrError;
use crate::types::DataType;

/// Port index carried by both ends of a control edge.
pub const CONTROL_SLOT: i32 = -1;

/// Name of the marker node every graph starts from.
pub const SOURCE_NAME: &str = "_SOURCE";
/// Name of the marker node every graph ends in.
pub const SINK_NAME: &str = "_SINK";

/// Identifier of a node slot.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of an edge slot.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct EdgeId(pub u32);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a node is a real operation or one of the two markers.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum NodeClass {
    Op,
    Source,
    Sink,
}

/// Description of a node to insert with [`Graph::add_node`].
#[derive(Clone, Debug, Default)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    pub attrs: BTreeMap<String, AttrValue>,
    pub requested_device: String,
    pub input_types: Vec<DataType>,
    pub output_types: Vec<DataType>,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.requested_device = device.into();
        self
    }

    pub fn inputs(mut self, types: impl Into<Vec<DataType>>) -> Self {
        self.input_types = types.into();
        self
    }

    pub fn outputs(mut self, types: impl Into<Vec<DataType>>) -> Self {
        self.output_types = types.into();
        self
    }
}

/// A node in the host graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Operation-type tag, e.g. `Conv2D`.
    pub op: String,
    pub class: NodeClass,
    pub attrs: BTreeMap<String, AttrValue>,
    /// Placement requested by the graph author.
    pub requested_device: String,
    /// Placement chosen by the runtime, empty until assigned.
    pub assigned_device: String,
    /// Declared type of each data input port.
    pub input_types: Vec<DataType>,
    /// Declared type of each data output port.
    pub output_types: Vec<DataType>,
    in_edges: Vec<EdgeId>,
    out_edges: Vec<EdgeId>,
}

impl Node {
    /// Returns `true` for operation nodes (not `_SOURCE` / `_SINK`).
    pub fn is_op(&self) -> bool {
        self.class == NodeClass::Op
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Inbound edge ids in insertion order.
    pub fn in_edge_ids(&self) -> &[EdgeId] {
        &self.in_edges
    }

    /// Outbound edge ids in insertion order.
    pub fn out_edge_ids(&self) -> &[EdgeId] {
        &self.out_edges
    }

    /// Assigned placement if any, else the requested one.
    pub fn placement(&self) -> &str {
        if self.assigned_device.is_empty() {
            &self.requested_device
        } else {
            &self.assigned_device
        }
    }
}

/// A directed edge `(src, src_output) -> (dst, dst_input)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub src: NodeId,
    pub src_output: i32,
    pub dst: NodeId,
    pub dst_input: i32,
}

impl Edge {
    /// Control edges order execution without carrying data.
    pub fn is_control(&self) -> bool {
        self.src_output == CONTROL_SLOT
    }
}

/// A host computation graph.
#[derive(Clone, Debug)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    names: HashMap<String, NodeId>,
    source: NodeId,
    sink: NodeId,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates a graph holding only the two marker nodes.
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            names: HashMap::new(),
            source: NodeId(0),
            sink: NodeId(1),
        };
        graph.source = graph.push_node(NodeDef::new(SOURCE_NAME, "NoOp"), NodeClass::Source);
        graph.sink = graph.push_node(NodeDef::new(SINK_NAME, "NoOp"), NodeClass::Sink);
        graph
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn sink(&self) -> NodeId {
        self.sink
    }

    /// Adds an operation node.
    pub fn add_node(&mut self, def: NodeDef) -> Result<NodeId, IrError> {
        if self.names.contains_key(&def.name) {
            return Err(IrError::DuplicateName(def.name));
        }
        Ok(self.push_node(def, NodeClass::Op))
    }

    fn push_node(&mut self, def: NodeDef, class: NodeClass) -> NodeId {
        let id = NodeId(slot_index(self.nodes.len()));
        self.names.insert(def.name.clone(), id);
        self.nodes.push(Some(Node {
            id,
            name: def.name,
            op: def.op,
            class,
            attrs: def.attrs,
            requested_device: def.requested_device,
            assigned_device: String::new(),
            input_types: def.input_types,
            output_types: def.output_types,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        }));
        id
    }

    /// Adds a data edge, or a control edge when both ports are [`CONTROL_SLOT`].
    pub fn add_edge(
        &mut self,
        src: NodeId,
        src_output: i32,
        dst: NodeId,
        dst_input: i32,
    ) -> Result<EdgeId, IrError> {
        self.check_output_port(src, src_output)?;
        self.check_input_port(dst, dst_input)?;
        if (src_output == CONTROL_SLOT) != (dst_input == CONTROL_SLOT) {
            return Err(IrError::BadPort {
                node: self.node_name(dst).to_string(),
                direction: "input",
                port: dst_input,
            });
        }
        let id = EdgeId(slot_index(self.edges.len()));
        self.edges.push(Some(Edge {
            id,
            src,
            src_output,
            dst,
            dst_input,
        }));
        self.live_node_mut(src)?.out_edges.push(id);
        self.live_node_mut(dst)?.in_edges.push(id);
        Ok(id)
    }

    /// Adds a control edge unless an identical one already exists.
    pub fn add_control_edge(&mut self, src: NodeId, dst: NodeId) -> Result<EdgeId, IrError> {
        let existing = self
            .out_edges(src)
            .find(|e| e.is_control() && e.dst == dst)
            .map(|e| e.id);
        match existing {
            Some(id) => Ok(id),
            None => self.add_edge(src, CONTROL_SLOT, dst, CONTROL_SLOT),
        }
    }

    /// Removes an edge and returns it.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, IrError> {
        let edge = self
            .edges
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(IrError::UnknownEdge(id))?;
        if let Some(src) = self.node_slot_mut(edge.src) {
            src.out_edges.retain(|&e| e != id);
        }
        if let Some(dst) = self.node_slot_mut(edge.dst) {
            dst.in_edges.retain(|&e| e != id);
        }
        Ok(edge)
    }

    /// Removes an operation node together with all of its edges.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, IrError> {
        let node = self.node(id).ok_or(IrError::UnknownNode(id))?;
        if !node.is_op() {
            return Err(IrError::MarkerNode(node.name.clone()));
        }
        let incident: Vec<EdgeId> = node
            .in_edges
            .iter()
            .chain(node.out_edges.iter())
            .copied()
            .collect();
        for edge in incident {
            // A self-loop appears in both lists.
            if self.edge(edge).is_some() {
                self.remove_edge(edge)?;
            }
        }
        let node = self.nodes[id.index()].take().ok_or(IrError::UnknownNode(id))?;
        self.names.remove(&node.name);
        Ok(node)
    }

    /// Moves the source end of `edge` to `(src, src_output)`, keeping its id.
    ///
    /// A control edge stays a control edge and is moved to the back of its
    /// destination's inbound list, behind the data inputs.
    pub fn rewire_src(&mut self, edge: EdgeId, src: NodeId, src_output: i32) -> Result<(), IrError> {
        let old = *self.edge(edge).ok_or(IrError::UnknownEdge(edge))?;
        if old.is_control() != (src_output == CONTROL_SLOT) {
            return Err(IrError::BadPort {
                node: self.node_name(src).to_string(),
                direction: "output",
                port: src_output,
            });
        }
        self.check_output_port(src, src_output)?;
        self.live_node_mut(old.src)?.out_edges.retain(|&e| e != edge);
        self.live_node_mut(src)?.out_edges.push(edge);
        if old.is_control() {
            let dst = self.live_node_mut(old.dst)?;
            dst.in_edges.retain(|&e| e != edge);
            dst.in_edges.push(edge);
        }
        if let Some(Some(e)) = self.edges.get_mut(edge.index()) {
            e.src = src;
            e.src_output = src_output;
        }
        Ok(())
    }

    /// Moves the destination end of `edge` to `(dst, dst_input)`, keeping its id.
    pub fn rewire_dst(&mut self, edge: EdgeId, dst: NodeId, dst_input: i32) -> Result<(), IrError> {
        let old = *self.edge(edge).ok_or(IrError::UnknownEdge(edge))?;
        if old.is_control() != (dst_input == CONTROL_SLOT) {
            return Err(IrError::BadPort {
                node: self.node_name(dst).to_string(),
                direction: "input",
                port: dst_input,
            });
        }
        self.check_input_port(dst, dst_input)?;
        self.live_node_mut(old.dst)?.in_edges.retain(|&e| e != edge);
        self.live_node_mut(dst)?.in_edges.push(edge);
        if let Some(Some(e)) = self.edges.get_mut(edge.index()) {
            e.dst = dst;
            e.dst_input = dst_input;
        }
        Ok(())
    }

    /// Connects `_SOURCE` to every node without inbound edges and every node
    /// without outbound edges to `_SINK`, using control edges.
    ///
    /// Running it again adds nothing.
    pub fn fixup_source_and_sink_edges(&mut self) -> Result<(), IrError> {
        let ops: Vec<(NodeId, bool, bool)> = self
            .op_nodes()
            .map(|n| (n.id, n.in_edges.is_empty(), n.out_edges.is_empty()))
            .collect();
        for (id, no_inputs, no_outputs) in ops {
            if no_inputs {
                self.add_control_edge(self.source, id)?;
            }
            if no_outputs {
                self.add_control_edge(id, self.sink)?;
            }
        }
        let source_isolated = self.nodes[self.source.index()]
            .as_ref()
            .is_some_and(|n| n.out_edges.is_empty());
        if source_isolated {
            self.add_control_edge(self.source, self.sink)?;
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.node_slot_mut(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index()).and_then(Option::as_ref)
    }

    /// Looks a node up by name.
    pub fn find_node(&self, name: &str) -> Option<&Node> {
        self.names.get(name).and_then(|&id| self.node(id))
    }

    /// Live nodes in id order, markers included.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    /// Live operation nodes in id order.
    pub fn op_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.is_op())
    }

    /// Live edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().flatten()
    }

    pub fn in_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.in_edges.iter())
            .filter_map(|&e| self.edge(e))
    }

    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.out_edges.iter())
            .filter_map(|&e| self.edge(e))
    }

    /// Number of live nodes, markers included.
    pub fn num_nodes(&self) -> usize {
        self.nodes().count()
    }

    pub fn num_op_nodes(&self) -> usize {
        self.op_nodes().count()
    }

    pub fn num_edges(&self) -> usize {
        self.edges().count()
    }

    /// One past the largest node id ever handed out; sizes dense side tables.
    pub fn node_id_bound(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `prefix` if unused, else the first free `prefix_<n>`.
    pub fn unique_name(&self, prefix: &str) -> String {
        if !self.names.contains_key(prefix) {
            return prefix.to_string();
        }
        (1..)
            .map(|n| format!("{prefix}_{n}"))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| prefix.to_string())
    }

    fn node_name(&self, id: NodeId) -> &str {
        self.node(id).map_or("<unknown>", |n| n.name.as_str())
    }

    fn node_slot_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn live_node_mut(&mut self, id: NodeId) -> Result<&mut Node, IrError> {
        self.node_slot_mut(id).ok_or(IrError::UnknownNode(id))
    }

    fn check_output_port(&self, id: NodeId, port: i32) -> Result<(), IrError> {
        let node = self.node(id).ok_or(IrError::UnknownNode(id))?;
        let ok = port == CONTROL_SLOT
            || usize::try_from(port).is_ok_and(|p| p < node.output_types.len());
        if ok {
            Ok(())
        } else {
            Err(IrError::BadPort {
                node: node.name.clone(),
                direction: "output",
                port,
            })
        }
    }

    fn check_input_port(&self, id: NodeId, port: i32) -> Result<(), IrError> {
        let node = self.node(id).ok_or(IrError::UnknownNode(id))?;
        let ok = port == CONTROL_SLOT
            || usize::try_from(port).is_ok_and(|p| p < node.input_types.len());
        if ok {
            Ok(())
        } else {
            Err(IrError::BadPort {
                node: node.name.clone(),
                direction: "input",
                port,
            })
        }
    }
}

fn slot_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("graph overflow: {len} slots exceeds u32::MAX"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unary(graph: &mut Graph, name: &str) -> NodeId {
        graph
            .add_node(
                NodeDef::new(name, "Relu")
                    .inputs(vec![DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap()
    }

    #[test]
    fn new_graph_has_markers() {
        let graph = Graph::new();
        assert_eq!(graph.num_nodes(), 2);
        assert_eq!(graph.num_op_nodes(), 0);
        assert_eq!(graph.node(graph.source()).unwrap().name, SOURCE_NAME);
        assert_eq!(graph.node(graph.sink()).unwrap().class, NodeClass::Sink);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut graph = Graph::new();
        unary(&mut graph, "a");
        let err = graph.add_node(NodeDef::new("a", "Relu")).unwrap_err();
        assert!(matches!(err, IrError::DuplicateName(n) if n == "a"));
    }

    #[test]
    fn edges_are_recorded_on_both_ends() {
        let mut graph = Graph::new();
        let a = unary(&mut graph, "a");
        let b = unary(&mut graph, "b");
        let e = graph.add_edge(a, 0, b, 0).unwrap();
        assert_eq!(graph.node(a).unwrap().out_edge_ids(), &[e]);
        assert_eq!(graph.node(b).unwrap().in_edge_ids(), &[e]);
        assert!(!graph.edge(e).unwrap().is_control());
    }

    #[test]
    fn out_of_range_port_rejected() {
        let mut graph = Graph::new();
        let a = unary(&mut graph, "a");
        let b = unary(&mut graph, "b");
        assert!(matches!(
            graph.add_edge(a, 1, b, 0),
            Err(IrError::BadPort { direction: "output", port: 1, .. })
        ));
        assert!(graph.add_edge(a, 0, b, CONTROL_SLOT).is_err());
    }

    #[test]
    fn control_edges_are_deduplicated() {
        let mut graph = Graph::new();
        let a = unary(&mut graph, "a");
        let b = unary(&mut graph, "b");
        let e1 = graph.add_control_edge(a, b).unwrap();
        let e2 = graph.add_control_edge(a, b).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(graph.num_edges(), 1);
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut graph = Graph::new();
        let a = unary(&mut graph, "a");
        let b = unary(&mut graph, "b");
        let c = unary(&mut graph, "c");
        graph.add_edge(a, 0, b, 0).unwrap();
        graph.add_edge(b, 0, c, 0).unwrap();
        graph.remove_node(b).unwrap();
        assert_eq!(graph.num_edges(), 0);
        assert!(graph.node(a).unwrap().out_edge_ids().is_empty());
        assert!(graph.find_node("b").is_none());
        // ids are not reused
        let d = unary(&mut graph, "d");
        assert_ne!(d, b);
    }

    #[test]
    fn markers_cannot_be_removed() {
        let mut graph = Graph::new();
        let sink = graph.sink();
        assert!(matches!(graph.remove_node(sink), Err(IrError::MarkerNode(_))));
    }

    #[test]
    fn rewire_keeps_edge_id() {
        let mut graph = Graph::new();
        let a = unary(&mut graph, "a");
        let b = unary(&mut graph, "b");
        let c = unary(&mut graph, "c");
        let e = graph.add_edge(a, 0, b, 0).unwrap();
        graph.rewire_src(e, c, 0).unwrap();
        assert_eq!(graph.edge(e).unwrap().src, c);
        assert!(graph.node(a).unwrap().out_edge_ids().is_empty());
        assert_eq!(graph.node(c).unwrap().out_edge_ids(), &[e]);

        graph.rewire_dst(e, a, 0).unwrap();
        assert_eq!(graph.edge(e).unwrap().dst, a);
        assert!(graph.node(b).unwrap().in_edge_ids().is_empty());
    }

    #[test]
    fn rewired_control_edge_trails_data_inputs() {
        let mut graph = Graph::new();
        let a = unary(&mut graph, "a");
        let b = unary(&mut graph, "b");
        let c = unary(&mut graph, "c");
        let ctrl = graph.add_control_edge(a, c).unwrap();
        let data = graph.add_edge(b, 0, c, 0).unwrap();
        graph.rewire_src(ctrl, b, CONTROL_SLOT).unwrap();
        assert_eq!(graph.node(c).unwrap().in_edge_ids(), &[data, ctrl]);
        assert!(graph.rewire_src(ctrl, a, 0).is_err());
    }

    #[test]
    fn fixup_connects_dangling_nodes() {
        let mut graph = Graph::new();
        let a = unary(&mut graph, "a");
        let b = unary(&mut graph, "b");
        graph.add_edge(a, 0, b, 0).unwrap();
        graph.fixup_source_and_sink_edges().unwrap();
        let src_targets: Vec<_> = graph.out_edges(graph.source()).map(|e| e.dst).collect();
        let sink_sources: Vec<_> = graph.in_edges(graph.sink()).map(|e| e.src).collect();
        assert_eq!(src_targets, vec![a]);
        assert_eq!(sink_sources, vec![b]);

        // idempotent
        let before = graph.num_edges();
        graph.fixup_source_and_sink_edges().unwrap();
        assert_eq!(graph.num_edges(), before);
    }

    #[test]
    fn unique_name_appends_suffix() {
        let mut graph = Graph::new();
        unary(&mut graph, "invocation_0");
        assert_eq!(graph.unique_name("invocation_1"), "invocation_1");
        assert_eq!(graph.unique_name("invocation_0"), "invocation_0_1");
    }

    #[test]
    fn placement_prefers_assigned_device() {
        let mut graph = Graph::new();
        let a = graph
            .add_node(NodeDef::new("a", "Relu").device("/device:CPU:0"))
            .unwrap();
        assert_eq!(graph.node(a).unwrap().placement(), "/device:CPU:0");
        graph.node_mut(a).unwrap().assigned_device = "/device:GPU:0".into();
        assert_eq!(graph.node(a).unwrap().placement(), "/device:GPU:0");
    }
}
