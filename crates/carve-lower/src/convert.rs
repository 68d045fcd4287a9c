//! Per-cluster conversion context.

use std::collections::HashMap;

use carve_ir::{
    AttrValue, DataType, Edge, EdgeId, Graph, InstRef, IrError, Node, NodeId, Operation, Program,
    Shape,
};

use crate::error::LowerError;
use crate::layout::{Layout, permute};
use crate::registry::{Lowering, LoweringRegistry};
use crate::values::ValueTable;

/// Name of the tensor produced on `port` of `node`.
pub fn tensor_name(node: &str, port: i32) -> String {
    if port == 0 {
        node.to_string()
    } else {
        format!("{node}:{port}")
    }
}

/// Lowers the nodes of one cluster into a fresh [`Program`].
///
/// Callers add one parameter per boundary input edge, then every member in
/// topological order, then call [`Converter::finish`] with the boundary
/// output edges.
pub struct Converter<'a> {
    graph: &'a Graph,
    registry: &'a LoweringRegistry,
    values: &'a ValueTable,
    program: Program,
    /// Tensor name to the instruction holding it inside the cluster.
    names: HashMap<String, InstRef>,
    /// Layout tags; untagged values are in the host default.
    layouts: HashMap<InstRef, Layout>,
    /// Host-layout copies of exit values, keyed by tensor name.
    boundary: HashMap<String, InstRef>,
}

impl<'a> Converter<'a> {
    pub fn new(graph: &'a Graph, registry: &'a LoweringRegistry, values: &'a ValueTable) -> Self {
        Self {
            graph,
            registry,
            values,
            program: Program::new(),
            names: HashMap::new(),
            layouts: HashMap::new(),
            boundary: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Cluster boundary
    // -----------------------------------------------------------------------

    /// Emits a parameter for the value carried by boundary input `edge`.
    ///
    /// When two edges carry the same tensor, the second parameter replaces the
    /// first in the name map.
    pub fn add_parameter(&mut self, edge: &Edge) -> Result<InstRef, LowerError> {
        let producer = self.live_node(edge.src)?;
        let name = tensor_name(&producer.name, edge.src_output);
        let shape = parameter_shape(producer, edge.src_output, self.values)?;
        log::trace!("parameter {name}: {shape}");
        let inst = self.program.add_parameter(name.clone(), shape);
        self.names.insert(name, inst);
        Ok(inst)
    }

    /// Lowers one member node and binds its output in the name map.
    ///
    /// With `is_exit` set, a result left in a non-host layout is converted
    /// back so the value leaves the cluster in host order.
    pub fn add_instruction(&mut self, id: NodeId, is_exit: bool) -> Result<InstRef, LowerError> {
        let graph = self.graph;
        let node = graph.node(id).ok_or(IrError::UnknownNode(id))?;
        let lower = match self.registry.get(&node.op) {
            Some(Lowering::Op(lower)) => lower,
            Some(Lowering::Unimplemented) => {
                return Err(LowerError::Unimplemented {
                    node: node.name.clone(),
                    op: node.op.clone(),
                });
            }
            None => {
                return Err(LowerError::UnregisteredOp {
                    node: node.name.clone(),
                    op: node.op.clone(),
                });
            }
        };

        let args = self.gather_args(node)?;
        let result = lower(self, node, &args)?;
        self.names.insert(node.name.clone(), result);

        if is_exit {
            if let Some(layout) = self.layout_of(result) {
                if !layout.is_host_default() {
                    let host = self.relayout(result, layout, layout.host_default())?;
                    self.boundary.insert(node.name.clone(), host);
                }
            }
        }
        Ok(result)
    }

    /// Declares the program outputs, one per data edge in `output_edges`, and
    /// hands the program over.
    pub fn finish(mut self, output_edges: &[EdgeId]) -> Result<Program, LowerError> {
        let mut outputs = Vec::with_capacity(output_edges.len());
        for &id in output_edges {
            let edge = self.graph.edge(id).ok_or(IrError::UnknownEdge(id))?;
            if edge.is_control() {
                continue;
            }
            let producer = self.live_node(edge.src)?;
            let name = tensor_name(&producer.name, edge.src_output);
            let inst = self
                .boundary
                .get(&name)
                .or_else(|| self.names.get(&name))
                .copied()
                .ok_or_else(|| LowerError::UnresolvedInput {
                    node: producer.name.clone(),
                    input: name.clone(),
                })?;
            outputs.push(inst);
        }
        self.program.set_outputs(outputs)?;
        Ok(self.program)
    }

    /// Arguments of `node` in input-port order, looked up by tensor name.
    fn gather_args(&self, node: &Node) -> Result<Vec<InstRef>, LowerError> {
        let mut inputs: Vec<&Edge> = self
            .graph
            .in_edges(node.id)
            .filter(|e| !e.is_control())
            .collect();
        inputs.sort_by_key(|e| e.dst_input);
        inputs
            .into_iter()
            .map(|e| {
                let src = self.live_node(e.src)?;
                let name = tensor_name(&src.name, e.src_output);
                self.names
                    .get(&name)
                    .copied()
                    .ok_or_else(|| LowerError::UnresolvedInput {
                        node: node.name.clone(),
                        input: name,
                    })
            })
            .collect()
    }

    fn live_node(&self, id: NodeId) -> Result<&'a Node, LowerError> {
        let graph = self.graph;
        Ok(graph.node(id).ok_or(IrError::UnknownNode(id))?)
    }

    // -----------------------------------------------------------------------
    // Building blocks for lowerings
    // -----------------------------------------------------------------------

    /// Appends an instruction to the program.
    pub fn emit(
        &mut self,
        op: Operation,
        shape: Shape,
        args: Vec<InstRef>,
    ) -> Result<InstRef, LowerError> {
        log::trace!("{op}: {shape}");
        Ok(self.program.add_instruction(op, shape, args)?)
    }

    /// Appends a constant.
    pub fn literal(&mut self, data: Vec<u8>, shape: Shape) -> InstRef {
        log::trace!("literal: {shape}");
        self.program.add_literal(data, shape)
    }

    pub fn shape_of(&self, inst: InstRef) -> &Shape {
        &self.program[inst].shape
    }

    /// Layout tag of `inst`, if it was tagged.
    pub fn layout_of(&self, inst: InstRef) -> Option<Layout> {
        self.layouts.get(&inst).copied()
    }

    pub fn set_layout(&mut self, inst: InstRef, layout: Layout) {
        self.layouts.insert(inst, layout);
    }

    /// Brings `inst` from layout `from` to `to` with a transpose followed by
    /// a contiguous copy. Returns `inst` itself when no change is needed.
    pub fn relayout(
        &mut self,
        inst: InstRef,
        from: Layout,
        to: Layout,
    ) -> Result<InstRef, LowerError> {
        let Some(perm) = from.permutation_to(to) else {
            return Ok(inst);
        };
        let shape = self.shape_of(inst).clone();
        if shape.rank() != perm.len() {
            return Ok(inst);
        }
        let dims = permute(&shape.dims, &perm);
        let permuted = Shape::new(shape.dtype, dims);
        let transposed = self.emit(
            Operation::Transpose {
                permutation: perm.to_vec(),
            },
            permuted.clone(),
            vec![inst],
        )?;
        let dense = self.emit(Operation::Contiguous, permuted, vec![transposed])?;
        self.set_layout(transposed, to);
        self.set_layout(dense, to);
        Ok(dense)
    }

    /// Brings `inst` into `to`, treating an untagged value as being in
    /// `default`.
    pub fn expect_layout(
        &mut self,
        inst: InstRef,
        default: Layout,
        to: Layout,
    ) -> Result<InstRef, LowerError> {
        let from = self.layout_of(inst).unwrap_or(default);
        self.relayout(inst, from, to)
    }
}

/// Element type and shape of the value leaving `producer` on `port`.
fn parameter_shape(producer: &Node, port: i32, values: &ValueTable) -> Result<Shape, LowerError> {
    let declared = match producer.attr("dtype").or_else(|| producer.attr("T")) {
        Some(AttrValue::Type(t)) => Some(*t),
        Some(other) => {
            return Err(LowerError::AttrType {
                node: producer.name.clone(),
                attr: if producer.attr("dtype").is_some() {
                    "dtype"
                } else {
                    "T"
                },
                expected: "type",
                found: other.kind(),
            });
        }
        None => None,
    };
    let port_type = usize::try_from(port)
        .ok()
        .and_then(|p| producer.output_types.get(p).copied());

    let (dims, value_type) = if let Some(value) = producer.attr("value") {
        let tensor = value.as_tensor().ok_or_else(|| LowerError::AttrType {
            node: producer.name.clone(),
            attr: "value",
            expected: "tensor",
            found: value.kind(),
        })?;
        (tensor.shape.dims.clone(), Some(tensor.dtype))
    } else if let Some(shape) = producer.attr("shape") {
        let shape = shape.as_shape().ok_or_else(|| LowerError::AttrType {
            node: producer.name.clone(),
            attr: "shape",
            expected: "shape",
            found: shape.kind(),
        })?;
        (shape.dims.clone(), None)
    } else if let Some(index) = producer.attr("index") {
        let index = index.as_int().ok_or_else(|| LowerError::AttrType {
            node: producer.name.clone(),
            attr: "index",
            expected: "int",
            found: index.kind(),
        })?;
        let tensor = values.get(index).ok_or_else(|| LowerError::MissingShape {
            node: producer.name.clone(),
        })?;
        (tensor.shape.dims.clone(), Some(tensor.dtype))
    } else {
        return Err(LowerError::MissingShape {
            node: producer.name.clone(),
        });
    };

    let dtype: DataType = declared
        .or(port_type)
        .or(value_type)
        .ok_or_else(|| LowerError::MissingType {
            node: producer.name.clone(),
            port,
        })?;
    if let Some(actual) = value_type {
        if actual != dtype {
            return Err(LowerError::TypeMismatch {
                node: producer.name.clone(),
                declared: dtype,
                actual,
            });
        }
    }
    Ok(Shape::new(dtype, dims))
}
