use carve_ir::{AttrValue, DataType, Graph, NodeDef, NodeId, Program, TensorShape, TensorValue};
use carve_lower::ValueTable;
use carve_opt::{OffloadConfig, OffloadReport};

/// A float placeholder with a static shape.
#[allow(dead_code)]
pub fn placeholder(g: &mut Graph, name: &str, dims: &[usize]) -> NodeId {
    g.add_node(
        NodeDef::new(name, "Placeholder")
            .attr("dtype", AttrValue::Type(DataType::Float))
            .attr("shape", AttrValue::Shape(TensorShape::new(dims.to_vec())))
            .outputs(vec![DataType::Float]),
    )
    .expect("add placeholder")
}

/// A float node with `inputs` data inputs and one output.
#[allow(dead_code)]
pub fn op(g: &mut Graph, name: &str, op: &str, inputs: usize) -> NodeId {
    g.add_node(
        NodeDef::new(name, op)
            .attr("T", AttrValue::Type(DataType::Float))
            .inputs(vec![DataType::Float; inputs])
            .outputs(vec![DataType::Float]),
    )
    .expect("add op")
}

/// A zero-filled float constant.
#[allow(dead_code)]
pub fn constant(g: &mut Graph, name: &str, dims: &[usize]) -> NodeId {
    let value = TensorValue::zeros(DataType::Float, TensorShape::new(dims.to_vec()));
    g.add_node(
        NodeDef::new(name, "Const")
            .attr("dtype", AttrValue::Type(DataType::Float))
            .attr("value", AttrValue::Tensor(value))
            .outputs(vec![DataType::Float]),
    )
    .expect("add const")
}

/// A 2-D convolution with unit dilation.
#[allow(dead_code)]
pub fn conv2d(g: &mut Graph, name: &str, strides: [i64; 4], padding: &str) -> NodeId {
    g.add_node(
        NodeDef::new(name, "Conv2D")
            .attr("T", AttrValue::Type(DataType::Float))
            .attr("strides", AttrValue::Ints(strides.to_vec()))
            .attr("padding", AttrValue::Str(padding.to_string()))
            .inputs(vec![DataType::Float, DataType::Float])
            .outputs(vec![DataType::Float]),
    )
    .expect("add conv")
}

/// Runs the offload pass with default settings.
#[allow(dead_code)]
pub fn offload(g: &mut Graph) -> OffloadReport {
    carve_opt::offload(g, &ValueTable::new(), &OffloadConfig::default()).expect("offload failed")
}

/// Decodes the program carried by the invocation named `name`.
#[allow(dead_code)]
pub fn program_of(g: &Graph, name: &str) -> Program {
    let node = g
        .find_node(name)
        .unwrap_or_else(|| panic!("no node named {name}"));
    let function = node
        .attr("function")
        .and_then(|f| f.as_func())
        .expect("invocation without function");
    carve_codec::decode(function).expect("function decode failed")
}

/// Sorted names of all operation nodes.
#[allow(dead_code)]
pub fn op_names(g: &Graph) -> Vec<String> {
    let mut names: Vec<_> = g.op_nodes().map(|n| n.name.clone()).collect();
    names.sort();
    names
}
