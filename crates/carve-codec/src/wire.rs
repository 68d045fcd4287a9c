//! Protobuf wire format for host graphs via prost derive.
//!
//! Field tags follow the layout of the host framework's `GraphDef` where a
//! counterpart exists. Marker nodes and their edges are implied and never
//! written; [`decode_graph`] restores them with the source/sink fixup.

use prost::Message;

use carve_ir::{AttrValue, DataType, Graph, NameAttrList, NodeDef, TensorShape, TensorValue};

use crate::error::CodecError;

/// Host data type codes.
pub mod data_type {
    pub const FLOAT: i32 = 1;
    pub const DOUBLE: i32 = 2;
    pub const INT32: i32 = 3;
    pub const INT16: i32 = 5;
    pub const INT8: i32 = 6;
    pub const INT64: i32 = 9;
    pub const UINT16: i32 = 17;
}

/// A whole host graph.
#[derive(Clone, PartialEq, Message)]
pub struct GraphDefProto {
    #[prost(message, repeated, tag = "1")]
    pub node: Vec<NodeDefProto>,
    #[prost(message, repeated, tag = "2")]
    pub edge: Vec<EdgeDefProto>,
}

/// One operation node.
#[derive(Clone, PartialEq, Message)]
pub struct NodeDefProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub op: String,
    #[prost(string, tag = "4")]
    pub device: String,
    #[prost(message, repeated, tag = "5")]
    pub attr: Vec<AttrEntryProto>,
    #[prost(string, tag = "6")]
    pub assigned_device: String,
    #[prost(int32, repeated, tag = "7")]
    pub input_types: Vec<i32>,
    #[prost(int32, repeated, tag = "8")]
    pub output_types: Vec<i32>,
}

/// One edge; control edges use port -1 on both ends.
#[derive(Clone, PartialEq, Message)]
pub struct EdgeDefProto {
    #[prost(string, tag = "1")]
    pub src: String,
    #[prost(int32, tag = "2")]
    pub src_output: i32,
    #[prost(string, tag = "3")]
    pub dst: String,
    #[prost(int32, tag = "4")]
    pub dst_input: i32,
}

/// A keyed attribute; repeated to keep the order of function payloads.
#[derive(Clone, PartialEq, Message)]
pub struct AttrEntryProto {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<AttrValueProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AttrValueProto {
    #[prost(oneof = "attr_value_proto::Value", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13")]
    pub value: Option<attr_value_proto::Value>,
}

pub mod attr_value_proto {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(int64, tag = "1")]
        I(i64),
        #[prost(float, tag = "2")]
        F(f32),
        #[prost(bool, tag = "3")]
        B(bool),
        #[prost(string, tag = "4")]
        S(String),
        #[prost(int32, tag = "5")]
        Type(i32),
        #[prost(message, tag = "6")]
        Shape(super::TensorShapeProto),
        #[prost(message, tag = "7")]
        Tensor(super::TensorProto),
        #[prost(message, tag = "8")]
        Func(super::NameAttrListProto),
        #[prost(message, tag = "9")]
        Ints(super::IntList),
        #[prost(message, tag = "10")]
        Floats(super::FloatList),
        #[prost(message, tag = "11")]
        Strs(super::StringList),
        #[prost(message, tag = "12")]
        Types(super::IntList),
        #[prost(message, tag = "13")]
        Funcs(super::FuncList),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorShapeProto {
    #[prost(int64, repeated, tag = "1")]
    pub dim: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorProto {
    #[prost(int32, tag = "1")]
    pub dtype: i32,
    #[prost(message, optional, tag = "2")]
    pub shape: Option<TensorShapeProto>,
    #[prost(bytes = "vec", tag = "3")]
    pub content: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NameAttrListProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub attr: Vec<AttrEntryProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct IntList {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StringList {
    #[prost(string, repeated, tag = "1")]
    pub value: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FuncList {
    #[prost(message, repeated, tag = "1")]
    pub value: Vec<NameAttrListProto>,
}

// ---------------------------------------------------------------------------
// Graph <-> proto
// ---------------------------------------------------------------------------

/// Serializes the operation nodes and edges of `graph`.
pub fn encode_graph(graph: &Graph) -> Vec<u8> {
    graph_to_proto(graph).encode_to_vec()
}

/// Parses a serialized graph and adds the marker edges.
pub fn decode_graph(bytes: &[u8]) -> Result<Graph, CodecError> {
    let proto = GraphDefProto::decode(bytes)?;
    graph_from_proto(&proto)
}

pub fn graph_to_proto(graph: &Graph) -> GraphDefProto {
    let node = graph
        .op_nodes()
        .map(|n| NodeDefProto {
            name: n.name.clone(),
            op: n.op.clone(),
            device: n.requested_device.clone(),
            attr: n
                .attrs
                .iter()
                .map(|(k, v)| entry_to_proto(k, v))
                .collect(),
            assigned_device: n.assigned_device.clone(),
            input_types: n.input_types.iter().map(|&t| dtype_to_code(t)).collect(),
            output_types: n.output_types.iter().map(|&t| dtype_to_code(t)).collect(),
        })
        .collect();

    let is_op = |id| graph.node(id).is_some_and(|n| n.is_op());
    let edge = graph
        .edges()
        .filter(|e| is_op(e.src) && is_op(e.dst))
        .filter_map(|e| {
            let src = graph.node(e.src)?;
            let dst = graph.node(e.dst)?;
            Some(EdgeDefProto {
                src: src.name.clone(),
                src_output: e.src_output,
                dst: dst.name.clone(),
                dst_input: e.dst_input,
            })
        })
        .collect();

    GraphDefProto { node, edge }
}

pub fn graph_from_proto(proto: &GraphDefProto) -> Result<Graph, CodecError> {
    let mut graph = Graph::new();
    for node in &proto.node {
        let mut def = NodeDef::new(node.name.clone(), node.op.clone())
            .device(node.device.clone())
            .inputs(codes_to_dtypes(&node.input_types)?)
            .outputs(codes_to_dtypes(&node.output_types)?);
        for entry in &node.attr {
            let value = entry_value(entry)?;
            def = def.attr(entry.key.clone(), value);
        }
        let id = graph.add_node(def)?;
        if let Some(n) = graph.node_mut(id) {
            n.assigned_device = node.assigned_device.clone();
        }
    }

    for edge in &proto.edge {
        let src = graph
            .find_node(&edge.src)
            .map(|n| n.id)
            .ok_or_else(|| CodecError::UnknownNode(edge.src.clone()))?;
        let dst = graph
            .find_node(&edge.dst)
            .map(|n| n.id)
            .ok_or_else(|| CodecError::UnknownNode(edge.dst.clone()))?;
        graph.add_edge(src, edge.src_output, dst, edge.dst_input)?;
    }

    graph.fixup_source_and_sink_edges()?;
    log::debug!(
        "decoded graph with {} node(s) and {} edge(s)",
        proto.node.len(),
        proto.edge.len()
    );
    Ok(graph)
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

pub fn dtype_to_code(dtype: DataType) -> i32 {
    match dtype {
        DataType::Float => data_type::FLOAT,
        DataType::Double => data_type::DOUBLE,
        DataType::Int64 => data_type::INT64,
        DataType::Int32 => data_type::INT32,
        DataType::Int16 => data_type::INT16,
        DataType::UInt16 => data_type::UINT16,
        DataType::Int8 => data_type::INT8,
    }
}

pub fn code_to_dtype(code: i32) -> Result<DataType, CodecError> {
    match code {
        data_type::FLOAT => Ok(DataType::Float),
        data_type::DOUBLE => Ok(DataType::Double),
        data_type::INT64 => Ok(DataType::Int64),
        data_type::INT32 => Ok(DataType::Int32),
        data_type::INT16 => Ok(DataType::Int16),
        data_type::UINT16 => Ok(DataType::UInt16),
        data_type::INT8 => Ok(DataType::Int8),
        other => Err(CodecError::UnknownDataType(other)),
    }
}

fn codes_to_dtypes(codes: &[i32]) -> Result<Vec<DataType>, CodecError> {
    codes.iter().map(|&c| code_to_dtype(c)).collect()
}

fn entry_to_proto(key: &str, value: &AttrValue) -> AttrEntryProto {
    AttrEntryProto {
        key: key.to_string(),
        value: Some(attr_to_proto(value)),
    }
}

fn shape_to_proto(shape: &TensorShape) -> TensorShapeProto {
    TensorShapeProto {
        dim: shape.dims.iter().map(|&d| d as i64).collect(),
    }
}

fn func_to_proto(func: &NameAttrList) -> NameAttrListProto {
    NameAttrListProto {
        name: func.name.clone(),
        attr: func.attrs.iter().map(|(k, v)| entry_to_proto(k, v)).collect(),
    }
}

pub fn attr_to_proto(value: &AttrValue) -> AttrValueProto {
    use attr_value_proto::Value;
    let value = match value {
        AttrValue::Int(v) => Value::I(*v),
        AttrValue::Float(v) => Value::F(*v),
        AttrValue::Bool(v) => Value::B(*v),
        AttrValue::Str(v) => Value::S(v.clone()),
        AttrValue::Type(t) => Value::Type(dtype_to_code(*t)),
        AttrValue::Shape(s) => Value::Shape(shape_to_proto(s)),
        AttrValue::Tensor(t) => Value::Tensor(TensorProto {
            dtype: dtype_to_code(t.dtype),
            shape: Some(shape_to_proto(&t.shape)),
            content: t.content.clone(),
        }),
        AttrValue::Func(f) => Value::Func(func_to_proto(f)),
        AttrValue::Ints(v) => Value::Ints(IntList { value: v.clone() }),
        AttrValue::Floats(v) => Value::Floats(FloatList { value: v.clone() }),
        AttrValue::Strs(v) => Value::Strs(StringList { value: v.clone() }),
        AttrValue::Types(v) => Value::Types(IntList {
            value: v.iter().map(|&t| i64::from(dtype_to_code(t))).collect(),
        }),
        AttrValue::Funcs(v) => Value::Funcs(FuncList {
            value: v.iter().map(func_to_proto).collect(),
        }),
    };
    AttrValueProto { value: Some(value) }
}

fn entry_value(entry: &AttrEntryProto) -> Result<AttrValue, CodecError> {
    let value = entry
        .value
        .as_ref()
        .ok_or_else(|| CodecError::EmptyAttr(entry.key.clone()))?;
    attr_from_proto(&entry.key, value)
}

fn shape_from_proto(shape: &TensorShapeProto) -> Result<TensorShape, CodecError> {
    let dims = shape
        .dim
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| CodecError::InvalidValue {
                record: "shape".into(),
                field: "dim",
                value: d.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TensorShape::new(dims))
}

fn func_from_proto(func: &NameAttrListProto) -> Result<NameAttrList, CodecError> {
    let mut list = NameAttrList::new(func.name.clone());
    for entry in &func.attr {
        list.push(entry.key.clone(), entry_value(entry)?);
    }
    Ok(list)
}

pub fn attr_from_proto(key: &str, value: &AttrValueProto) -> Result<AttrValue, CodecError> {
    use attr_value_proto::Value;
    let value = value
        .value
        .as_ref()
        .ok_or_else(|| CodecError::EmptyAttr(key.to_string()))?;
    Ok(match value {
        Value::I(v) => AttrValue::Int(*v),
        Value::F(v) => AttrValue::Float(*v),
        Value::B(v) => AttrValue::Bool(*v),
        Value::S(v) => AttrValue::Str(v.clone()),
        Value::Type(code) => AttrValue::Type(code_to_dtype(*code)?),
        Value::Shape(s) => AttrValue::Shape(shape_from_proto(s)?),
        Value::Tensor(t) => AttrValue::Tensor(TensorValue {
            dtype: code_to_dtype(t.dtype)?,
            shape: match &t.shape {
                Some(s) => shape_from_proto(s)?,
                None => TensorShape::default(),
            },
            content: t.content.clone(),
        }),
        Value::Func(f) => AttrValue::Func(func_from_proto(f)?),
        Value::Ints(l) => AttrValue::Ints(l.value.clone()),
        Value::Floats(l) => AttrValue::Floats(l.value.clone()),
        Value::Strs(l) => AttrValue::Strs(l.value.clone()),
        Value::Types(l) => AttrValue::Types(
            l.value
                .iter()
                .map(|&c| {
                    i32::try_from(c)
                        .map_err(|_| CodecError::UnknownDataType(i32::MAX))
                        .and_then(code_to_dtype)
                })
                .collect::<Result<_, _>>()?,
        ),
        Value::Funcs(l) => AttrValue::Funcs(
            l.value
                .iter()
                .map(func_from_proto)
                .collect::<Result<_, _>>()?,
        ),
    })
}
