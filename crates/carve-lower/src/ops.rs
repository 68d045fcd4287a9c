//! Built-in op lowerings.
//!
//! Each lowering validates the attributes it needs, brings its arguments into
//! the layout the accelerator expects and emits the instructions for one host
//! node. Window geometry follows the host's own output-size rule so that an
//! offloaded op produces the same shape as the host kernel.

use carve_ir::{
    ActivationMode, AttrValue, Convolution, InstRef, Node, Operation, PaddingMode, Pooling,
    PoolingMode, Shape,
};

use crate::convert::Converter;
use crate::error::LowerError;
use crate::layout::Layout;

// ---------------------------------------------------------------------------
// Lowerings
// ---------------------------------------------------------------------------

pub(crate) fn lower_const(
    cx: &mut Converter<'_>,
    node: &Node,
    args: &[InstRef],
) -> Result<InstRef, LowerError> {
    let [] = expect_args::<0>(node, args)?;
    let value = required(node, "value")?;
    let tensor = value.as_tensor().ok_or_else(|| attr_type(node, "value", "tensor", value))?;
    if let Some(declared) = node.attr("dtype") {
        let declared = declared
            .as_type()
            .ok_or_else(|| attr_type(node, "dtype", "type", declared))?;
        if declared != tensor.dtype {
            return Err(LowerError::TypeMismatch {
                node: node.name.clone(),
                declared,
                actual: tensor.dtype,
            });
        }
    }
    if !tensor.is_consistent() {
        return Err(LowerError::BadLiteral {
            node: node.name.clone(),
            expected: tensor
                .shape
                .num_elements()
                .saturating_mul(tensor.dtype.size_in_bytes()),
            found: tensor.content.len(),
        });
    }
    let shape = Shape::new(tensor.dtype, tensor.shape.dims.clone());
    Ok(cx.literal(tensor.content.clone(), shape))
}

pub(crate) fn lower_conv2d(
    cx: &mut Converter<'_>,
    node: &Node,
    args: &[InstRef],
) -> Result<InstRef, LowerError> {
    let [input, filter] = expect_args::<2>(node, args)?;
    check_data_format(node)?;
    let stride = spatial(node, "strides", None)?;
    let dilation = spatial(node, "dilations", Some([1, 1]))?;
    let padding_mode = padding(node)?;
    expect_rank(cx, node, input, 4, "input")?;
    expect_rank(cx, node, filter, 4, "filter")?;

    let x = cx.expect_layout(input, Layout::Nhwc, Layout::Nchw)?;
    let w = cx.expect_layout(filter, Layout::Hwio, Layout::Oihw)?;
    let xs = cx.shape_of(x).clone();
    let ws = cx.shape_of(w).clone();
    if ws.dims[1] != xs.dims[1] {
        return Err(geometry(
            node,
            format!(
                "filter expects {} input channels, input has {}",
                ws.dims[1], xs.dims[1]
            ),
        ));
    }

    let mut out = [0; 2];
    let mut pad = [0; 2];
    for i in 0..2 {
        let window = window_geometry(xs.dims[2 + i], ws.dims[2 + i], dilation[i], stride[i], padding_mode)
            .map_err(|reason| geometry(node, reason))?;
        out[i] = window.out;
        pad[i] = window.pad;
    }

    let op = Operation::Convolution(Convolution {
        padding: pad,
        stride,
        dilation,
        padding_mode,
    });
    let shape = Shape::new(xs.dtype, vec![xs.dims[0], ws.dims[0], out[0], out[1]]);
    let conv = cx.emit(op, shape, vec![x, w])?;
    cx.set_layout(conv, Layout::Nchw);
    Ok(conv)
}

pub(crate) fn lower_activation(
    cx: &mut Converter<'_>,
    node: &Node,
    args: &[InstRef],
) -> Result<InstRef, LowerError> {
    let [x] = expect_args::<1>(node, args)?;
    let mode = match node.op.as_str() {
        "Relu" => ActivationMode::Relu,
        "Sigmoid" => ActivationMode::Sigmoid,
        "Tanh" => ActivationMode::Tanh,
        other => {
            return Err(LowerError::UnregisteredOp {
                node: node.name.clone(),
                op: other.to_string(),
            });
        }
    };
    let shape = cx.shape_of(x).clone();
    let result = cx.emit(Operation::Activation { mode }, shape, vec![x])?;
    inherit_layout(cx, x, result);
    Ok(result)
}

pub(crate) fn lower_bias_add(
    cx: &mut Converter<'_>,
    node: &Node,
    args: &[InstRef],
) -> Result<InstRef, LowerError> {
    let [x, bias] = expect_args::<2>(node, args)?;
    check_data_format(node)?;
    let xs = cx.shape_of(x).clone();
    let bs = cx.shape_of(bias).clone();
    if xs.rank() == 0 {
        return Err(geometry(node, "bias-add input must have at least one dimension".into()));
    }
    let axis = match cx.layout_of(x) {
        Some(Layout::Nchw) => 1,
        _ => xs.rank() - 1,
    };
    if bs.rank() != 1 || bs.dims[0] != xs.dims[axis] {
        return Err(geometry(
            node,
            format!("bias shape {bs} does not match channel {axis} of {xs}"),
        ));
    }

    let broadcast = cx.emit(Operation::Broadcast { axis }, xs.clone(), vec![bias])?;
    let sum = cx.emit(Operation::Add, xs, vec![x, broadcast])?;
    inherit_layout(cx, x, broadcast);
    inherit_layout(cx, x, sum);
    Ok(sum)
}

pub(crate) fn lower_pool(
    cx: &mut Converter<'_>,
    node: &Node,
    args: &[InstRef],
) -> Result<InstRef, LowerError> {
    let [input] = expect_args::<1>(node, args)?;
    let mode = match node.op.as_str() {
        "MaxPool" => PoolingMode::Max,
        "AvgPool" => PoolingMode::Average,
        other => {
            return Err(LowerError::UnregisteredOp {
                node: node.name.clone(),
                op: other.to_string(),
            });
        }
    };
    check_data_format(node)?;
    let lengths = spatial(node, "ksize", None)?;
    let stride = spatial(node, "strides", None)?;
    let padding_mode = padding(node)?;
    expect_rank(cx, node, input, 4, "input")?;

    let x = cx.expect_layout(input, Layout::Nhwc, Layout::Nchw)?;
    let xs = cx.shape_of(x).clone();
    let mut out = [0; 2];
    let mut pad = [0; 2];
    for i in 0..2 {
        let window = window_geometry(xs.dims[2 + i], lengths[i], 1, stride[i], padding_mode)
            .map_err(|reason| geometry(node, reason))?;
        out[i] = window.out;
        pad[i] = window.pad;
    }

    let op = Operation::Pooling(Pooling {
        mode,
        padding: pad,
        stride,
        lengths,
    });
    let shape = Shape::new(xs.dtype, vec![xs.dims[0], xs.dims[1], out[0], out[1]]);
    let pool = cx.emit(op, shape, vec![x])?;
    cx.set_layout(pool, Layout::Nchw);
    Ok(pool)
}

/// Forwards the argument; emits nothing.
pub(crate) fn lower_identity(
    _cx: &mut Converter<'_>,
    node: &Node,
    args: &[InstRef],
) -> Result<InstRef, LowerError> {
    let [x] = expect_args::<1>(node, args)?;
    Ok(x)
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Output size and leading padding of one spatial dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub out: usize,
    pub pad: usize,
}

/// Windowed output size for an input of `input` elements, a window of
/// `kernel` taps spread by `dilation`, and `stride`.
pub fn window_geometry(
    input: usize,
    kernel: usize,
    dilation: usize,
    stride: usize,
    mode: PaddingMode,
) -> Result<Window, String> {
    if kernel == 0 || dilation == 0 || stride == 0 {
        return Err(format!(
            "window {kernel}, dilation {dilation} and stride {stride} must be positive"
        ));
    }
    let effective = (kernel - 1)
        .checked_mul(dilation)
        .and_then(|span| span.checked_add(1))
        .ok_or_else(|| format!("window {kernel} with dilation {dilation} is too large"))?;
    match mode {
        PaddingMode::Valid | PaddingMode::Default => {
            if input < effective {
                return Err(format!(
                    "input size {input} is smaller than the effective window {effective}"
                ));
            }
            Ok(Window {
                out: (input - effective) / stride + 1,
                pad: 0,
            })
        }
        PaddingMode::Same => {
            let out = input.div_ceil(stride);
            let needed = out.saturating_sub(1).saturating_mul(stride).saturating_add(effective);
            let total = needed.saturating_sub(input);
            Ok(Window {
                out,
                pad: total / 2,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute helpers
// ---------------------------------------------------------------------------

fn expect_args<const N: usize>(node: &Node, args: &[InstRef]) -> Result<[InstRef; N], LowerError> {
    <[InstRef; N]>::try_from(args).map_err(|_| LowerError::ArgCount {
        node: node.name.clone(),
        expected: N,
        found: args.len(),
    })
}

fn required<'n>(node: &'n Node, attr: &'static str) -> Result<&'n AttrValue, LowerError> {
    node.attr(attr).ok_or_else(|| LowerError::MissingAttr {
        node: node.name.clone(),
        attr,
    })
}

fn attr_type(node: &Node, attr: &'static str, expected: &'static str, found: &AttrValue) -> LowerError {
    LowerError::AttrType {
        node: node.name.clone(),
        attr,
        expected,
        found: found.kind(),
    }
}

fn unsupported(node: &Node, attr: &'static str, value: impl std::fmt::Debug) -> LowerError {
    LowerError::UnsupportedAttr {
        node: node.name.clone(),
        attr,
        value: format!("{value:?}"),
    }
}

fn geometry(node: &Node, reason: String) -> LowerError {
    LowerError::InvalidGeometry {
        node: node.name.clone(),
        reason,
    }
}

/// Only NHWC host data is lowered.
fn check_data_format(node: &Node) -> Result<(), LowerError> {
    match node.attr("data_format") {
        None => Ok(()),
        Some(value) => {
            let format = value
                .as_str()
                .ok_or_else(|| attr_type(node, "data_format", "string", value))?;
            if format == "NHWC" {
                Ok(())
            } else {
                Err(unsupported(node, "data_format", format))
            }
        }
    }
}

/// Height and width entries of a 4-element NHWC list attribute.
fn spatial(
    node: &Node,
    attr: &'static str,
    default: Option<[usize; 2]>,
) -> Result<[usize; 2], LowerError> {
    let value = match (node.attr(attr), default) {
        (Some(value), _) => value,
        (None, Some(default)) => return Ok(default),
        (None, None) => {
            return Err(LowerError::MissingAttr {
                node: node.name.clone(),
                attr,
            });
        }
    };
    let list = value.as_ints().ok_or_else(|| attr_type(node, attr, "list(int)", value))?;
    if list.len() != 4 {
        return Err(unsupported(node, attr, list));
    }
    let h = usize::try_from(list[1]).ok().filter(|&v| v > 0);
    let w = usize::try_from(list[2]).ok().filter(|&v| v > 0);
    match (h, w) {
        (Some(h), Some(w)) => Ok([h, w]),
        _ => Err(unsupported(node, attr, list)),
    }
}

fn padding(node: &Node) -> Result<PaddingMode, LowerError> {
    let value = required(node, "padding")?;
    match value.as_str() {
        Some("SAME") => Ok(PaddingMode::Same),
        Some("VALID") => Ok(PaddingMode::Valid),
        Some(other) => Err(unsupported(node, "padding", other)),
        None => Err(attr_type(node, "padding", "string", value)),
    }
}

fn expect_rank(
    cx: &Converter<'_>,
    node: &Node,
    inst: InstRef,
    rank: usize,
    what: &str,
) -> Result<(), LowerError> {
    let shape = cx.shape_of(inst);
    if shape.rank() == rank {
        Ok(())
    } else {
        Err(geometry(node, format!("{what} must have rank {rank}, found {shape}")))
    }
}

fn inherit_layout(cx: &mut Converter<'_>, from: InstRef, to: InstRef) {
    if let Some(layout) = cx.layout_of(from) {
        cx.set_layout(to, layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LoweringRegistry;
    use crate::values::ValueTable;
    use carve_ir::{DataType, EdgeId, Graph, NodeDef, NodeId, Program, TensorShape, TensorValue};

    fn placeholder(g: &mut Graph, name: &str, dims: &[usize]) -> NodeId {
        g.add_node(
            NodeDef::new(name, "Placeholder")
                .attr("dtype", AttrValue::Type(DataType::Float))
                .attr("shape", AttrValue::Shape(TensorShape::new(dims.to_vec())))
                .outputs(vec![DataType::Float]),
        )
        .unwrap()
    }

    fn filter(g: &mut Graph, name: &str, dims: &[usize]) -> NodeId {
        let value = TensorValue::zeros(DataType::Float, TensorShape::new(dims.to_vec()));
        g.add_node(
            NodeDef::new(name, "Const")
                .attr("dtype", AttrValue::Type(DataType::Float))
                .attr("value", AttrValue::Tensor(value))
                .outputs(vec![DataType::Float]),
        )
        .unwrap()
    }

    fn sink(g: &mut Graph, name: &str) -> NodeId {
        g.add_node(NodeDef::new(name, "Fetch").inputs(vec![DataType::Float]))
            .unwrap()
    }

    /// Lowers `members` in order, with parameters for `inputs` and outputs
    /// for `outputs`; the last member is the exit.
    fn lower(g: &Graph, inputs: &[EdgeId], members: &[NodeId], outputs: &[EdgeId]) -> Result<Program, LowerError> {
        let registry = LoweringRegistry::with_builtins();
        let values = ValueTable::new();
        let mut cx = Converter::new(g, &registry, &values);
        for &e in inputs {
            cx.add_parameter(g.edge(e).unwrap())?;
        }
        for (i, &m) in members.iter().enumerate() {
            cx.add_instruction(m, i + 1 == members.len())?;
        }
        cx.finish(outputs)
    }

    fn conv(g: &mut Graph, name: &str, strides: Vec<i64>, padding: &str) -> NodeId {
        g.add_node(
            NodeDef::new(name, "Conv2D")
                .attr("T", AttrValue::Type(DataType::Float))
                .attr("strides", AttrValue::Ints(strides))
                .attr("padding", AttrValue::Str(padding.into()))
                .inputs(vec![DataType::Float, DataType::Float])
                .outputs(vec![DataType::Float]),
        )
        .unwrap()
    }

    #[test]
    fn conv_defaults_dilation_and_reads_hw_strides() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[1, 9, 7, 3]);
        let w = filter(&mut g, "w", &[3, 3, 3, 4]);
        let c = conv(&mut g, "c", vec![1, 2, 1, 1], "VALID");
        let q = sink(&mut g, "q");
        let xc = g.add_edge(x, 0, c, 0).unwrap();
        g.add_edge(w, 0, c, 1).unwrap();
        let cq = g.add_edge(c, 0, q, 0).unwrap();

        let p = lower(&g, &[xc], &[w, c], &[cq]).unwrap();
        let tags: Vec<_> = p.iter().map(|(_, i)| i.op.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "parameter",
                "literal",
                "transpose",
                "contiguous",
                "transpose",
                "contiguous",
                "convolution",
                "transpose",
                "contiguous",
            ]
        );
        let (_, conv) = p.iter().find(|(_, i)| i.op.tag() == "convolution").unwrap();
        let Operation::Convolution(op) = &conv.op else {
            unreachable!()
        };
        assert_eq!(op.dilation, [1, 1]);
        assert_eq!(op.stride, [2, 1]);
        assert_eq!(op.padding, [0, 0]);
        assert_eq!(op.padding_mode, PaddingMode::Valid);
        assert_eq!(conv.shape.dims, vec![1, 4, 4, 5]);

        // the output leaves in NHWC
        let out = &p[p.outputs()[0]];
        assert_eq!(out.op, Operation::Contiguous);
        assert_eq!(out.shape.dims, vec![1, 4, 5, 4]);
    }

    #[test]
    fn transposes_are_inserted_before_conv_inputs() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[1, 8, 8, 3]);
        let w = filter(&mut g, "w", &[3, 3, 3, 4]);
        let c = conv(&mut g, "c", vec![1, 1, 1, 1], "SAME");
        let xc = g.add_edge(x, 0, c, 0).unwrap();
        g.add_edge(w, 0, c, 1).unwrap();

        let p = lower(&g, &[xc], &[w, c], &[]).unwrap();
        let insts: Vec<_> = p.iter().map(|(_, i)| i).collect();
        assert_eq!(
            insts[2].op,
            Operation::Transpose {
                permutation: vec![0, 3, 1, 2]
            }
        );
        assert_eq!(insts[3].shape.dims, vec![1, 3, 8, 8]);
        assert_eq!(
            insts[4].op,
            Operation::Transpose {
                permutation: vec![3, 2, 0, 1]
            }
        );
        assert_eq!(insts[5].shape.dims, vec![4, 3, 3, 3]);
        assert_eq!(insts[6].shape.dims, vec![1, 4, 8, 8]);
        let Operation::Convolution(op) = &insts[6].op else {
            unreachable!()
        };
        assert_eq!(op.padding, [1, 1]);
    }

    #[test]
    fn conv_relu_chain_stays_in_nchw_until_exit() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[1, 4, 4, 2]);
        let w = filter(&mut g, "w", &[1, 1, 2, 2]);
        let c = conv(&mut g, "c", vec![1, 1, 1, 1], "VALID");
        let r = g
            .add_node(
                NodeDef::new("r", "Relu")
                    .inputs(vec![DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        let q = sink(&mut g, "q");
        let xc = g.add_edge(x, 0, c, 0).unwrap();
        g.add_edge(w, 0, c, 1).unwrap();
        g.add_edge(c, 0, r, 0).unwrap();
        let rq = g.add_edge(r, 0, q, 0).unwrap();

        let p = lower(&g, &[xc], &[w, c, r], &[rq]).unwrap();
        let tags: Vec<_> = p.iter().map(|(_, i)| i.op.tag()).collect();
        // one relayout for x, one for w, activation in NCHW, one back at the exit
        assert_eq!(tags.iter().filter(|t| **t == "transpose").count(), 3);
        assert_eq!(tags[tags.len() - 3], "activation");
        assert_eq!(p[p.outputs()[0]].shape.dims, vec![1, 4, 4, 2]);
    }

    #[test]
    fn missing_strides_is_an_error() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[1, 4, 4, 1]);
        let w = filter(&mut g, "w", &[1, 1, 1, 1]);
        let c = g
            .add_node(
                NodeDef::new("c", "Conv2D")
                    .attr("padding", AttrValue::Str("VALID".into()))
                    .inputs(vec![DataType::Float, DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        let xc = g.add_edge(x, 0, c, 0).unwrap();
        g.add_edge(w, 0, c, 1).unwrap();
        let err = lower(&g, &[xc], &[w, c], &[]).unwrap_err();
        assert!(
            matches!(err, LowerError::MissingAttr { attr: "strides", .. }),
            "{err}"
        );
    }

    #[test]
    fn nchw_data_format_is_rejected() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[1, 1, 4, 4]);
        let w = filter(&mut g, "w", &[1, 1, 1, 1]);
        let c = conv(&mut g, "c", vec![1, 1, 1, 1], "VALID");
        g.node_mut(c)
            .unwrap()
            .attrs
            .insert("data_format".into(), AttrValue::Str("NCHW".into()));
        let xc = g.add_edge(x, 0, c, 0).unwrap();
        g.add_edge(w, 0, c, 1).unwrap();
        let err = lower(&g, &[xc], &[w, c], &[]).unwrap_err();
        assert!(matches!(err, LowerError::UnsupportedAttr { .. }), "{err}");
    }

    #[test]
    fn wrong_attribute_type_is_reported() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[1, 4, 4, 1]);
        let w = filter(&mut g, "w", &[1, 1, 1, 1]);
        let c = conv(&mut g, "c", vec![1, 1, 1, 1], "VALID");
        g.node_mut(c)
            .unwrap()
            .attrs
            .insert("padding".into(), AttrValue::Int(0));
        let xc = g.add_edge(x, 0, c, 0).unwrap();
        g.add_edge(w, 0, c, 1).unwrap();
        let err = lower(&g, &[xc], &[w, c], &[]).unwrap_err();
        assert!(
            matches!(err, LowerError::AttrType { attr: "padding", found: "int", .. }),
            "{err}"
        );
    }

    #[test]
    fn bias_add_broadcasts_on_the_last_axis() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[2, 5]);
        let b = filter(&mut g, "b", &[5]);
        let add = g
            .add_node(
                NodeDef::new("add", "BiasAdd")
                    .inputs(vec![DataType::Float, DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        let xa = g.add_edge(x, 0, add, 0).unwrap();
        g.add_edge(b, 0, add, 1).unwrap();

        let p = lower(&g, &[xa], &[b, add], &[]).unwrap();
        let insts: Vec<_> = p.iter().map(|(_, i)| i).collect();
        assert_eq!(insts[2].op, Operation::Broadcast { axis: 1 });
        assert_eq!(insts[2].shape.dims, vec![2, 5]);
        assert_eq!(insts[3].op, Operation::Add);
    }

    #[test]
    fn max_pool_geometry() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[1, 6, 6, 2]);
        let pool = g
            .add_node(
                NodeDef::new("pool", "MaxPool")
                    .attr("ksize", AttrValue::Ints(vec![1, 2, 2, 1]))
                    .attr("strides", AttrValue::Ints(vec![1, 2, 2, 1]))
                    .attr("padding", AttrValue::Str("VALID".into()))
                    .inputs(vec![DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        let r = g
            .add_node(
                NodeDef::new("r", "Sigmoid")
                    .inputs(vec![DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        let xp = g.add_edge(x, 0, pool, 0).unwrap();
        g.add_edge(pool, 0, r, 0).unwrap();

        let p = lower(&g, &[xp], &[pool, r], &[]).unwrap();
        let (_, inst) = p.iter().find(|(_, i)| i.op.tag() == "pooling").unwrap();
        assert_eq!(
            inst.op,
            Operation::Pooling(Pooling {
                mode: PoolingMode::Max,
                padding: [0, 0],
                stride: [2, 2],
                lengths: [2, 2],
            })
        );
        assert_eq!(inst.shape.dims, vec![1, 2, 3, 3]);
    }

    #[test]
    fn identity_emits_nothing() {
        let mut g = Graph::new();
        let x = placeholder(&mut g, "x", &[3]);
        let id = g
            .add_node(
                NodeDef::new("id", "Identity")
                    .inputs(vec![DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        let q = sink(&mut g, "q");
        let xi = g.add_edge(x, 0, id, 0).unwrap();
        let iq = g.add_edge(id, 0, q, 0).unwrap();
        let p = lower(&g, &[xi], &[id], &[iq]).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.outputs().len(), 1);
    }

    #[test]
    fn literal_content_must_match_shape() {
        let mut g = Graph::new();
        let mut value = TensorValue::zeros(DataType::Float, TensorShape::new(vec![2, 2]));
        value.content.truncate(12);
        let c = g
            .add_node(
                NodeDef::new("c", "Const")
                    .attr("value", AttrValue::Tensor(value))
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        let err = lower(&g, &[], &[c], &[]).unwrap_err();
        assert!(
            matches!(err, LowerError::BadLiteral { expected: 16, found: 12, .. }),
            "{err}"
        );
    }

    #[test]
    fn window_geometry_matches_host_rule() {
        let valid = window_geometry(9, 3, 1, 2, PaddingMode::Valid).unwrap();
        assert_eq!(valid, Window { out: 4, pad: 0 });
        let same = window_geometry(5, 3, 1, 1, PaddingMode::Same).unwrap();
        assert_eq!(same, Window { out: 5, pad: 1 });
        let dilated = window_geometry(10, 3, 2, 1, PaddingMode::Same).unwrap();
        assert_eq!(dilated, Window { out: 10, pad: 2 });
        let strided = window_geometry(7, 2, 1, 3, PaddingMode::Same).unwrap();
        assert_eq!(strided, Window { out: 3, pad: 0 });
        assert!(window_geometry(2, 3, 1, 1, PaddingMode::Valid).is_err());
        assert!(window_geometry(4, 3, 1, 0, PaddingMode::Valid).is_err());
    }
}
