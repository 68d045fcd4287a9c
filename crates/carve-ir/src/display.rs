//! Text dumps for debugging.

use std::fmt::Write;

use crate::attr::AttrValue;
use crate::graph::{Graph, NodeClass};
use crate::program::Program;

/// Renders a program one instruction per line.
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for (handle, inst) in program.iter() {
        let _ = write!(out, "{handle:?} = {}", inst.op);
        if !inst.args.is_empty() {
            let args: Vec<String> = inst.args.iter().map(|a| format!("{a:?}")).collect();
            let _ = write!(out, "({})", args.join(", "));
        }
        let _ = writeln!(out, " -> {}", inst.shape);
    }
    if !program.outputs().is_empty() {
        let outs: Vec<String> = program.outputs().iter().map(|o| format!("{o:?}")).collect();
        let _ = writeln!(out, "return {}", outs.join(", "));
    }
    out
}

/// Renders a graph one node per line with its inbound edges.
pub fn dump_graph(graph: &Graph) -> String {
    let mut out = String::new();
    for node in graph.nodes() {
        let marker = match node.class {
            NodeClass::Op => "",
            NodeClass::Source | NodeClass::Sink => " (marker)",
        };
        let _ = write!(out, "{} = {}{marker}", node.name, node.op);
        let device = node.placement();
        if !device.is_empty() {
            let _ = write!(out, " @{device}");
        }
        let inputs: Vec<String> = graph
            .in_edges(node.id)
            .map(|e| {
                let src = graph.node(e.src).map_or("?", |n| n.name.as_str());
                if e.is_control() {
                    format!("^{src}")
                } else {
                    format!("{src}:{}->{}", e.src_output, e.dst_input)
                }
            })
            .collect();
        if !inputs.is_empty() {
            let _ = write!(out, " <- [{}]", inputs.join(", "));
        }
        for (key, value) in &node.attrs {
            let _ = write!(out, " {key}={}", summarize(value));
        }
        out.push('\n');
    }
    out
}

fn summarize(value: &AttrValue) -> String {
    match value {
        AttrValue::Int(v) => v.to_string(),
        AttrValue::Float(v) => v.to_string(),
        AttrValue::Bool(v) => v.to_string(),
        AttrValue::Str(v) => format!("{v:?}"),
        AttrValue::Type(v) => v.to_string(),
        AttrValue::Shape(v) => v.to_string(),
        AttrValue::Tensor(t) => format!("tensor<{}{}>", t.dtype, t.shape),
        AttrValue::Func(f) => format!("func<{}, {} attrs>", f.name, f.attrs.len()),
        AttrValue::Ints(v) => format!("{v:?}"),
        AttrValue::Floats(v) => format!("{v:?}"),
        AttrValue::Strs(v) => format!("{v:?}"),
        AttrValue::Types(v) => {
            let names: Vec<&str> = v.iter().map(|t| t.as_str()).collect();
            format!("[{}]", names.join(", "))
        }
        AttrValue::Funcs(v) => format!("funcs<{}>", v.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeDef;
    use crate::program::{ActivationMode, Operation};
    use crate::types::{DataType, Shape};

    #[test]
    fn program_dump_lists_instructions() {
        let mut p = Program::new();
        let x = p.add_parameter("x", Shape::new(DataType::Float, vec![2]));
        let y = p
            .add_instruction(
                Operation::Activation {
                    mode: ActivationMode::Tanh,
                },
                Shape::new(DataType::Float, vec![2]),
                vec![x],
            )
            .unwrap();
        p.set_outputs(vec![y]).unwrap();
        let text = dump_program(&p);
        assert!(text.contains("%0 = parameter[x] -> float[2]"));
        assert!(text.contains("%1 = activation[tanh](%0) -> float[2]"));
        assert!(text.ends_with("return %1\n"));
    }

    #[test]
    fn graph_dump_shows_edges_and_attrs() {
        let mut g = Graph::new();
        let a = g
            .add_node(NodeDef::new("a", "Const").outputs(vec![DataType::Float]))
            .unwrap();
        let b = g
            .add_node(
                NodeDef::new("b", "Relu")
                    .attr("T", AttrValue::Type(DataType::Float))
                    .inputs(vec![DataType::Float])
                    .outputs(vec![DataType::Float]),
            )
            .unwrap();
        g.add_edge(a, 0, b, 0).unwrap();
        g.add_control_edge(a, b).unwrap();
        let text = dump_graph(&g);
        assert!(text.contains("_SOURCE = NoOp (marker)"));
        assert!(text.contains("b = Relu <- [a:0->0, ^a] T=float"));
    }
}
