mod common;

use carve_analysis::SegmentError;
use carve_ir::{AttrValue, Graph};
use carve_lower::{LowerError, ValueTable};
use carve_opt::{OffloadConfig, OffloadError};

fn try_offload(g: &mut Graph) -> Result<carve_opt::OffloadReport, OffloadError> {
    carve_opt::offload(g, &ValueTable::new(), &OffloadConfig::default())
}

#[test]
fn cycle_through_candidates_is_rejected() {
    let mut g = Graph::new();
    let p = common::placeholder(&mut g, "p", &[4]);
    let a = common::op(&mut g, "a", "Relu", 2);
    let b = common::op(&mut g, "b", "Relu", 1);
    let q = common::op(&mut g, "q", "Square", 1);
    g.add_edge(p, 0, a, 0).unwrap();
    g.add_edge(a, 0, b, 0).unwrap();
    g.add_edge(b, 0, a, 1).unwrap();
    g.add_edge(b, 0, q, 0).unwrap();

    let err = try_offload(&mut g).unwrap_err();
    assert!(
        matches!(err, OffloadError::Segment(SegmentError::CycleDetected { .. })),
        "{err}"
    );
    assert!(g.find_node("a").is_some());
}

#[test]
fn control_only_singleton_is_discarded() {
    let mut g = Graph::new();
    let p = common::placeholder(&mut g, "p", &[4]);
    let a = common::op(&mut g, "a", "Relu", 1);
    let q = common::op(&mut g, "q", "Square", 1);
    g.add_control_edge(p, a).unwrap();
    g.add_control_edge(a, q).unwrap();
    let before = common::op_names(&g);

    let report = try_offload(&mut g).unwrap();
    assert!(report.is_unchanged());
    assert_eq!(report.clusters_discarded, 1);
    assert_eq!(common::op_names(&g), before);
}

#[test]
fn graph_without_candidates_is_unchanged() {
    let mut g = Graph::new();
    let p = common::placeholder(&mut g, "p", &[4]);
    let q = common::op(&mut g, "q", "Square", 1);
    g.add_edge(p, 0, q, 0).unwrap();
    let edges = g.num_edges();

    let report = try_offload(&mut g).unwrap();
    assert!(report.is_unchanged());
    assert_eq!(report.clusters_discarded, 0);
    assert!(g.num_edges() >= edges);
    assert!(g.op_nodes().all(|n| n.op != carve_opt::INVOCATION_OP));
}

#[test]
fn channels_first_conv_fails_before_splicing() {
    let mut g = Graph::new();
    let x = common::placeholder(&mut g, "x", &[1, 3, 8, 8]);
    let w = common::constant(&mut g, "w", &[3, 3, 3, 4]);
    let conv = common::conv2d(&mut g, "conv", [1, 1, 1, 1], "SAME");
    g.node_mut(conv)
        .unwrap()
        .attrs
        .insert("data_format".into(), AttrValue::Str("NCHW".into()));
    let q = common::op(&mut g, "q", "Square", 1);
    g.add_edge(x, 0, conv, 0).unwrap();
    g.add_edge(w, 0, conv, 1).unwrap();
    g.add_edge(conv, 0, q, 0).unwrap();

    let err = try_offload(&mut g).unwrap_err();
    assert!(
        matches!(err, OffloadError::Lower(LowerError::UnsupportedAttr { .. })),
        "{err}"
    );
    assert!(g.find_node("conv").is_some());
    assert!(g.find_node("invocation_0").is_none());
}

#[test]
fn parameter_without_shape_is_reported() {
    let mut g = Graph::new();
    let p = common::op(&mut g, "p", "Square", 0);
    let a = common::op(&mut g, "a", "Relu", 1);
    let b = common::op(&mut g, "b", "Relu", 1);
    g.add_edge(p, 0, a, 0).unwrap();
    g.add_edge(a, 0, b, 0).unwrap();

    let err = try_offload(&mut g).unwrap_err();
    assert!(
        matches!(err, OffloadError::Lower(LowerError::MissingShape { ref node }) if node == "p"),
        "{err}"
    );
}

#[test]
fn garbage_bytes_are_not_a_graph() {
    assert!(carve_codec::decode_graph(&[0xff, 0xff, 0xff, 0x0f]).is_err());
}

#[test]
fn cycle_with_no_exit_is_rejected() {
    let mut g = Graph::new();
    let p = common::placeholder(&mut g, "p", &[4]);
    let a = common::op(&mut g, "a", "Relu", 2);
    let b = common::op(&mut g, "b", "Relu", 1);
    g.add_edge(p, 0, a, 0).unwrap();
    g.add_edge(a, 0, b, 0).unwrap();
    g.add_edge(b, 0, a, 1).unwrap();
    let x = common::placeholder(&mut g, "x", &[4]);
    let y = common::op(&mut g, "y", "Square", 1);
    g.add_edge(x, 0, y, 0).unwrap();

    let err = try_offload(&mut g).unwrap_err();
    assert!(
        matches!(err, OffloadError::Segment(SegmentError::NoPathToSink { .. })),
        "{err}"
    );
    assert!(g.find_node("a").is_some());
    assert!(g.find_node("invocation_0").is_none());
}
