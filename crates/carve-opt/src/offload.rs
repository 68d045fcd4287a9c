//! The offload pass: find accelerator clusters and replace each with an
//! invocation of its lowered program.

use carve_analysis::{Cluster, NodeClassifier, SegmentError, build_clusters, segment_graph};
use carve_codec::{CodecError, CodecRegistry};
use carve_ir::{Graph, IrError, NameAttrList, Program};
use carve_lower::{Converter, LowerError, LoweringRegistry, ValueTable};

use crate::config::OffloadConfig;
use crate::splice::{SpliceError, check_cluster, splice_cluster};

/// Ops whose presence in a discarded cluster is worth a warning.
const HEAVY_OPS: &[&str] = &["Conv2D"];

#[derive(Debug, thiserror::Error)]
pub enum OffloadError {
    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error("lowering failed: {0}")]
    Lower(#[from] LowerError),

    #[error("encoding failed: {0}")]
    Codec(#[from] CodecError),

    #[error("splicing failed: {0}")]
    Splice(#[from] SpliceError),

    #[error(transparent)]
    Ir(#[from] IrError),
}

/// What one run did to the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OffloadReport {
    /// Names of the inserted invocation nodes, in cluster order.
    pub invocations: Vec<String>,
    /// Host nodes removed into invocations.
    pub nodes_offloaded: usize,
    /// Clusters left in place for being below the size threshold.
    pub clusters_discarded: usize,
}

impl OffloadReport {
    pub fn is_unchanged(&self) -> bool {
        self.invocations.is_empty()
    }
}

/// Runs the offload pass with a fixed set of lowerings and codecs.
pub struct Offloader {
    lowering: LoweringRegistry,
    codec: CodecRegistry,
    config: OffloadConfig,
}

impl Offloader {
    /// An offloader with the built-in lowerings and codecs.
    pub fn new(config: OffloadConfig) -> Self {
        Self::with_registries(LoweringRegistry::with_builtins(), CodecRegistry::with_builtins(), config)
    }

    pub fn with_registries(
        lowering: LoweringRegistry,
        codec: CodecRegistry,
        config: OffloadConfig,
    ) -> Self {
        Self {
            lowering,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    /// Rewrites `graph` in place.
    ///
    /// Every kept cluster is lowered, encoded and checked for splicing before
    /// the first splice, so an error leaves the graph as it was apart from
    /// source/sink fixup.
    pub fn run(&self, graph: &mut Graph, values: &ValueTable) -> Result<OffloadReport, OffloadError> {
        graph.fixup_source_and_sink_edges()?;

        // 1. Classify and segment.
        let classifier = NodeClassifier::new(&self.lowering);
        let segmentation = segment_graph(graph, &classifier)?;

        // 2. Group segments into clusters.
        let clusters = build_clusters(graph, &segmentation, self.config.min_cluster_size);
        for cluster in &clusters.discarded {
            warn_if_heavy(graph, cluster);
        }

        // 3. Lower and encode.
        let mut functions = Vec::with_capacity(clusters.kept.len());
        for cluster in &clusters.kept {
            let program = self.lower_cluster(graph, cluster, values)?;
            log::debug!(
                "cluster {}: {} instruction(s), {} output(s)",
                cluster.id,
                program.len(),
                program.outputs().len()
            );
            functions.push(self.codec.encode(&format!("cluster_{}", cluster.id), &program)?);
        }

        // 4. Splice.
        for cluster in &clusters.kept {
            check_cluster(graph, cluster)?;
        }
        let mut report = OffloadReport {
            clusters_discarded: clusters.discarded.len(),
            ..OffloadReport::default()
        };
        for (cluster, function) in clusters.kept.iter().zip(functions) {
            let invocation = splice(graph, cluster, function, &self.config)?;
            report.invocations.push(invocation);
            report.nodes_offloaded += cluster.len();
        }

        log::info!(
            "offloaded {} node(s) into {} invocation(s), {} cluster(s) below threshold",
            report.nodes_offloaded,
            report.invocations.len(),
            report.clusters_discarded
        );
        Ok(report)
    }

    fn lower_cluster(
        &self,
        graph: &Graph,
        cluster: &Cluster,
        values: &ValueTable,
    ) -> Result<Program, OffloadError> {
        let mut cx = Converter::new(graph, &self.lowering, values);
        for &id in &cluster.input_edges {
            let edge = graph.edge(id).ok_or(IrError::UnknownEdge(id))?;
            if !edge.is_control() {
                cx.add_parameter(edge)?;
            }
        }
        for member in &cluster.members {
            cx.add_instruction(member.node, member.is_exit)?;
        }
        Ok(cx.finish(&cluster.output_edges)?)
    }
}

/// Runs the pass with the built-in registries.
pub fn offload(
    graph: &mut Graph,
    values: &ValueTable,
    config: &OffloadConfig,
) -> Result<OffloadReport, OffloadError> {
    Offloader::new(config.clone()).run(graph, values)
}

fn splice(
    graph: &mut Graph,
    cluster: &Cluster,
    function: NameAttrList,
    config: &OffloadConfig,
) -> Result<String, OffloadError> {
    let id = splice_cluster(graph, cluster, function, config)?;
    let name = graph
        .node(id)
        .map(|n| n.name.clone())
        .ok_or(IrError::UnknownNode(id))?;
    Ok(name)
}

fn warn_if_heavy(graph: &Graph, cluster: &Cluster) {
    let heavy = cluster
        .members
        .iter()
        .filter_map(|m| graph.node(m.node))
        .find(|n| HEAVY_OPS.contains(&n.op.as_str()));
    if let Some(node) = heavy {
        log::warn!(
            "cluster {} containing {} '{}' stays on the host: {} member(s) is below the size threshold",
            cluster.id,
            node.op,
            node.name,
            cluster.len()
        );
    }
}
