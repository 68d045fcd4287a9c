use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use carve_ir::{DataType, Graph, TensorShape, TensorValue};
use carve_lower::ValueTable;
use carve_opt::{INVOCATION_OP, OffloadConfig, Offloader};

/// carve: offload supported subgraphs of a host graph to an accelerator
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input graph (protobuf)
    input: PathBuf,

    /// Output path for the rewritten graph (default: none)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Place invocations on the accelerator of their cluster instead of the
    /// CPU (also enabled by CARVE_ACCELERATOR_PLACEMENT)
    #[arg(long)]
    accelerator: bool,

    /// Smallest cluster that is offloaded
    #[arg(long)]
    min_cluster_size: Option<usize>,

    /// Argument value as `index=dtype:d0xd1...`, repeatable
    #[arg(long = "value", value_parser = parse_value)]
    values: Vec<(i64, TensorValue)>,

    /// Dump the rewritten graph to stderr
    #[arg(long)]
    emit_graph: bool,

    /// Dump each invocation's program to stderr
    #[arg(long)]
    emit_ir: bool,

    /// Run the pass without writing output
    #[arg(long)]
    dry_run: bool,
}

fn parse_value(s: &str) -> Result<(i64, TensorValue), String> {
    let (index, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid value '{s}', expected index=dtype:dims"))?;
    let index = index
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid index '{index}': {e}"))?;
    let (dtype, dims) = rest.split_once(':').unwrap_or((rest, ""));
    let dtype = dtype.trim().parse::<DataType>()?;
    let dims = dims
        .split('x')
        .filter(|d| !d.trim().is_empty())
        .map(|d| {
            d.trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid dimension '{d}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((index, TensorValue::zeros(dtype, TensorShape::new(dims))))
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Read and decode the graph.
    let bytes = std::fs::read(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;
    let mut graph = carve_codec::decode_graph(&bytes)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("graph decode failed")?;

    // 2. Configure.
    let mut config = OffloadConfig::from_env();
    if cli.accelerator {
        config.accelerator_placement = true;
    }
    if let Some(size) = cli.min_cluster_size {
        config.min_cluster_size = size;
    }
    let values: ValueTable = cli.values.into_iter().collect();
    if !values.is_empty() {
        log::debug!("{} input value(s) supplied", values.len());
    }

    // 3. Offload.
    let report = Offloader::new(config)
        .run(&mut graph, &values)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("offload failed")?;
    eprintln!(
        "{} node(s) offloaded into {} invocation(s)",
        report.nodes_offloaded,
        report.invocations.len()
    );

    // 4. Optional dumps.
    if cli.emit_graph {
        eprintln!("{}", carve_ir::dump_graph(&graph));
    }
    if cli.emit_ir {
        dump_invocations(&graph)?;
    }

    // 5. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 6. Write output.
    if let Some(path) = &cli.output {
        let bytes = carve_codec::encode_graph(&graph);
        std::fs::write(path, bytes)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }

    Ok(())
}

fn dump_invocations(graph: &Graph) -> miette::Result<()> {
    for node in graph.op_nodes().filter(|n| n.op == INVOCATION_OP) {
        let function = node
            .attr("function")
            .and_then(|f| f.as_func())
            .ok_or_else(|| miette::miette!("invocation '{}' has no function", node.name))?;
        let program = carve_codec::decode(function)
            .map_err(|e| miette::miette!("{e}"))
            .wrap_err_with(|| format!("failed to decode '{}'", node.name))?;
        eprintln!("; {}\n{}", node.name, carve_ir::dump_program(&program));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_with_dims() {
        let (index, value) = parse_value("2=float:1x3x4").unwrap();
        assert_eq!(index, 2);
        assert_eq!(value.dtype, DataType::Float);
        assert_eq!(value.shape.dims, vec![1, 3, 4]);
        assert_eq!(value.content.len(), 48);
    }

    #[test]
    fn scalar_value() {
        let (_, value) = parse_value("0=int32").unwrap();
        assert!(value.shape.dims.is_empty());
    }

    #[test]
    fn malformed_values() {
        assert!(parse_value("float:2").is_err());
        assert!(parse_value("x=float:2").is_err());
        assert!(parse_value("0=complex:2").is_err());
        assert!(parse_value("0=float:2xq").is_err());
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "carve",
            "g.pb",
            "--accelerator",
            "--min-cluster-size",
            "3",
            "--value",
            "0=float:2x2",
            "--value",
            "1=int8",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.accelerator && cli.dry_run);
        assert_eq!(cli.min_cluster_size, Some(3));
        assert_eq!(cli.values.len(), 2);
    }
}
