#![no_main]

use libfuzzer_sys::fuzz_target;

use carve_lower::ValueTable;
use carve_opt::OffloadConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(mut graph) = carve_codec::decode_graph(data) else {
        return;
    };
    let config = OffloadConfig::default().with_min_cluster_size(1);
    if carve_opt::offload(&mut graph, &ValueTable::new(), &config).is_ok() {
        // Every invocation carries a function that decodes again.
        for node in graph.op_nodes().filter(|n| n.op == carve_opt::INVOCATION_OP) {
            if let Some(function) = node.attr("function").and_then(|f| f.as_func()) {
                let _ = carve_codec::decode(function);
            }
        }
    }
});
