//! The per-run table of op lowerings.

use std::collections::HashMap;

use carve_analysis::OpSupport;
use carve_ir::{InstRef, Node};

use crate::convert::Converter;
use crate::error::LowerError;
use crate::ops;

/// Lowers one host node given its arguments in input-port order, returning
/// the instruction that holds the node's output.
pub type LowerFn = fn(&mut Converter<'_>, &Node, &[InstRef]) -> Result<InstRef, LowerError>;

/// Entry of the lowering table.
#[derive(Clone, Copy, Debug)]
pub enum Lowering {
    Op(LowerFn),
    /// Known op without a lowering yet; offloading it is an error.
    Unimplemented,
}

/// Maps op types to lowerings.
///
/// Nodes are only offloaded when their op type appears here, so the
/// classifier is built from the same table that converts them.
#[derive(Clone, Debug, Default)]
pub struct LoweringRegistry {
    table: HashMap<String, Lowering>,
}

impl LoweringRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with all built-in lowerings.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("Const", ops::lower_const);
        registry.register("Conv2D", ops::lower_conv2d);
        registry.register("Relu", ops::lower_activation);
        registry.register("Sigmoid", ops::lower_activation);
        registry.register("Tanh", ops::lower_activation);
        registry.register("BiasAdd", ops::lower_bias_add);
        registry.register("MaxPool", ops::lower_pool);
        registry.register("AvgPool", ops::lower_pool);
        registry.register("Identity", ops::lower_identity);
        registry
    }

    /// Registers or replaces the lowering for `op`.
    pub fn register(&mut self, op: impl Into<String>, lower: LowerFn) {
        self.table.insert(op.into(), Lowering::Op(lower));
    }

    /// Marks `op` as known but not lowerable.
    pub fn register_unimplemented(&mut self, op: impl Into<String>) {
        self.table.insert(op.into(), Lowering::Unimplemented);
    }

    pub fn get(&self, op: &str) -> Option<Lowering> {
        self.table.get(op).copied()
    }

    /// Registered op types, sorted.
    pub fn ops(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.table.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }
}

impl OpSupport for LoweringRegistry {
    fn supports(&self, op: &str) -> bool {
        self.table.contains_key(op)
    }
}
