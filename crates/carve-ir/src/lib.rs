//! Core data structures for accelerator subgraph extraction.
//!
//! Two representations live here: the host [`Graph`] that the pipeline reads
//! and rewrites, and the accelerator [`Program`] an extracted cluster is
//! lowered into. Both are plain owned values with no global state.

pub mod arena;
mod attr;
pub mod device;
mod display;
mod error;
pub mod graph;
mod program;
mod types;

pub use arena::{Arena, Handle};
pub use attr::{AttrValue, NameAttrList, TensorValue};
pub use device::{DeviceName, names_cpu};
pub use display::{dump_graph, dump_program};
pub use error::IrError;
pub use graph::{
    CONTROL_SLOT, Edge, EdgeId, Graph, Node, NodeClass, NodeDef, NodeId, SINK_NAME, SOURCE_NAME,
};
pub use program::{
    ActivationMode, Convolution, InstRef, Instruction, Operation, PaddingMode, Pooling,
    PoolingMode, Program,
};
pub use types::{DataType, Shape, TensorShape};
