//! Lowering of host graph clusters into accelerator IR.
//!
//! A [`Converter`] is created per cluster. It turns boundary inputs into
//! parameters, lowers each member through the [`LoweringRegistry`] and tracks
//! value layouts so that accelerator-order values are converted back before
//! they leave the cluster.

mod convert;
mod error;
pub mod layout;
mod ops;
mod registry;
mod values;

pub use convert::{Converter, tensor_name};
pub use error::LowerError;
pub use layout::Layout;
pub use ops::{Window, window_geometry};
pub use registry::{LowerFn, Lowering, LoweringRegistry};
pub use values::ValueTable;
