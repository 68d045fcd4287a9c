//! Serialization for carve.
//!
//! [`encode`] and [`decode`] turn an accelerator [`Program`](carve_ir::Program)
//! into the attribute list stored on an invocation node and back. The
//! [`wire`] module writes whole host graphs as protobuf.

mod error;
mod program;
pub mod wire;

pub use error::CodecError;
pub use program::{CodecRegistry, DecodeFn, EncodeFn, OpCodec, Record, decode, encode};
pub use wire::{decode_graph, encode_graph};
