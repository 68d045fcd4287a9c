use carve_ir::{DataType, IrError};

/// Errors raised while lowering a cluster.
#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    #[error("node '{node}': no lowering registered for op '{op}'")]
    UnregisteredOp { node: String, op: String },

    #[error("node '{node}': lowering for op '{op}' is not implemented")]
    Unimplemented { node: String, op: String },

    #[error("node '{node}': missing required attribute '{attr}'")]
    MissingAttr { node: String, attr: &'static str },

    #[error("node '{node}': attribute '{attr}' should be {expected}, found {found}")]
    AttrType {
        node: String,
        attr: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("node '{node}': unsupported value {value} for attribute '{attr}'")]
    UnsupportedAttr {
        node: String,
        attr: &'static str,
        value: String,
    },

    #[error("node '{node}': cannot determine the shape of its output")]
    MissingShape { node: String },

    #[error("node '{node}': cannot determine the element type of output {port}")]
    MissingType { node: String, port: i32 },

    #[error("node '{node}': declared type {declared} does not match value type {actual}")]
    TypeMismatch {
        node: String,
        declared: DataType,
        actual: DataType,
    },

    #[error("node '{node}': input '{input}' has not been lowered")]
    UnresolvedInput { node: String, input: String },

    #[error("node '{node}': expected {expected} input(s), found {found}")]
    ArgCount {
        node: String,
        expected: usize,
        found: usize,
    },

    #[error("node '{node}': {reason}")]
    InvalidGeometry { node: String, reason: String },

    #[error("node '{node}': literal holds {found} bytes, its shape needs {expected}")]
    BadLiteral {
        node: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Ir(#[from] IrError),
}
