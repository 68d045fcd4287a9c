use carve_ir::IrError;

/// Errors raised while encoding or decoding programs and graphs.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("no codec registered for operation '{0}'")]
    UnknownOp(String),

    #[error("record '{record}': missing field '{field}'")]
    MissingField { record: String, field: &'static str },

    #[error("record '{record}': field '{field}' should be {expected}, found {found}")]
    TypeMismatch {
        record: String,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("record '{record}': field '{field}' has invalid value {value}")]
    InvalidValue {
        record: String,
        field: &'static str,
        value: String,
    },

    #[error("record '{record}': input '{input}' does not name an earlier record")]
    UnresolvedInput { record: String, input: String },

    #[error("duplicate record name '{0}'")]
    DuplicateName(String),

    #[error("edge refers to unknown node '{0}'")]
    UnknownNode(String),

    #[error("unknown data type code {0}")]
    UnknownDataType(i32),

    #[error("attribute '{0}' has no value")]
    EmptyAttr(String),

    #[error(transparent)]
    Wire(#[from] prost::DecodeError),

    #[error(transparent)]
    Ir(#[from] IrError),
}
