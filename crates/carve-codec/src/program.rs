//! Program ⇄ attribute-list codec.
//!
//! A program is stored as a [`NameAttrList`] with two attributes:
//! `instructions`, one record per instruction in construction order, and
//! `outputs`, the record names feeding the invocation outputs. Every record
//! carries `op`, `dtype`, `shape` and `inputs` plus the fields of its
//! operation.

use std::collections::HashMap;

use carve_ir::{
    ActivationMode, AttrValue, Convolution, DataType, InstRef, Instruction, NameAttrList,
    Operation, PaddingMode, Pooling, PoolingMode, Program, Shape, TensorShape, TensorValue,
};

use crate::error::CodecError;

/// Writes the operation-specific fields of `inst` into `record`.
pub type EncodeFn = fn(&Instruction, &mut NameAttrList);
/// Rebuilds the operation of a record.
pub type DecodeFn = fn(&Record<'_>) -> Result<Operation, CodecError>;

/// Encoder and decoder of one operation tag.
#[derive(Clone, Copy, Debug)]
pub struct OpCodec {
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

/// Codecs keyed by operation tag.
#[derive(Clone, Debug, Default)]
pub struct CodecRegistry {
    table: HashMap<String, OpCodec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering every built-in [`Operation`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("parameter", encode_parameter, decode_parameter);
        registry.register("literal", encode_literal, decode_literal);
        registry.register("convolution", encode_convolution, decode_convolution);
        registry.register("activation", encode_activation, decode_activation);
        registry.register("transpose", encode_transpose, decode_transpose);
        registry.register("contiguous", encode_nothing, decode_contiguous);
        registry.register("pooling", encode_pooling, decode_pooling);
        registry.register("broadcast", encode_broadcast, decode_broadcast);
        registry.register("add", encode_nothing, decode_add);
        registry
    }

    pub fn register(&mut self, tag: impl Into<String>, encode: EncodeFn, decode: DecodeFn) {
        self.table.insert(tag.into(), OpCodec { encode, decode });
    }

    fn codec(&self, tag: &str) -> Result<OpCodec, CodecError> {
        self.table
            .get(tag)
            .copied()
            .ok_or_else(|| CodecError::UnknownOp(tag.to_string()))
    }

    /// Encodes `program` under `name`.
    pub fn encode(&self, name: &str, program: &Program) -> Result<NameAttrList, CodecError> {
        let mut counters: HashMap<&'static str, usize> = HashMap::new();
        let mut names: Vec<String> = Vec::with_capacity(program.len());
        let mut records = Vec::with_capacity(program.len());

        for (handle, inst) in program.iter() {
            let tag = inst.op.tag();
            let codec = self.codec(tag)?;
            let counter = counters.entry(tag).or_insert(0);
            let record_name = format!("{tag}_{counter}");
            *counter += 1;

            let inputs = inst
                .args
                .iter()
                .map(|&arg| record_name_of(&names, arg, &record_name))
                .collect::<Result<Vec<_>, _>>()?;
            let mut record = NameAttrList::new(record_name.clone());
            record.push("op", AttrValue::Str(tag.to_string()));
            record.push("dtype", AttrValue::Type(inst.shape.dtype));
            record.push("shape", AttrValue::Ints(to_ints(&inst.shape.dims)));
            record.push("inputs", AttrValue::Strs(inputs));
            (codec.encode)(inst, &mut record);

            debug_assert_eq!(handle.index(), names.len());
            names.push(record_name);
            records.push(record);
        }

        let outputs = program
            .outputs()
            .iter()
            .map(|&out| record_name_of(&names, out, name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut list = NameAttrList::new(name);
        list.push("instructions", AttrValue::Funcs(records));
        list.push("outputs", AttrValue::Strs(outputs));
        log::trace!("encoded program '{name}' with {} record(s)", names.len());
        Ok(list)
    }

    /// Rebuilds a program from its encoded form.
    pub fn decode(&self, list: &NameAttrList) -> Result<Program, CodecError> {
        let top = Record::new(list);
        let records = match top.field("instructions")? {
            AttrValue::Funcs(records) => records.as_slice(),
            other => return Err(top.mismatch("instructions", "list(func)", other)),
        };

        let mut program = Program::new();
        let mut by_name: HashMap<&str, InstRef> = HashMap::with_capacity(records.len());
        for list in records {
            let record = Record::new(list);
            if by_name.contains_key(record.name()) {
                return Err(CodecError::DuplicateName(record.name().to_string()));
            }
            let tag = record.str("op")?;
            let codec = self.codec(tag)?;
            let dtype = record.dtype("dtype")?;
            let dims = record.dims("shape")?;
            let args = record
                .strs("inputs")?
                .iter()
                .map(|input| {
                    by_name
                        .get(input.as_str())
                        .copied()
                        .ok_or_else(|| CodecError::UnresolvedInput {
                            record: record.name().to_string(),
                            input: input.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let op = (codec.decode)(&record)?;
            let inst = program.add_instruction(op, Shape::new(dtype, dims), args)?;
            by_name.insert(record.name(), inst);
        }

        let outputs = top
            .strs("outputs")?
            .iter()
            .map(|out| {
                by_name
                    .get(out.as_str())
                    .copied()
                    .ok_or_else(|| CodecError::UnresolvedInput {
                        record: top.name().to_string(),
                        input: out.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        program.set_outputs(outputs)?;
        Ok(program)
    }
}

/// Encodes with the built-in codecs.
pub fn encode(name: &str, program: &Program) -> Result<NameAttrList, CodecError> {
    CodecRegistry::with_builtins().encode(name, program)
}

/// Decodes with the built-in codecs.
pub fn decode(list: &NameAttrList) -> Result<Program, CodecError> {
    CodecRegistry::with_builtins().decode(list)
}

fn record_name_of(names: &[String], inst: InstRef, record: &str) -> Result<String, CodecError> {
    names
        .get(inst.index())
        .cloned()
        .ok_or_else(|| CodecError::UnresolvedInput {
            record: record.to_string(),
            input: format!("{inst:?}"),
        })
}

fn to_ints(values: &[usize]) -> Vec<i64> {
    values.iter().map(|&v| v as i64).collect()
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

/// Typed read access to one encoded record.
pub struct Record<'r> {
    list: &'r NameAttrList,
}

impl<'r> Record<'r> {
    pub fn new(list: &'r NameAttrList) -> Self {
        Self { list }
    }

    pub fn name(&self) -> &'r str {
        &self.list.name
    }

    pub fn field(&self, field: &'static str) -> Result<&'r AttrValue, CodecError> {
        self.list.get(field).ok_or_else(|| CodecError::MissingField {
            record: self.name().to_string(),
            field,
        })
    }

    fn mismatch(&self, field: &'static str, expected: &'static str, found: &AttrValue) -> CodecError {
        CodecError::TypeMismatch {
            record: self.name().to_string(),
            field,
            expected,
            found: found.kind(),
        }
    }

    fn invalid(&self, field: &'static str, value: impl std::fmt::Debug) -> CodecError {
        CodecError::InvalidValue {
            record: self.name().to_string(),
            field,
            value: format!("{value:?}"),
        }
    }

    pub fn str(&self, field: &'static str) -> Result<&'r str, CodecError> {
        let value = self.field(field)?;
        value.as_str().ok_or_else(|| self.mismatch(field, "string", value))
    }

    pub fn strs(&self, field: &'static str) -> Result<&'r [String], CodecError> {
        let value = self.field(field)?;
        value.as_strs().ok_or_else(|| self.mismatch(field, "list(string)", value))
    }

    pub fn int(&self, field: &'static str) -> Result<i64, CodecError> {
        let value = self.field(field)?;
        value.as_int().ok_or_else(|| self.mismatch(field, "int", value))
    }

    pub fn dtype(&self, field: &'static str) -> Result<DataType, CodecError> {
        let value = self.field(field)?;
        value.as_type().ok_or_else(|| self.mismatch(field, "type", value))
    }

    pub fn tensor(&self, field: &'static str) -> Result<&'r TensorValue, CodecError> {
        let value = self.field(field)?;
        value.as_tensor().ok_or_else(|| self.mismatch(field, "tensor", value))
    }

    /// Non-negative integer list.
    pub fn dims(&self, field: &'static str) -> Result<Vec<usize>, CodecError> {
        let value = self.field(field)?;
        let ints = value
            .as_ints()
            .ok_or_else(|| self.mismatch(field, "list(int)", value))?;
        ints.iter()
            .map(|&v| usize::try_from(v).map_err(|_| self.invalid(field, ints)))
            .collect()
    }

    /// Two-element non-negative integer list.
    pub fn pair(&self, field: &'static str) -> Result<[usize; 2], CodecError> {
        let dims = self.dims(field)?;
        <[usize; 2]>::try_from(dims.as_slice()).map_err(|_| self.invalid(field, &dims))
    }

    pub fn parse<T>(&self, field: &'static str) -> Result<T, CodecError>
    where
        T: std::str::FromStr,
    {
        let s = self.str(field)?;
        s.parse().map_err(|_| self.invalid(field, s))
    }
}

// ---------------------------------------------------------------------------
// Built-in codecs
// ---------------------------------------------------------------------------

fn encode_nothing(_inst: &Instruction, _record: &mut NameAttrList) {}

fn encode_parameter(inst: &Instruction, record: &mut NameAttrList) {
    if let Operation::Parameter { name } = &inst.op {
        record.push("param", AttrValue::Str(name.clone()));
    }
}

fn decode_parameter(record: &Record<'_>) -> Result<Operation, CodecError> {
    Ok(Operation::Parameter {
        name: record.str("param")?.to_string(),
    })
}

fn encode_literal(inst: &Instruction, record: &mut NameAttrList) {
    if let Operation::Literal { data } = &inst.op {
        record.push(
            "value",
            AttrValue::Tensor(TensorValue {
                dtype: inst.shape.dtype,
                shape: TensorShape::new(inst.shape.dims.clone()),
                content: data.clone(),
            }),
        );
    }
}

fn decode_literal(record: &Record<'_>) -> Result<Operation, CodecError> {
    let tensor = record.tensor("value")?;
    if !tensor.is_consistent() {
        let found = format!("{} bytes for {}{}", tensor.content.len(), tensor.dtype, tensor.shape);
        return Err(record.invalid("value", found));
    }
    Ok(Operation::Literal {
        data: tensor.content.clone(),
    })
}

fn encode_convolution(inst: &Instruction, record: &mut NameAttrList) {
    if let Operation::Convolution(conv) = &inst.op {
        record.push("padding", AttrValue::Ints(to_ints(&conv.padding)));
        record.push("stride", AttrValue::Ints(to_ints(&conv.stride)));
        record.push("dilation", AttrValue::Ints(to_ints(&conv.dilation)));
        record.push("padding_mode", AttrValue::Str(conv.padding_mode.as_str().into()));
    }
}

fn decode_convolution(record: &Record<'_>) -> Result<Operation, CodecError> {
    Ok(Operation::Convolution(Convolution {
        padding: record.pair("padding")?,
        stride: record.pair("stride")?,
        dilation: record.pair("dilation")?,
        padding_mode: record.parse::<PaddingMode>("padding_mode")?,
    }))
}

fn encode_activation(inst: &Instruction, record: &mut NameAttrList) {
    if let Operation::Activation { mode } = &inst.op {
        record.push("mode", AttrValue::Str(mode.as_str().into()));
    }
}

fn decode_activation(record: &Record<'_>) -> Result<Operation, CodecError> {
    Ok(Operation::Activation {
        mode: record.parse::<ActivationMode>("mode")?,
    })
}

fn encode_transpose(inst: &Instruction, record: &mut NameAttrList) {
    if let Operation::Transpose { permutation } = &inst.op {
        record.push("permutation", AttrValue::Ints(to_ints(permutation)));
    }
}

fn decode_transpose(record: &Record<'_>) -> Result<Operation, CodecError> {
    Ok(Operation::Transpose {
        permutation: record.dims("permutation")?,
    })
}

fn decode_contiguous(_record: &Record<'_>) -> Result<Operation, CodecError> {
    Ok(Operation::Contiguous)
}

fn encode_pooling(inst: &Instruction, record: &mut NameAttrList) {
    if let Operation::Pooling(pool) = &inst.op {
        record.push("mode", AttrValue::Str(pool.mode.as_str().into()));
        record.push("padding", AttrValue::Ints(to_ints(&pool.padding)));
        record.push("stride", AttrValue::Ints(to_ints(&pool.stride)));
        record.push("lengths", AttrValue::Ints(to_ints(&pool.lengths)));
    }
}

fn decode_pooling(record: &Record<'_>) -> Result<Operation, CodecError> {
    Ok(Operation::Pooling(Pooling {
        mode: record.parse::<PoolingMode>("mode")?,
        padding: record.pair("padding")?,
        stride: record.pair("stride")?,
        lengths: record.pair("lengths")?,
    }))
}

fn encode_broadcast(inst: &Instruction, record: &mut NameAttrList) {
    if let Operation::Broadcast { axis } = &inst.op {
        record.push("axis", AttrValue::Int(*axis as i64));
    }
}

fn decode_broadcast(record: &Record<'_>) -> Result<Operation, CodecError> {
    let axis = record.int("axis")?;
    let axis = usize::try_from(axis).map_err(|_| record.invalid("axis", axis))?;
    Ok(Operation::Broadcast { axis })
}

fn decode_add(_record: &Record<'_>) -> Result<Operation, CodecError> {
    Ok(Operation::Add)
}
