//! Accelerator IR program.
//!
//! A [`Program`] is an append-only list of [`Instruction`]s. Every argument
//! refers to an instruction appended earlier, so construction order is
//! always a valid topological order and references never dangle.

use std::fmt;
use std::str::FromStr;

use crate::arena::{Arena, Handle};
use crate::error::IrError;
use crate::types::Shape;

/// Reference to an instruction inside one program.
pub type InstRef = Handle<Instruction>;

/// How a convolution or pooling window treats the borders.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum PaddingMode {
    /// Explicit padding values, no implied policy.
    Default,
    Same,
    Valid,
}

impl PaddingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Same => "same",
            Self::Valid => "valid",
        }
    }
}

impl FromStr for PaddingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "same" => Ok(Self::Same),
            "valid" => Ok(Self::Valid),
            _ => Err(format!("unknown padding mode '{s}'")),
        }
    }
}

/// 2-D convolution over an NCHW input and an OIHW filter.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Convolution {
    pub padding: [usize; 2],
    pub stride: [usize; 2],
    pub dilation: [usize; 2],
    pub padding_mode: PaddingMode,
}

impl Default for Convolution {
    fn default() -> Self {
        Self {
            padding: [0, 0],
            stride: [1, 1],
            dilation: [1, 1],
            padding_mode: PaddingMode::Default,
        }
    }
}

/// Element-wise activation function.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ActivationMode {
    Relu,
    Sigmoid,
    Tanh,
}

impl ActivationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
        }
    }
}

impl FromStr for ActivationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relu" => Ok(Self::Relu),
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            _ => Err(format!("unknown activation mode '{s}'")),
        }
    }
}

/// Window reduction applied by [`Pooling`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum PoolingMode {
    Max,
    Average,
}

impl PoolingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Average => "average",
        }
    }
}

impl FromStr for PoolingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "average" => Ok(Self::Average),
            _ => Err(format!("unknown pooling mode '{s}'")),
        }
    }
}

/// 2-D pooling over an NCHW input.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Pooling {
    pub mode: PoolingMode,
    pub padding: [usize; 2],
    pub stride: [usize; 2],
    pub lengths: [usize; 2],
}

/// The operation an instruction performs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Program input, bound by position to an invocation input.
    Parameter { name: String },
    /// Constant with raw little-endian data.
    Literal { data: Vec<u8> },
    Convolution(Convolution),
    Activation { mode: ActivationMode },
    /// `out.dims[i] = in.dims[permutation[i]]`.
    Transpose { permutation: Vec<usize> },
    /// Materializes a transposed view into dense storage.
    Contiguous,
    Pooling(Pooling),
    /// Broadcasts a 1-D argument along `axis` to the result shape.
    Broadcast { axis: usize },
    Add,
}

impl Operation {
    /// Stable operation tag used for naming and serialization.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Parameter { .. } => "parameter",
            Self::Literal { .. } => "literal",
            Self::Convolution(_) => "convolution",
            Self::Activation { .. } => "activation",
            Self::Transpose { .. } => "transpose",
            Self::Contiguous => "contiguous",
            Self::Pooling(_) => "pooling",
            Self::Broadcast { .. } => "broadcast",
            Self::Add => "add",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter { name } => write!(f, "parameter[{name}]"),
            Self::Literal { data } => write!(f, "literal[{} bytes]", data.len()),
            Self::Convolution(c) => write!(
                f,
                "convolution[padding={:?}, stride={:?}, dilation={:?}, padding_mode={}]",
                c.padding,
                c.stride,
                c.dilation,
                c.padding_mode.as_str()
            ),
            Self::Activation { mode } => write!(f, "activation[{}]", mode.as_str()),
            Self::Transpose { permutation } => write!(f, "transpose[{permutation:?}]"),
            Self::Contiguous => f.write_str("contiguous"),
            Self::Pooling(p) => write!(
                f,
                "pooling[{}, padding={:?}, stride={:?}, lengths={:?}]",
                p.mode.as_str(),
                p.padding,
                p.stride,
                p.lengths
            ),
            Self::Broadcast { axis } => write!(f, "broadcast[axis={axis}]"),
            Self::Add => f.write_str("add"),
        }
    }
}

/// One IR instruction: operation, result shape, ordered arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub op: Operation,
    pub shape: Shape,
    pub args: Vec<InstRef>,
}

/// An ordered IR program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    instructions: Arena<Instruction>,
    outputs: Vec<InstRef>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a program input.
    pub fn add_parameter(&mut self, name: impl Into<String>, shape: Shape) -> InstRef {
        self.instructions.append(Instruction {
            op: Operation::Parameter { name: name.into() },
            shape,
            args: Vec::new(),
        })
    }

    /// Appends a constant.
    pub fn add_literal(&mut self, data: Vec<u8>, shape: Shape) -> InstRef {
        self.instructions.append(Instruction {
            op: Operation::Literal { data },
            shape,
            args: Vec::new(),
        })
    }

    /// Appends an instruction whose arguments must already be in the program.
    pub fn add_instruction(
        &mut self,
        op: Operation,
        shape: Shape,
        args: Vec<InstRef>,
    ) -> Result<InstRef, IrError> {
        let at = self.instructions.next_handle();
        if let Some(bad) = args.iter().find(|a| !self.instructions.contains(**a)) {
            return Err(IrError::DanglingArgument {
                index: bad.index(),
                at: at.index(),
            });
        }
        Ok(self.instructions.append(Instruction { op, shape, args }))
    }

    /// Declares which instructions feed the invocation outputs, in port order.
    pub fn set_outputs(&mut self, outputs: Vec<InstRef>) -> Result<(), IrError> {
        let end = self.instructions.next_handle();
        if let Some(bad) = outputs.iter().find(|o| !self.instructions.contains(**o)) {
            return Err(IrError::DanglingArgument {
                index: bad.index(),
                at: end.index(),
            });
        }
        self.outputs = outputs;
        Ok(())
    }

    pub fn outputs(&self) -> &[InstRef] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, inst: InstRef) -> Option<&Instruction> {
        self.instructions.try_get(inst)
    }

    /// Instructions in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (InstRef, &Instruction)> {
        self.instructions.iter()
    }

    /// Parameter instructions in order.
    pub fn parameters(&self) -> impl Iterator<Item = (InstRef, &Instruction)> {
        self.iter()
            .filter(|(_, inst)| matches!(inst.op, Operation::Parameter { .. }))
    }
}

impl std::ops::Index<InstRef> for Program {
    type Output = Instruction;

    fn index(&self, inst: InstRef) -> &Instruction {
        &self.instructions[inst]
    }
}
