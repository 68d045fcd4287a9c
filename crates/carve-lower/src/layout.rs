//! Channel-ordering tags for 4-D values.

use std::fmt;

/// Dimension order of a rank-4 value.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Layout {
    /// Host default for activations.
    Nhwc,
    /// Accelerator order for activations.
    Nchw,
    /// Host default for convolution filters.
    Hwio,
    /// Accelerator order for convolution filters.
    Oihw,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nhwc => "NHWC",
            Self::Nchw => "NCHW",
            Self::Hwio => "HWIO",
            Self::Oihw => "OIHW",
        }
    }

    /// Permutation taking a value in `self` order to `target` order, with
    /// `out.dims[i] = in.dims[perm[i]]`.
    ///
    /// Returns `None` for identical layouts and for pairs that do not describe
    /// the same kind of value.
    pub fn permutation_to(self, target: Layout) -> Option<[usize; 4]> {
        match (self, target) {
            (Self::Nhwc, Self::Nchw) => Some([0, 3, 1, 2]),
            (Self::Nchw, Self::Nhwc) => Some([0, 2, 3, 1]),
            (Self::Hwio, Self::Oihw) => Some([3, 2, 0, 1]),
            (Self::Oihw, Self::Hwio) => Some([2, 3, 1, 0]),
            _ => None,
        }
    }

    /// The host layout values of this kind leave a cluster in.
    pub fn host_default(self) -> Layout {
        match self {
            Self::Nhwc | Self::Nchw => Self::Nhwc,
            Self::Hwio | Self::Oihw => Self::Hwio,
        }
    }

    pub fn is_host_default(self) -> bool {
        self == self.host_default()
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies `perm` to `dims`.
pub fn permute(dims: &[usize], perm: &[usize]) -> Vec<usize> {
    perm.iter().map(|&p| dims[p]).collect()
}
