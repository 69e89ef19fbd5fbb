#![forbid(unsafe_code)]

use thiserror::Error;

use crate::shape::Shape;

pub type Result<T, E = SigslotError> = std::result::Result<T, E>;

/// Errors reported at the hub boundary.
///
/// Emitting to or connecting against a name with no live signal is not an
/// error; it models "nobody is listening yet".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigslotError {
    /// The caller's callback or argument type does not match the shape
    /// already bound to `name`.
    #[error("signal '{name}' has shape {found}, caller used {expected}")]
    ShapeMismatch {
        name: String,
        expected: Shape,
        found: Shape,
    },

    /// A live signal is already registered under `name`.
    #[error("signal '{name}' is already registered")]
    DuplicateSignal { name: String },
}

impl SigslotError {
    #[must_use]
    pub(crate) fn mismatch(name: &str, expected: Shape, found: Shape) -> Self {
        Self::ShapeMismatch {
            name: name.to_owned(),
            expected,
            found,
        }
    }

    /// Name of the signal the error refers to.
    #[must_use]
    pub fn signal_name(&self) -> &str {
        match self {
            Self::ShapeMismatch { name, .. } | Self::DuplicateSignal { name } => name,
        }
    }
}
