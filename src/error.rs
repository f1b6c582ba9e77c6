//! Error types for the cola-stream crate.

use std::fmt;

/// Errors that can occur while configuring or driving the streaming core.
///
/// All variants are fatal: configuration errors are raised once at
/// construction, validation errors at interpolator construction, and
/// contract violations at the offending call. No variant is retried or
/// downgraded, and an engine that returned a contract violation must be
/// discarded because its internal buffers may be inconsistent.
#[derive(Debug, Clone, PartialEq)]
pub enum OlaError {
    /// Window length must be positive.
    InvalidWindowLength(usize),
    /// Hop (window length minus overlap) must satisfy `1 <= step <= n_samples`.
    InvalidStep { step: usize, n_samples: usize },
    /// Window length must be at most the total number of samples.
    WindowLongerThanTotal { n_samples: usize, n_total: usize },
    /// The window does not sum to a constant across hop-shifted copies.
    ColaViolation {
        window: String,
        n_samples: usize,
        step: usize,
        deviation_pct: f64,
    },
    /// A window or interpolation kind name was not recognized.
    UnknownKind {
        kind: String,
        known: &'static [&'static str],
    },
    /// Control points must be sorted and unique.
    UnsortedControlPoints,
    /// At least one control point is required.
    NoControlPoints,
    /// A value array's row count does not match the number of control points.
    ValueLengthMismatch { expected: usize, got: usize },
    /// A call supplied a different number of streams than the run was started with.
    StreamCountMismatch { expected: usize, got: usize },
    /// Mismatched channel counts or trailing lengths within one call.
    ShapeMismatch(String),
    /// Fed data would exceed the declared total length.
    Overrun { offset: usize, n_total: usize },
    /// The processing callback returned a chunk whose trailing length does not
    /// match the window it was given.
    BadProcessOutput { expected: usize, got: usize },
    /// A sink write did not satisfy the store contract.
    BadStoreChunks(String),
}

impl fmt::Display for OlaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OlaError::InvalidWindowLength(n) => {
                write!(f, "n_samples must be > 0, got {}", n)
            }
            OlaError::InvalidStep { step, n_samples } => {
                write!(
                    f,
                    "hop must be between 1 and the window length ({}), got {}",
                    n_samples, step
                )
            }
            OlaError::WindowLongerThanTotal { n_samples, n_total } => {
                write!(
                    f,
                    "number of samples per window ({}) must be at most the total \
                     number of samples ({})",
                    n_samples, n_total
                )
            }
            OlaError::ColaViolation {
                window,
                n_samples,
                step,
                deviation_pct,
            } => {
                write!(
                    f,
                    "segment length {} with step {} for {} window type does not \
                     provide a constant output ({:e}% deviation)",
                    n_samples, step, window, deviation_pct
                )
            }
            OlaError::UnknownKind { kind, known } => {
                write!(f, "kind must be one of {:?}, got \"{}\"", known, kind)
            }
            OlaError::UnsortedControlPoints => {
                write!(f, "control points must be sorted and unique")
            }
            OlaError::NoControlPoints => {
                write!(f, "must be at least one control point")
            }
            OlaError::ValueLengthMismatch { expected, got } => {
                write!(
                    f,
                    "values, if provided, must be the same length as the number of \
                     control points ({}), got {}",
                    expected, got
                )
            }
            OlaError::StreamCountMismatch { expected, got } => {
                write!(f, "got {} stream(s), needed {}", got, expected)
            }
            OlaError::ShapeMismatch(msg) => {
                write!(f, "shape mismatch: {}", msg)
            }
            OlaError::Overrun { offset, n_total } => {
                write!(
                    f,
                    "data exceeded expected total buffer size ({} > {})",
                    offset, n_total
                )
            }
            OlaError::BadProcessOutput { expected, got } => {
                write!(
                    f,
                    "process callback returned {} output samples, expected {}",
                    got, expected
                )
            }
            OlaError::BadStoreChunks(msg) => {
                write!(f, "bad store chunks: {}", msg)
            }
        }
    }
}

impl std::error::Error for OlaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_numbers() {
        let err = OlaError::WindowLongerThanTotal {
            n_samples: 10,
            n_total: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("5"));

        let err = OlaError::Overrun {
            offset: 110,
            n_total: 100,
        };
        assert!(err.to_string().contains("110 > 100"));
    }

    #[test]
    fn unknown_kind_lists_candidates() {
        let err = OlaError::UnknownKind {
            kind: "quartic".to_string(),
            known: &["zero", "linear", "cos2"],
        };
        let msg = err.to_string();
        assert!(msg.contains("quartic"));
        assert!(msg.contains("linear"));
    }
}
