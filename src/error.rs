//! This module defines the single, unified error type for the entire stenos
//! library. It uses the `thiserror` crate to provide ergonomic, context-aware
//! error handling.

use thiserror::Error;

/// Unified error type for every fallible operation in the crate.
///
/// Codec kernels are allocation-free on the hot path and return these by
/// value; the frame codec propagates the first error observed in any
/// compression wave.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StenosError {
    /// Element width out of range (0 or >= 65535).
    #[error("invalid bytes-of-type: {0}")]
    InvalidBytesOfType(usize),

    /// A configuration value is out of its legal range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The input was truncated before a required field.
    #[error("source buffer overflow")]
    SrcOverflow,

    /// The output capacity is too small for the produced data.
    #[error("destination buffer overflow")]
    DstOverflow,

    /// Frame integrity violated: bad strategy code, bad plane kind, or a
    /// size mismatch between the header and the decoded payload.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The host lacks a required kernel class. The portable scalar build
    /// never raises this; it remains part of the error vocabulary for
    /// feature-gated builds.
    #[error("required instruction set unavailable")]
    InvalidInstructionSet,

    /// A scratch or worker buffer allocation failed.
    #[error("allocation failure")]
    Alloc,

    /// The entropy collaborator reported an unrecoverable error.
    #[error("entropy coder error: {0}")]
    Entropy(String),

    /// An error from the underlying I/O subsystem while streaming a frame.
    #[error("i/o error: {0}")]
    Io(String),
}
