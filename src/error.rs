use std::fmt;

/// Errors returned by the byte-level (de)serialization helpers in [`crate::bytes`].
///
/// These are distinct from [`crate::att::AttError`]: this type covers buffer/encoding
/// failures that occur while building or parsing raw bytes, whereas `AttError` is the
/// wire-level `(opcode, handle, code)` the dispatcher sends back to a peer. A `Error` that
/// surfaces while processing a request is mapped to `ErrorCode::UnlikelyError` at the
/// dispatcher boundary rather than propagated raw.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum Error {
    /// Packet specified an invalid length value or was too short.
    InvalidLength,

    /// Invalid value supplied for a field (eg. a UUID of an unsupported byte length).
    InvalidValue,

    /// Unexpectedly reached EOF while reading or writing data.
    ///
    /// Returned when the caller tries to fit too much data into a PDU or other fixed-size
    /// buffer, and also when reading past the end of a buffer.
    Eof,

    /// Parsing didn't consume the entire buffer.
    IncompleteParse,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidLength => "invalid length value specified",
            Error::InvalidValue => "invalid value for field",
            Error::Eof => "end of buffer",
            Error::IncompleteParse => "excess data in buffer",
        })
    }
}

impl std::error::Error for Error {}
