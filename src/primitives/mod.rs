//! Low-level primitives the codec is built on.

/// Byte-level utilities and encoding/decoding.
///
/// Fixed-width big-endian integers, length-prefixed fields with the `-1`
/// null marker, and a read cursor that reports corruption as an error.
pub mod bytes;
