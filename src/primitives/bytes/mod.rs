#![forbid(unsafe_code)]
//! Fixed-width encodings and a fallible read cursor shared by the codec.

use crate::types::DecodeError;

/// Length prefix value meaning "absent".
pub const NULL_LEN: i32 = -1;

pub mod be {
    //! Big-endian fixed-width writers.

    /// Appends a single byte.
    pub fn put_u8(dst: &mut Vec<u8>, v: u8) {
        dst.push(v);
    }

    /// Appends a big-endian `i32`.
    pub fn put_i32(dst: &mut Vec<u8>, v: i32) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `i64`.
    pub fn put_i64(dst: &mut Vec<u8>, v: i64) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends a big-endian `u64`.
    pub fn put_u64(dst: &mut Vec<u8>, v: u64) {
        dst.extend_from_slice(&v.to_be_bytes());
    }

    /// Appends an `f64` as its big-endian IEEE-754 bit pattern.
    pub fn put_f64(dst: &mut Vec<u8>, v: f64) {
        put_u64(dst, v.to_bits());
    }
}

pub mod len {
    //! Length-prefixed byte sequences with the `-1` null convention.

    use super::{be, NULL_LEN};

    /// The `i32` prefix for a field or list of `len` bytes or entries.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds `i32::MAX`.
    pub fn prefix(len: usize) -> i32 {
        i32::try_from(len).unwrap_or_else(|_| panic!("length prefix overflow ({len} > i32::MAX)"))
    }

    /// Appends `Some(bytes)` with an `i32` length, or `-1` for `None`.
    ///
    /// # Panics
    ///
    /// Panics if the slice is longer than `i32::MAX` bytes.
    pub fn put_bytes(dst: &mut Vec<u8>, bytes: Option<&[u8]>) {
        match bytes {
            None => be::put_i32(dst, NULL_LEN),
            Some(body) => {
                be::put_i32(dst, prefix(body.len()));
                dst.extend_from_slice(body);
            }
        }
    }

    /// Appends a present string.
    pub fn put_str(dst: &mut Vec<u8>, s: &str) {
        put_bytes(dst, Some(s.as_bytes()));
    }

    /// Appends an optional string.
    pub fn put_opt_str(dst: &mut Vec<u8>, s: Option<&str>) {
        put_bytes(dst, s.map(str::as_bytes));
    }

    /// Appends a nullable `i64`: a flag byte, then the value when present.
    pub fn put_opt_i64(dst: &mut Vec<u8>, v: Option<i64>) {
        match v {
            None => be::put_u8(dst, 0),
            Some(v) => {
                be::put_u8(dst, 1);
                be::put_i64(dst, v);
            }
        }
    }
}

pub mod buf {
    //! A slice-backed cursor whose reads fail instead of panicking.

    use core::fmt;

    use super::{DecodeError, NULL_LEN};

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        buf: &'a [u8],
        off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Current read offset.
        pub fn offset(&self) -> usize {
            self.off
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }

        /// Takes the next `n` bytes, advancing the offset.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
            if n > self.remaining() {
                return Err(DecodeError::corrupt(
                    self.off,
                    format!("need {n} bytes, {} remaining", self.remaining()),
                ));
            }
            let slice = &self.buf[self.off..self.off + n];
            self.off += n;
            Ok(slice)
        }

        fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
            let mut out = [0u8; N];
            out.copy_from_slice(self.take(N)?);
            Ok(out)
        }

        /// Reads one byte.
        pub fn u8(&mut self) -> Result<u8, DecodeError> {
            Ok(self.take_array::<1>()?[0])
        }

        /// Reads a big-endian `i32`.
        pub fn i32(&mut self) -> Result<i32, DecodeError> {
            Ok(i32::from_be_bytes(self.take_array()?))
        }

        /// Reads a big-endian `i64`.
        pub fn i64(&mut self) -> Result<i64, DecodeError> {
            Ok(i64::from_be_bytes(self.take_array()?))
        }

        /// Reads a big-endian `u64`.
        pub fn u64(&mut self) -> Result<u64, DecodeError> {
            Ok(u64::from_be_bytes(self.take_array()?))
        }

        /// Reads an `f64` from its big-endian bit pattern.
        pub fn f64(&mut self) -> Result<f64, DecodeError> {
            Ok(f64::from_bits(self.u64()?))
        }

        /// Reads a nullable `i64` (flag byte then value).
        pub fn opt_i64(&mut self) -> Result<Option<i64>, DecodeError> {
            let at = self.off;
            match self.u8()? {
                0 => Ok(None),
                1 => Ok(Some(self.i64()?)),
                other => Err(DecodeError::corrupt(
                    at,
                    format!("invalid null flag 0x{other:02X}"),
                )),
            }
        }

        /// Reads a length-prefixed byte sequence; `None` for the `-1` marker.
        pub fn opt_bytes(&mut self) -> Result<Option<&'a [u8]>, DecodeError> {
            let at = self.off;
            let len = self.i32()?;
            if len == NULL_LEN {
                return Ok(None);
            }
            let len = usize::try_from(len)
                .map_err(|_| DecodeError::corrupt(at, format!("negative length {len}")))?;
            if len > self.remaining() {
                return Err(DecodeError::corrupt(
                    at,
                    format!(
                        "declared length {len} exceeds {} remaining bytes",
                        self.remaining()
                    ),
                ));
            }
            self.take(len).map(Some)
        }

        /// Reads a length-prefixed byte sequence that must be present.
        pub fn bytes(&mut self) -> Result<&'a [u8], DecodeError> {
            let at = self.off;
            self.opt_bytes()?
                .ok_or_else(|| DecodeError::corrupt(at, "required field is null"))
        }

        /// Reads an optional UTF-8 string.
        pub fn opt_str(&mut self) -> Result<Option<String>, DecodeError> {
            let at = self.off;
            match self.opt_bytes()? {
                None => Ok(None),
                Some(body) => core::str::from_utf8(body)
                    .map(|s| Some(s.to_owned()))
                    .map_err(|_| DecodeError::corrupt(at, "string is not valid UTF-8")),
            }
        }

        /// Reads a UTF-8 string that must be present.
        pub fn str(&mut self) -> Result<String, DecodeError> {
            let at = self.off;
            self.opt_str()?
                .ok_or_else(|| DecodeError::corrupt(at, "required string is null"))
        }

        /// Fails if any bytes are left unread.
        pub fn ensure_consumed(&self) -> Result<(), DecodeError> {
            if self.remaining() != 0 {
                return Err(DecodeError::corrupt(
                    self.off,
                    format!("{} trailing bytes", self.remaining()),
                ));
            }
            Ok(())
        }
    }

    impl fmt::Debug for Cursor<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}
