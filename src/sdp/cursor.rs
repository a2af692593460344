//! Bounds-checked byte cursor and byte sink
//!
//! Every read from an inbound buffer goes through [`Reader`], which fails with
//! [`CodecError::MalformedLength`] instead of reading past the end. Every write goes
//! through [`ByteSink`], which fails with [`CodecError::BufferFull`] instead of growing.

use super::element::CodecError;
use heapless::Vec;

/// Forward-only big-endian reader over a borrowed buffer
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `data`
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Number of bytes consumed so far
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes left to read
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether every byte has been consumed
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread tail of the buffer
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Take the next `len` bytes
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` if fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::MalformedLength);
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read one byte
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` at end of buffer.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    /// Read a big-endian `u16`
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        self.array().map(u16::from_be_bytes)
    }

    /// Read a big-endian `u32`
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.array().map(u32::from_be_bytes)
    }

    /// Read a big-endian `u64`
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        self.array().map(u64::from_be_bytes)
    }

    /// Read a big-endian `u128`
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` if fewer than 16 bytes remain.
    pub fn read_u128(&mut self) -> Result<u128, CodecError> {
        self.array().map(u128::from_be_bytes)
    }
}

/// Append-only destination for encoded bytes
pub trait ByteSink {
    /// Append raw bytes
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if the sink cannot hold `bytes`.
    fn put(&mut self, bytes: &[u8]) -> Result<(), CodecError>;

    /// Number of bytes written so far
    fn written(&self) -> usize;

    /// Append one byte
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if the sink is full.
    fn put_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.put(&[value])
    }

    /// Append a big-endian `u16`
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if the sink is full.
    fn put_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.put(&value.to_be_bytes())
    }

    /// Append a big-endian `u32`
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if the sink is full.
    fn put_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.put(&value.to_be_bytes())
    }
}

impl<const N: usize> ByteSink for Vec<u8, N> {
    fn put(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.extend_from_slice(bytes)
            .map_err(|()| CodecError::BufferFull)
    }

    fn written(&self) -> usize {
        self.len()
    }
}

/// Copy `bytes` into a fresh fixed-capacity buffer
///
/// # Errors
///
/// Returns `BufferFull` if `bytes` exceeds `N`.
pub fn to_vec<const N: usize>(bytes: &[u8]) -> Result<Vec<u8, N>, CodecError> {
    Vec::from_slice(bytes).map_err(|()| CodecError::BufferFull)
}
