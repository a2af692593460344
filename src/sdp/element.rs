//! SDP Data Elements
//!
//! A Data Element is SDP's self-describing value: one header octet
//! `(type << 3) | size_index`, an optional explicit length, then the payload.
//! [`DataElement`] is a zero-copy view: text, URL and sequence payloads borrow
//! from the buffer they were decoded from, and sequence children are decoded
//! lazily through [`Children`].

use super::cursor::{ByteSink, Reader};
use super::uuid::Uuid;
use heapless::Vec;

/// Data Element codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// A declared length reaches past the end of the buffer
    MalformedLength,
    /// The element decoded fine but is not the kind the caller required
    UnexpectedKind,
    /// The size index is not valid for the element type
    InvalidSize,
    /// The type descriptor is reserved
    UnknownType,
    /// Sequences are nested deeper than the allowed bound
    DepthExceeded,
    /// The destination buffer is full
    BufferFull,
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MalformedLength => write!(f, "Declared length exceeds buffer"),
            Self::UnexpectedKind => write!(f, "Unexpected data element kind"),
            Self::InvalidSize => write!(f, "Invalid size index for data element type"),
            Self::UnknownType => write!(f, "Reserved data element type"),
            Self::DepthExceeded => write!(f, "Data element nesting too deep"),
            Self::BufferFull => write!(f, "Data element buffer full"),
        }
    }
}

/// Data element type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataElementType {
    /// Nil (null value)
    Nil = 0,
    /// Unsigned integer
    UnsignedInt = 1,
    /// Signed integer
    SignedInt = 2,
    /// UUID
    Uuid = 3,
    /// Text string
    TextString = 4,
    /// Boolean
    Boolean = 5,
    /// Data element sequence
    Sequence = 6,
    /// Data element alternative
    Alternative = 7,
    /// URL
    Url = 8,
}

impl DataElementType {
    /// Create from the 5-bit type descriptor
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Nil),
            1 => Some(Self::UnsignedInt),
            2 => Some(Self::SignedInt),
            3 => Some(Self::Uuid),
            4 => Some(Self::TextString),
            5 => Some(Self::Boolean),
            6 => Some(Self::Sequence),
            7 => Some(Self::Alternative),
            8 => Some(Self::Url),
            _ => None,
        }
    }
}

/// Data element size descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataElementSize {
    /// 1 byte
    Size1 = 0,
    /// 2 bytes
    Size2 = 1,
    /// 4 bytes
    Size4 = 2,
    /// 8 bytes
    Size8 = 3,
    /// 16 bytes
    Size16 = 4,
    /// Additional 8-bit size descriptor follows
    AdditionalU8 = 5,
    /// Additional 16-bit size descriptor follows
    AdditionalU16 = 6,
    /// Additional 32-bit size descriptor follows
    AdditionalU32 = 7,
}

impl DataElementSize {
    const fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => Self::Size1,
            1 => Self::Size2,
            2 => Self::Size4,
            3 => Self::Size8,
            4 => Self::Size16,
            5 => Self::AdditionalU8,
            6 => Self::AdditionalU16,
            _ => Self::AdditionalU32,
        }
    }

    /// Smallest explicit-length class able to describe `len` bytes
    #[must_use]
    pub const fn for_length(len: usize) -> Self {
        if len <= 0xFF {
            Self::AdditionalU8
        } else if len <= 0xFFFF {
            Self::AdditionalU16
        } else {
            Self::AdditionalU32
        }
    }

    /// Bytes taken by the explicit length field
    #[must_use]
    pub const fn length_field_size(self) -> usize {
        match self {
            Self::AdditionalU8 => 1,
            Self::AdditionalU16 => 2,
            Self::AdditionalU32 => 4,
            _ => 0,
        }
    }
}

/// Build a header octet
#[must_use]
pub const fn header(kind: DataElementType, size: DataElementSize) -> u8 {
    ((kind as u8) << 3) | size as u8
}

/// A decoded (or to-be-encoded) SDP Data Element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataElement<'a> {
    /// Nil (null value)
    Nil,
    /// Unsigned 8-bit integer
    U8(u8),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Unsigned 64-bit integer
    U64(u64),
    /// Unsigned 128-bit integer
    U128(u128),
    /// Signed 8-bit integer
    I8(i8),
    /// Signed 16-bit integer
    I16(i16),
    /// Signed 32-bit integer
    I32(i32),
    /// Signed 64-bit integer
    I64(i64),
    /// Signed 128-bit integer
    I128(i128),
    /// UUID in its received width
    Uuid(Uuid),
    /// Text string bytes (usually UTF-8)
    Text(&'a [u8]),
    /// Boolean value
    Bool(bool),
    /// Encoded children of a data element sequence
    Sequence(&'a [u8]),
    /// Encoded children of a data element alternative
    Alternative(&'a [u8]),
    /// URL bytes
    Url(&'a [u8]),
}

impl<'a> DataElement<'a> {
    /// Decode the element starting at `offset` in `buffer`
    ///
    /// Returns the element and the number of bytes it occupies.
    ///
    /// # Errors
    ///
    /// Returns `MalformedLength` if the header or a declared length reaches past the
    /// end of `buffer`, `InvalidSize` or `UnknownType` for an invalid header.
    pub fn decode_at(buffer: &'a [u8], offset: usize) -> Result<(Self, usize), CodecError> {
        let tail = buffer.get(offset..).ok_or(CodecError::MalformedLength)?;
        Self::decode(tail)
    }

    /// Decode the element at the start of `buffer`
    ///
    /// # Errors
    ///
    /// See [`DataElement::decode_at`].
    pub fn decode(buffer: &'a [u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new(buffer);
        let element = Self::read(&mut reader)?;
        Ok((element, reader.position()))
    }

    /// Decode the next element from `reader`
    ///
    /// # Errors
    ///
    /// See [`DataElement::decode_at`].
    pub fn read(reader: &mut Reader<'a>) -> Result<Self, CodecError> {
        let descriptor = reader.read_u8()?;
        let kind = DataElementType::from_u8(descriptor >> 3).ok_or(CodecError::UnknownType)?;
        let size = DataElementSize::from_index(descriptor);

        let element = match (kind, size) {
            (DataElementType::Nil, DataElementSize::Size1) => Self::Nil,
            (DataElementType::UnsignedInt, DataElementSize::Size1) => Self::U8(reader.read_u8()?),
            (DataElementType::UnsignedInt, DataElementSize::Size2) => Self::U16(reader.read_u16()?),
            (DataElementType::UnsignedInt, DataElementSize::Size4) => Self::U32(reader.read_u32()?),
            (DataElementType::UnsignedInt, DataElementSize::Size8) => Self::U64(reader.read_u64()?),
            (DataElementType::UnsignedInt, DataElementSize::Size16) => {
                Self::U128(reader.read_u128()?)
            }
            (DataElementType::SignedInt, DataElementSize::Size1) => {
                Self::I8(i8::from_be_bytes([reader.read_u8()?]))
            }
            (DataElementType::SignedInt, DataElementSize::Size2) => {
                Self::I16(i16::from_be_bytes(reader.read_u16()?.to_be_bytes()))
            }
            (DataElementType::SignedInt, DataElementSize::Size4) => {
                Self::I32(i32::from_be_bytes(reader.read_u32()?.to_be_bytes()))
            }
            (DataElementType::SignedInt, DataElementSize::Size8) => {
                Self::I64(i64::from_be_bytes(reader.read_u64()?.to_be_bytes()))
            }
            (DataElementType::SignedInt, DataElementSize::Size16) => {
                Self::I128(i128::from_be_bytes(reader.read_u128()?.to_be_bytes()))
            }
            (DataElementType::Uuid, DataElementSize::Size2) => {
                Self::Uuid(Uuid::Uuid16(reader.read_u16()?))
            }
            (DataElementType::Uuid, DataElementSize::Size4) => {
                Self::Uuid(Uuid::Uuid32(reader.read_u32()?))
            }
            (DataElementType::Uuid, DataElementSize::Size16) => {
                Self::Uuid(Uuid::Uuid128(reader.read_u128()?))
            }
            (DataElementType::Boolean, DataElementSize::Size1) => Self::Bool(reader.read_u8()? != 0),
            (
                DataElementType::TextString
                | DataElementType::Sequence
                | DataElementType::Alternative
                | DataElementType::Url,
                DataElementSize::AdditionalU8
                | DataElementSize::AdditionalU16
                | DataElementSize::AdditionalU32,
            ) => {
                let len = match size {
                    DataElementSize::AdditionalU8 => usize::from(reader.read_u8()?),
                    DataElementSize::AdditionalU16 => usize::from(reader.read_u16()?),
                    _ => usize::try_from(reader.read_u32()?)
                        .map_err(|_| CodecError::MalformedLength)?,
                };
                let payload = reader.take(len)?;
                match kind {
                    DataElementType::TextString => Self::Text(payload),
                    DataElementType::Sequence => Self::Sequence(payload),
                    DataElementType::Alternative => Self::Alternative(payload),
                    _ => Self::Url(payload),
                }
            }
            _ => return Err(CodecError::InvalidSize),
        };
        Ok(element)
    }

    /// The element's type descriptor
    #[must_use]
    pub const fn element_type(&self) -> DataElementType {
        match self {
            Self::Nil => DataElementType::Nil,
            Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::U64(_) | Self::U128(_) => {
                DataElementType::UnsignedInt
            }
            Self::I8(_) | Self::I16(_) | Self::I32(_) | Self::I64(_) | Self::I128(_) => {
                DataElementType::SignedInt
            }
            Self::Uuid(_) => DataElementType::Uuid,
            Self::Text(_) => DataElementType::TextString,
            Self::Bool(_) => DataElementType::Boolean,
            Self::Sequence(_) => DataElementType::Sequence,
            Self::Alternative(_) => DataElementType::Alternative,
            Self::Url(_) => DataElementType::Url,
        }
    }

    /// Total encoded size including header and length field
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        match self {
            Self::Nil => 1,
            Self::U8(_) | Self::I8(_) | Self::Bool(_) => 2,
            Self::U16(_) | Self::I16(_) => 3,
            Self::U32(_) | Self::I32(_) => 5,
            Self::U64(_) | Self::I64(_) => 9,
            Self::U128(_) | Self::I128(_) => 17,
            Self::Uuid(uuid) => 1 + uuid.width(),
            Self::Text(bytes) | Self::Sequence(bytes) | Self::Alternative(bytes) | Self::Url(bytes) => {
                1 + DataElementSize::for_length(bytes.len()).length_field_size() + bytes.len()
            }
        }
    }

    /// Encode the element into `out`
    ///
    /// Variable-length payloads use the smallest length class that fits.
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if `out` cannot hold the encoding.
    pub fn encode<S: ByteSink>(&self, out: &mut S) -> Result<(), CodecError> {
        use DataElementSize::{Size1, Size2, Size4, Size8, Size16};
        use DataElementType::{Boolean, SignedInt, UnsignedInt};

        match *self {
            Self::Nil => out.put_u8(header(DataElementType::Nil, Size1)),
            Self::U8(v) => out.put(&[header(UnsignedInt, Size1), v]),
            Self::U16(v) => {
                out.put_u8(header(UnsignedInt, Size2))?;
                out.put(&v.to_be_bytes())
            }
            Self::U32(v) => {
                out.put_u8(header(UnsignedInt, Size4))?;
                out.put(&v.to_be_bytes())
            }
            Self::U64(v) => {
                out.put_u8(header(UnsignedInt, Size8))?;
                out.put(&v.to_be_bytes())
            }
            Self::U128(v) => {
                out.put_u8(header(UnsignedInt, Size16))?;
                out.put(&v.to_be_bytes())
            }
            Self::I8(v) => out.put(&[header(SignedInt, Size1), v.to_be_bytes()[0]]),
            Self::I16(v) => {
                out.put_u8(header(SignedInt, Size2))?;
                out.put(&v.to_be_bytes())
            }
            Self::I32(v) => {
                out.put_u8(header(SignedInt, Size4))?;
                out.put(&v.to_be_bytes())
            }
            Self::I64(v) => {
                out.put_u8(header(SignedInt, Size8))?;
                out.put(&v.to_be_bytes())
            }
            Self::I128(v) => {
                out.put_u8(header(SignedInt, Size16))?;
                out.put(&v.to_be_bytes())
            }
            Self::Uuid(uuid) => encode_uuid(uuid, out),
            Self::Bool(v) => out.put(&[header(Boolean, Size1), u8::from(v)]),
            Self::Text(bytes) => encode_variable(DataElementType::TextString, bytes, out),
            Self::Sequence(bytes) => encode_variable(DataElementType::Sequence, bytes, out),
            Self::Alternative(bytes) => encode_variable(DataElementType::Alternative, bytes, out),
            Self::Url(bytes) => encode_variable(DataElementType::Url, bytes, out),
        }
    }

    /// Encode into a fresh fixed-capacity buffer
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if the encoding exceeds `N` bytes.
    pub fn to_vec<const N: usize>(&self) -> Result<Vec<u8, N>, CodecError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Iterate the children of a sequence or alternative
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` for any other element.
    pub fn children(&self) -> Result<Children<'a>, CodecError> {
        match *self {
            Self::Sequence(bytes) | Self::Alternative(bytes) => Ok(Children::new(bytes)),
            _ => Err(CodecError::UnexpectedKind),
        }
    }

    /// Require a UUID
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` for any other element.
    pub fn expect_uuid(&self) -> Result<Uuid, CodecError> {
        self.as_uuid().ok_or(CodecError::UnexpectedKind)
    }

    /// Require an unsigned 16-bit integer
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` for any other element.
    pub fn expect_u16(&self) -> Result<u16, CodecError> {
        match *self {
            Self::U16(v) => Ok(v),
            _ => Err(CodecError::UnexpectedKind),
        }
    }

    /// Require an unsigned 32-bit integer
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` for any other element.
    pub fn expect_u32(&self) -> Result<u32, CodecError> {
        match *self {
            Self::U32(v) => Ok(v),
            _ => Err(CodecError::UnexpectedKind),
        }
    }

    /// Require a sequence and iterate its children
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedKind` for any other element, alternatives included.
    pub fn expect_sequence(&self) -> Result<Children<'a>, CodecError> {
        match *self {
            Self::Sequence(bytes) => Ok(Children::new(bytes)),
            _ => Err(CodecError::UnexpectedKind),
        }
    }

    /// The UUID, if this is one
    #[must_use]
    pub const fn as_uuid(&self) -> Option<Uuid> {
        match *self {
            Self::Uuid(uuid) => Some(uuid),
            _ => None,
        }
    }

    /// Any unsigned integer widened to `u64` (128-bit values only if they fit)
    #[must_use]
    pub fn as_unsigned(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(u64::from(v)),
            Self::U16(v) => Some(u64::from(v)),
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            Self::U128(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Text payload as `&str` when it is valid UTF-8
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Self::Text(bytes) | Self::Url(bytes) => core::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Raw payload of a text, URL, sequence or alternative
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            Self::Text(bytes) | Self::Url(bytes) | Self::Sequence(bytes) | Self::Alternative(bytes) => {
                Some(bytes)
            }
            _ => None,
        }
    }

    /// Boolean value, if this is one
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this element, or any element nested at most `depth` sequences below
    /// it, is a UUID equal to one of `patterns`
    ///
    /// Malformed children end the search for that branch without a match.
    #[must_use]
    pub fn contains_uuid(&self, patterns: &[Uuid], depth: usize) -> bool {
        match self {
            Self::Uuid(uuid) => patterns.contains(uuid),
            Self::Sequence(_) | Self::Alternative(_) if depth > 0 => match self.children() {
                Ok(children) => children
                    .map_while(Result::ok)
                    .any(|child| child.contains_uuid(patterns, depth - 1)),
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Check that every nested element decodes and nesting stays within `depth`
    ///
    /// # Errors
    ///
    /// Returns the first decoding error found, or `DepthExceeded`.
    pub fn validate(&self, depth: usize) -> Result<(), CodecError> {
        if let Ok(children) = self.children() {
            if depth == 0 {
                return Err(CodecError::DepthExceeded);
            }
            for child in children {
                child?.validate(depth - 1)?;
            }
        }
        Ok(())
    }
}

fn encode_uuid<S: ByteSink>(uuid: Uuid, out: &mut S) -> Result<(), CodecError> {
    match uuid {
        Uuid::Uuid16(v) => {
            out.put_u8(header(DataElementType::Uuid, DataElementSize::Size2))?;
            out.put(&v.to_be_bytes())
        }
        Uuid::Uuid32(v) => {
            out.put_u8(header(DataElementType::Uuid, DataElementSize::Size4))?;
            out.put(&v.to_be_bytes())
        }
        Uuid::Uuid128(v) => {
            out.put_u8(header(DataElementType::Uuid, DataElementSize::Size16))?;
            out.put(&v.to_be_bytes())
        }
    }
}

/// Write a variable-length header (descriptor and explicit length) for `len` payload bytes
///
/// # Errors
///
/// Returns `BufferFull` if `out` is full, `MalformedLength` if `len` exceeds `u32`.
pub fn encode_variable_header<S: ByteSink>(
    kind: DataElementType,
    len: usize,
    out: &mut S,
) -> Result<(), CodecError> {
    let size = DataElementSize::for_length(len);
    out.put_u8(header(kind, size))?;
    match size {
        DataElementSize::AdditionalU8 => out.put_u8(len as u8),
        DataElementSize::AdditionalU16 => out.put_u16(len as u16),
        _ => out.put_u32(u32::try_from(len).map_err(|_| CodecError::MalformedLength)?),
    }
}

fn encode_variable<S: ByteSink>(
    kind: DataElementType,
    payload: &[u8],
    out: &mut S,
) -> Result<(), CodecError> {
    encode_variable_header(kind, payload.len(), out)?;
    out.put(payload)
}

/// Lazy iterator over the children of a sequence
///
/// Yields an error at most once and then stops.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    reader: Reader<'a>,
    failed: bool,
}

impl<'a> Children<'a> {
    /// Iterate elements packed back to back in `content`
    #[must_use]
    pub const fn new(content: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(content),
            failed: false,
        }
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<DataElement<'a>, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let result = DataElement::read(&mut self.reader);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Builds the content of a sequence element by element
#[derive(Debug, Clone, Default)]
pub struct SequenceBuilder<const N: usize> {
    content: Vec<u8, N>,
}

impl<const N: usize> SequenceBuilder<N> {
    /// Create an empty builder
    #[must_use]
    pub const fn new() -> Self {
        Self {
            content: Vec::new(),
        }
    }

    /// Append one element
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if the content would exceed `N` bytes.
    pub fn push(&mut self, element: &DataElement<'_>) -> Result<&mut Self, CodecError> {
        element.encode(&mut self.content)?;
        Ok(self)
    }

    /// Append bytes that are already encoded elements
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if the content would exceed `N` bytes.
    pub fn push_encoded(&mut self, encoded: &[u8]) -> Result<&mut Self, CodecError> {
        self.content.put(encoded)?;
        Ok(self)
    }

    /// The encoded children collected so far
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// View the collected children as a sequence element
    #[must_use]
    pub fn as_sequence(&self) -> DataElement<'_> {
        DataElement::Sequence(&self.content)
    }

    /// Write the complete sequence (header and children) into `out`
    ///
    /// # Errors
    ///
    /// Returns `BufferFull` if `out` cannot hold the encoding.
    pub fn finish<S: ByteSink>(&self, out: &mut S) -> Result<(), CodecError> {
        self.as_sequence().encode(out)
    }
}
