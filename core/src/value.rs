//! Representations for the value field of a data element, after any
//! lazy content has been materialized. Streaming value forms (bulk data
//! iterators and sequence readers) live upstream, in the parser crate.

use crate::header::Tag;
use smallvec::SmallVec;
use std::fmt;

/// Type alias for the in-memory storage of multi-valued data.
pub type C<T> = SmallVec<[T; 2]>;

/// A contiguous region of bytes in the original input,
/// described by an absolute offset and a length.
///
/// Byte regions are recorded by the *reference bulk data* transform as a
/// zero-copy alternative to buffering large payloads. The offset counts
/// all bytes consumed from the original input, including the file
/// preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRegion {
    /// Number of bytes in the input preceding the referenced data.
    pub offset: u64,
    /// Number of bytes of the referenced data.
    pub length: u64,
}

/// An enumeration of the supported in-memory forms of a value field.
///
/// Each variant maps to one wire type: character data split at backslashes,
/// byte fragments, fixed-width binary numbers, attribute tags, or byte
/// region references into the source.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    /// No value.
    Empty,
    /// A sequence of strings.
    Strs(C<String>),
    /// An ordered sequence of byte fragments. A single-fragment value is
    /// the common case; encapsulated pixel data keeps one buffer per
    /// fragment, the first being the basic offset table.
    Fragments(C<Vec<u8>>),
    /// References to regions of the original input, in file order.
    Regions(C<ByteRegion>),
    /// A sequence of signed 16-bit integers.
    I16(C<i16>),
    /// A sequence of unsigned 16-bit integers.
    U16(C<u16>),
    /// A sequence of signed 32-bit integers.
    I32(C<i32>),
    /// A sequence of unsigned 32-bit integers.
    U32(C<u32>),
    /// A sequence of 32-bit floating point numbers.
    F32(C<f32>),
    /// A sequence of 64-bit floating point numbers.
    F64(C<f64>),
    /// A sequence of attribute tags.
    Tags(C<Tag>),
}

/// A label for each in-memory value form, mainly used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Empty,
    Strs,
    Fragments,
    Regions,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
    Tags,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PrimitiveValue {
    /// Retrieve the label of this value's form.
    pub fn value_type(&self) -> ValueType {
        match self {
            PrimitiveValue::Empty => ValueType::Empty,
            PrimitiveValue::Strs(_) => ValueType::Strs,
            PrimitiveValue::Fragments(_) => ValueType::Fragments,
            PrimitiveValue::Regions(_) => ValueType::Regions,
            PrimitiveValue::I16(_) => ValueType::I16,
            PrimitiveValue::U16(_) => ValueType::U16,
            PrimitiveValue::I32(_) => ValueType::I32,
            PrimitiveValue::U32(_) => ValueType::U32,
            PrimitiveValue::F32(_) => ValueType::F32,
            PrimitiveValue::F64(_) => ValueType::F64,
            PrimitiveValue::Tags(_) => ValueType::Tags,
        }
    }

    /// The number of individual values in this field.
    pub fn multiplicity(&self) -> usize {
        match self {
            PrimitiveValue::Empty => 0,
            PrimitiveValue::Strs(v) => v.len(),
            PrimitiveValue::Fragments(v) => v.len(),
            PrimitiveValue::Regions(v) => v.len(),
            PrimitiveValue::I16(v) => v.len(),
            PrimitiveValue::U16(v) => v.len(),
            PrimitiveValue::I32(v) => v.len(),
            PrimitiveValue::U32(v) => v.len(),
            PrimitiveValue::F32(v) => v.len(),
            PrimitiveValue::F64(v) => v.len(),
            PrimitiveValue::Tags(v) => v.len(),
        }
    }

    /// Retrieve the first value as a string slice, if the value holds
    /// character data.
    pub fn string(&self) -> Option<&str> {
        match self {
            PrimitiveValue::Strs(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// Retrieve all values as string slices, if the value holds character
    /// data.
    pub fn strings(&self) -> Option<&[String]> {
        match self {
            PrimitiveValue::Strs(v) => Some(v),
            _ => None,
        }
    }

    /// Retrieve the first value as an integer, converting from any of the
    /// integer forms or parsing decimal character data (such as an IS
    /// value).
    pub fn int_value(&self) -> Option<i64> {
        match self {
            PrimitiveValue::I16(v) => v.first().map(|&x| i64::from(x)),
            PrimitiveValue::U16(v) => v.first().map(|&x| i64::from(x)),
            PrimitiveValue::I32(v) => v.first().map(|&x| i64::from(x)),
            PrimitiveValue::U32(v) => v.first().map(|&x| i64::from(x)),
            PrimitiveValue::Strs(v) => v.first().and_then(|s| s.trim().parse().ok()),
            _ => None,
        }
    }

    /// Compute the unpadded byte length of this value as encoded on the
    /// wire: string values are joined with a backslash separator, numeric
    /// values take their fixed widths, and fragments are concatenated.
    pub fn byte_len(&self) -> u64 {
        match self {
            PrimitiveValue::Empty => 0,
            PrimitiveValue::Strs(v) => {
                let data: u64 = v.iter().map(|s| s.len() as u64).sum();
                let separators = v.len().saturating_sub(1) as u64;
                data + separators
            }
            PrimitiveValue::Fragments(v) => v.iter().map(|f| f.len() as u64).sum(),
            PrimitiveValue::Regions(v) => v.iter().map(|r| r.length).sum(),
            PrimitiveValue::I16(v) => v.len() as u64 * 2,
            PrimitiveValue::U16(v) => v.len() as u64 * 2,
            PrimitiveValue::I32(v) => v.len() as u64 * 4,
            PrimitiveValue::U32(v) => v.len() as u64 * 4,
            PrimitiveValue::F32(v) => v.len() as u64 * 4,
            PrimitiveValue::F64(v) => v.len() as u64 * 8,
            PrimitiveValue::Tags(v) => v.len() as u64 * 4,
        }
    }
}

impl From<&str> for PrimitiveValue {
    fn from(s: &str) -> Self {
        PrimitiveValue::Strs(smallvec::smallvec![s.to_owned()])
    }
}

impl From<String> for PrimitiveValue {
    fn from(s: String) -> Self {
        PrimitiveValue::Strs(smallvec::smallvec![s])
    }
}

impl From<Vec<String>> for PrimitiveValue {
    fn from(v: Vec<String>) -> Self {
        PrimitiveValue::Strs(v.into())
    }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(v: Vec<u8>) -> Self {
        PrimitiveValue::Fragments(smallvec::smallvec![v])
    }
}

impl From<u16> for PrimitiveValue {
    fn from(v: u16) -> Self {
        PrimitiveValue::U16(smallvec::smallvec![v])
    }
}

impl From<u32> for PrimitiveValue {
    fn from(v: u32) -> Self {
        PrimitiveValue::U32(smallvec::smallvec![v])
    }
}
