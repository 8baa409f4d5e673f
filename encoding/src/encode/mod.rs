//! This module contains all DICOM data element encoding logic.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use dcmio_core::header::DataElementHeader;
use dcmio_core::Tag;
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{self, Write};

pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;

/// Module-level error type:
/// for errors which may occur while encoding DICOM data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Failed to write data element header"))]
    WriteHeader {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write a tag"))]
    WriteTag {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write item header"))]
    WriteItemHeader {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write item delimiter"))]
    WriteItemDelimiter {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write sequence delimiter"))]
    WriteSequenceDelimiter {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write primitive value"))]
    WriteValueData {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display(
        "Value length {} of element tagged {} does not fit in a 16-bit length field",
        len,
        tag
    ))]
    LengthTooLarge {
        tag: Tag,
        len: u32,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Type trait for encoding DICOM data elements to a specific writer type.
///
/// The specific behaviour of encoding depends on the transfer syntax.
pub trait EncodeTo<W: ?Sized + Write> {
    /// Retrieve the destination's endianness, as expected by this encoder.
    fn endianness(&self) -> Endianness;

    /// Encode and write a data element tag.
    fn encode_tag(&self, to: &mut W, tag: Tag) -> Result<()>;

    /// Encode and write a data element header to the given destination.
    /// Returns the number of bytes effectively written on success.
    ///
    /// Note that data element header should be encoded as is,
    /// regardless of the given value length being odd.
    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize>;

    /// Encode and write a DICOM sequence item header to the given
    /// destination.
    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()>;

    /// Encode and write a DICOM sequence item delimiter to the given
    /// destination.
    fn encode_item_delimiter(&self, to: &mut W) -> Result<()>;

    /// Encode and write a DICOM sequence delimiter to the given
    /// destination.
    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()>;

    /// Encode and write an unsigned short value.
    fn encode_us(&self, to: &mut W, value: u16) -> Result<()>;

    /// Encode and write an unsigned long value.
    fn encode_ul(&self, to: &mut W, value: u32) -> Result<()>;

    /// Encode and write a signed short value.
    fn encode_ss(&self, to: &mut W, value: i16) -> Result<()>;

    /// Encode and write a signed long value.
    fn encode_sl(&self, to: &mut W, value: i32) -> Result<()>;

    /// Encode and write a single precision float value.
    fn encode_fl(&self, to: &mut W, value: f32) -> Result<()>;

    /// Encode and write a double precision float value.
    fn encode_fd(&self, to: &mut W, value: f64) -> Result<()>;
}

impl<W: ?Sized, T: ?Sized> EncodeTo<W> for Box<T>
where
    W: Write,
    T: EncodeTo<W>,
{
    fn endianness(&self) -> Endianness {
        (**self).endianness()
    }

    fn encode_tag(&self, to: &mut W, tag: Tag) -> Result<()> {
        (**self).encode_tag(to, tag)
    }

    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize> {
        (**self).encode_element_header(to, de)
    }

    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()> {
        (**self).encode_item_header(to, len)
    }

    fn encode_item_delimiter(&self, to: &mut W) -> Result<()> {
        (**self).encode_item_delimiter(to)
    }

    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()> {
        (**self).encode_sequence_delimiter(to)
    }

    fn encode_us(&self, to: &mut W, value: u16) -> Result<()> {
        (**self).encode_us(to, value)
    }

    fn encode_ul(&self, to: &mut W, value: u32) -> Result<()> {
        (**self).encode_ul(to, value)
    }

    fn encode_ss(&self, to: &mut W, value: i16) -> Result<()> {
        (**self).encode_ss(to, value)
    }

    fn encode_sl(&self, to: &mut W, value: i32) -> Result<()> {
        (**self).encode_sl(to, value)
    }

    fn encode_fl(&self, to: &mut W, value: f32) -> Result<()> {
        (**self).encode_fl(to, value)
    }

    fn encode_fd(&self, to: &mut W, value: f64) -> Result<()> {
        (**self).encode_fd(to, value)
    }
}

/// An encoder with its type erased.
pub type DynEncoder<W> = Box<dyn EncodeTo<W>>;

/// Obtain a data element encoder for writing the data elements of a DICOM
/// file's meta information, which are always encoded in Explicit VR
/// Little Endian.
pub fn file_header_encoder() -> explicit_le::ExplicitVRLittleEndianEncoder {
    explicit_le::ExplicitVRLittleEndianEncoder::default()
}

/// Writes an item header in little endian,
/// as item and delimitation headers keep this byte order
/// regardless of the enclosing data set's transfer syntax.
pub(crate) fn write_item_header_le<W>(to: &mut W, tag: Tag, len: u32) -> io::Result<()>
where
    W: ?Sized + Write,
{
    let mut buf = [0u8; 8];
    LittleEndian::write_u16(&mut buf[0..], tag.group());
    LittleEndian::write_u16(&mut buf[2..], tag.element());
    LittleEndian::write_u32(&mut buf[4..], len);
    to.write_all(&buf)
}

pub(crate) fn encode_item_header_impl<W>(to: &mut W, len: u32) -> Result<()>
where
    W: ?Sized + Write,
{
    write_item_header_le(to, dcmio_core::ITEM, len).context(WriteItemHeaderSnafu)
}

pub(crate) fn encode_item_delimiter_impl<W>(to: &mut W) -> Result<()>
where
    W: ?Sized + Write,
{
    write_item_header_le(to, dcmio_core::ITEM_DELIMITER, 0).context(WriteItemDelimiterSnafu)
}

pub(crate) fn encode_sequence_delimiter_impl<W>(to: &mut W) -> Result<()>
where
    W: ?Sized + Write,
{
    write_item_header_le(to, dcmio_core::SEQUENCE_DELIMITER, 0).context(WriteSequenceDelimiterSnafu)
}
