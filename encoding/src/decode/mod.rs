//! This module contains all DICOM data element decoding logic.

use byteordered::Endianness;
use dcmio_core::header::{DataElementHeader, SequenceItemHeader, Tag};
use snafu::{Backtrace, Snafu};
use std::io::{self, Read};

pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;

use self::explicit_le::ExplicitVRLittleEndianDecoder;

/// Module-level error type:
/// for errors which may occur while decoding DICOM data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Failed to read the header's tag field"))]
    ReadTag {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's value representation"))]
    ReadVr {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's reserved bytes"))]
    ReadReserved {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's value length field"))]
    ReadLength {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the item header"))]
    ReadItemHeader {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Unknown value representation {:?} of element tagged {}", bytes, tag))]
    UnknownVr {
        tag: Tag,
        bytes: [u8; 2],
        backtrace: Backtrace,
    },
    #[snafu(display("Bad sequence item header"))]
    BadSequenceHeader {
        source: dcmio_core::header::SequenceItemHeaderError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Type trait for reading and decoding DICOM data elements from a specific
/// source reader type.
///
/// The specific behaviour of decoding, even when abstracted from the
/// original source, depends on the transfer syntax.
pub trait DecodeFrom<S: ?Sized + Read> {
    /// Fetch and decode the next data element header from the given source.
    /// At the end of this operation, the source will be pointing at the
    /// element's value data, which should be read or skipped as necessary.
    ///
    /// Decoding an item or sequence delimiter is considered valid, and so
    /// should be properly handled by the decoder. The value representation
    /// in this case is `UN`.
    ///
    /// Returns the decoded header and the exact number of bytes read from
    /// the source.
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)>;

    /// Fetch and decode the next sequence item header from the given
    /// source. It is a separate method because item headers and delimiters
    /// are always implicitly encoded, in little endian, regardless of the
    /// data set's transfer syntax. This always consumes exactly 8 bytes on
    /// success.
    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader>;

    /// Decode a DICOM attribute tag from the given source, in the byte
    /// order of the transfer syntax.
    fn decode_tag(&self, source: &mut S) -> Result<Tag>;
}

impl<S: ?Sized, T: ?Sized> DecodeFrom<S> for Box<T>
where
    S: Read,
    T: DecodeFrom<S>,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        (**self).decode_header(source)
    }

    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        (**self).decode_item_header(source)
    }

    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        (**self).decode_tag(source)
    }
}

/// A decoder with its type erased.
pub type DynDecoder<S> = Box<dyn DecodeFrom<S>>;

/// Obtain a data element decoder for reading the data elements in a DICOM
/// file's meta information. According to the standard, these are always
/// encoded in Explicit VR Little Endian.
pub fn file_header_decoder() -> ExplicitVRLittleEndianDecoder {
    ExplicitVRLittleEndianDecoder::default()
}

/// Reads an item or delimitation header from the source.
///
/// Item and delimitation headers are always encoded in little endian,
/// regardless of the byte order of the enclosing data set, so all syntax
/// decoders share this routine.
pub(crate) fn read_item_header_le<S>(source: &mut S) -> Result<SequenceItemHeader>
where
    S: ?Sized + Read,
{
    use byteordered::byteorder::{ByteOrder, LittleEndian};
    use dcmio_core::Length;
    use snafu::ResultExt;

    let mut buf = [0u8; 8];
    source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
    let group = LittleEndian::read_u16(&buf[0..2]);
    let element = LittleEndian::read_u16(&buf[2..4]);
    let len = LittleEndian::read_u32(&buf[4..8]);

    SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
}

/// Obtain the endianness of a basic decoder type.
pub trait BasicDecode {
    /// Retrieve the source's endianness, as expected by this decoder.
    fn endianness(&self) -> Endianness;

    /// Decode an unsigned short value from the given source.
    fn decode_us<S>(&self, source: S) -> io::Result<u16>
    where
        S: Read;

    /// Decode an unsigned long value from the given source.
    fn decode_ul<S>(&self, source: S) -> io::Result<u32>
    where
        S: Read;

    /// Decode a signed short value from the given source.
    fn decode_ss<S>(&self, source: S) -> io::Result<i16>
    where
        S: Read;

    /// Decode a signed long value from the given source.
    fn decode_sl<S>(&self, source: S) -> io::Result<i32>
    where
        S: Read;

    /// Decode a single precision float value from the given source.
    fn decode_fl<S>(&self, source: S) -> io::Result<f32>
    where
        S: Read;

    /// Decode a double precision float value from the given source.
    fn decode_fd<S>(&self, source: S) -> io::Result<f64>
    where
        S: Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, mut source: S) -> io::Result<Tag>
    where
        S: Read,
    {
        let g = self.decode_us(&mut source)?;
        let e = self.decode_us(source)?;
        Ok(Tag(g, e))
    }
}
