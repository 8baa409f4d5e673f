//! Implicit VR Little Endian transfer syntax implementation (encoding).

use crate::encode::basic::{BasicEncode, LittleEndianBasicEncoder};
use crate::encode::{
    encode_item_delimiter_impl, encode_item_header_impl, encode_sequence_delimiter_impl, EncodeTo,
    Result, WriteHeaderSnafu, WriteTagSnafu, WriteValueDataSnafu,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use dcmio_core::header::{DataElementHeader, Header};
use dcmio_core::Tag;
use snafu::ResultExt;
use std::io::Write;

/// A concrete encoder for the Implicit VR Little Endian transfer syntax.
/// The VR is not written to the destination; every header is a tag
/// followed by a 32-bit value length.
#[derive(Debug, Default, Clone)]
pub struct ImplicitVRLittleEndianEncoder {
    basic: LittleEndianBasicEncoder,
}

impl<W: ?Sized> EncodeTo<W> for ImplicitVRLittleEndianEncoder
where
    W: Write,
{
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn encode_tag(&self, to: &mut W, tag: Tag) -> Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u16(&mut buf[..], tag.group());
        LittleEndian::write_u16(&mut buf[2..], tag.element());
        to.write_all(&buf).context(WriteTagSnafu)
    }

    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u16(&mut buf[0..], de.tag().group());
        LittleEndian::write_u16(&mut buf[2..], de.tag().element());
        LittleEndian::write_u32(&mut buf[4..], de.len.0);
        to.write_all(&buf).context(WriteHeaderSnafu)?;
        Ok(8)
    }

    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()> {
        encode_item_header_impl(to, len)
    }

    fn encode_item_delimiter(&self, to: &mut W) -> Result<()> {
        encode_item_delimiter_impl(to)
    }

    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()> {
        encode_sequence_delimiter_impl(to)
    }

    fn encode_us(&self, to: &mut W, value: u16) -> Result<()> {
        self.basic.encode_us(to, value).context(WriteValueDataSnafu)
    }

    fn encode_ul(&self, to: &mut W, value: u32) -> Result<()> {
        self.basic.encode_ul(to, value).context(WriteValueDataSnafu)
    }

    fn encode_ss(&self, to: &mut W, value: i16) -> Result<()> {
        self.basic.encode_ss(to, value).context(WriteValueDataSnafu)
    }

    fn encode_sl(&self, to: &mut W, value: i32) -> Result<()> {
        self.basic.encode_sl(to, value).context(WriteValueDataSnafu)
    }

    fn encode_fl(&self, to: &mut W, value: f32) -> Result<()> {
        self.basic.encode_fl(to, value).context(WriteValueDataSnafu)
    }

    fn encode_fd(&self, to: &mut W, value: f64) -> Result<()> {
        self.basic.encode_fd(to, value).context(WriteValueDataSnafu)
    }
}
