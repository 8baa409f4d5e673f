//! Explicit VR Little Endian transfer syntax implementation (encoding).

use crate::encode::basic::{BasicEncode, LittleEndianBasicEncoder};
use crate::encode::{
    encode_item_delimiter_impl, encode_item_header_impl, encode_sequence_delimiter_impl, EncodeTo,
    LengthTooLargeSnafu, Result, WriteHeaderSnafu, WriteTagSnafu, WriteValueDataSnafu,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use dcmio_core::header::{DataElementHeader, Header};
use dcmio_core::Tag;
use snafu::{ensure, ResultExt};
use std::io::Write;

/// A concrete encoder for the Explicit VR Little Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRLittleEndianEncoder {
    basic: LittleEndianBasicEncoder,
}

impl<W: ?Sized> EncodeTo<W> for ExplicitVRLittleEndianEncoder
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
        let len = de.len.0;
        if de.vr().has_32bit_length() {
            // the 16 bits following the two byte VR field are reserved and
            // zeroed, and the value length takes a 32-bit field
            let mut buf = [0u8; 12];
            LittleEndian::write_u16(&mut buf[0..], de.tag().group());
            LittleEndian::write_u16(&mut buf[2..], de.tag().element());
            let vr_bytes = de.vr().to_bytes();
            buf[4] = vr_bytes[0];
            buf[5] = vr_bytes[1];
            // buf[6..8] is kept zero'd
            LittleEndian::write_u32(&mut buf[8..], len);
            to.write_all(&buf).context(WriteHeaderSnafu)?;
            Ok(12)
        } else {
            ensure!(
                len <= u32::from(u16::MAX),
                LengthTooLargeSnafu { tag: de.tag(), len }
            );
            let mut buf = [0u8; 8];
            LittleEndian::write_u16(&mut buf[0..], de.tag().group());
            LittleEndian::write_u16(&mut buf[2..], de.tag().element());
            let vr_bytes = de.vr().to_bytes();
            buf[4] = vr_bytes[0];
            buf[5] = vr_bytes[1];
            LittleEndian::write_u16(&mut buf[6..], len as u16);
            to.write_all(&buf).context(WriteHeaderSnafu)?;
            Ok(8)
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use dcmio_core::header::Length;
    use dcmio_core::VR;

    #[test]
    fn encode_short_header() {
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x0002, 0x0000), VR::UL, Length(4));
        let enc = ExplicitVRLittleEndianEncoder::default();
        let bytes = enc.encode_element_header(&mut out, de).unwrap();
        assert_eq!(bytes, 8);
        assert_eq!(
            out,
            [0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00]
        );
    }

    #[test]
    fn encode_long_header() {
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x7FE0, 0x0010), VR::OB, Length::UNDEFINED);
        let enc = ExplicitVRLittleEndianEncoder::default();
        let bytes = enc.encode_element_header(&mut out, de).unwrap();
        assert_eq!(bytes, 12);
        assert_eq!(
            out,
            [0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn short_header_rejects_large_lengths() {
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x0008, 0x0060), VR::CS, Length(0x1_0000));
        let enc = ExplicitVRLittleEndianEncoder::default();
        assert!(enc.encode_element_header(&mut out, de).is_err());
    }

    #[test]
    fn encode_delimiters() {
        let enc = ExplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        enc.encode_item_header(&mut out, 4).unwrap();
        enc.encode_item_delimiter(&mut out).unwrap();
        enc.encode_sequence_delimiter(&mut out).unwrap();
        assert_eq!(
            out,
            [
                0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, //
                0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, //
                0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
            ]
        );
    }
}
