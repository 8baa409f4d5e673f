//! Explicit VR Big Endian transfer syntax implementation (decoding).

use crate::decode::basic::BigEndianBasicDecoder;
use crate::decode::{
    read_item_header_le, BasicDecode, DecodeFrom, ReadLengthSnafu, ReadReservedSnafu, ReadTagSnafu,
    ReadVrSnafu, Result, UnknownVrSnafu,
};
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use dcmio_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcmio_core::{Tag, VR};
use snafu::ResultExt;
use std::io::Read;

/// A data element decoder for the Explicit VR Big Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRBigEndianDecoder {
    basic: BigEndianBasicDecoder,
}

impl<S: ?Sized> DecodeFrom<S> for ExplicitVRBigEndianDecoder
where
    S: Read,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadTagSnafu)?;

        // Item and delimitation headers are encoded in little endian even
        // in big endian data sets, so the 0xFFFE group shows up as the
        // byte pair [0xFE, 0xFF].
        if buf[0..2] == [0xFE, 0xFF] {
            let element = LittleEndian::read_u16(&buf[2..4]);
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            return Ok((
                DataElementHeader::new((0xFFFE, element), VR::UN, Length(len)),
                8, // tag + len
            ));
        }

        let group = BigEndian::read_u16(&buf[0..2]);
        let element = BigEndian::read_u16(&buf[2..4]);

        // retrieve explicit VR
        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let vr = VR::from_binary([buf[0], buf[1]]).ok_or_else(|| {
            UnknownVrSnafu {
                tag: Tag(group, element),
                bytes: [buf[0], buf[1]],
            }
            .build()
        })?;
        let bytes_read;

        // retrieve data length
        let len = if vr.has_32bit_length() {
            // read 2 reserved bytes, then 4 bytes for the value length
            source.read_exact(&mut buf[0..2]).context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            bytes_read = 12;
            BigEndian::read_u32(&buf)
        } else {
            // read 2 bytes for the value length
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            bytes_read = 8;
            u32::from(BigEndian::read_u16(&buf[0..2]))
        };

        Ok((
            DataElementHeader::new((group, element), vr, Length(len)),
            bytes_read,
        ))
    }

    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        read_item_header_le(source)
    }

    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        self.basic.decode_tag(source).context(ReadTagSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::ExplicitVRBigEndianDecoder;
    use crate::decode::DecodeFrom;
    use dcmio_core::header::{HasLength, Header, Length};
    use dcmio_core::{Tag, VR};
    use std::io::{Cursor, Read};

    //  Tag: (0028,0010) Rows
    //  VR: US
    //  Length: 2
    //  Value: 0x0100 (256)
    const RAW: &[u8; 10] = &[
        0x00, 0x28, 0x00, 0x10, b'U', b'S', 0x00, 0x02, 0x01, 0x00,
    ];

    #[test]
    fn decode_big_endian_element() {
        let dec = ExplicitVRBigEndianDecoder::default();
        let mut cursor = Cursor::new(RAW.as_ref());
        let (elem, bytes_read) = dec
            .decode_header(&mut cursor)
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0028, 0x0010));
        assert_eq!(elem.vr(), VR::US);
        assert_eq!(elem.length(), Length(2));
        assert_eq!(bytes_read, 8);
        let mut buffer = [0; 2];
        cursor.read_exact(&mut buffer).expect("should read it fine");
        assert_eq!(&buffer, &[0x01, 0x00]);
    }

    #[test]
    fn item_headers_remain_little_endian() {
        let dec = ExplicitVRBigEndianDecoder::default();
        // an item delimiter as it would appear in a big endian stream
        let raw = [0xFEu8, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00];
        let mut cursor = Cursor::new(&raw[..]);
        let (elem, bytes_read) = dec
            .decode_header(&mut cursor)
            .expect("should decode a delimiter");
        assert_eq!(elem.tag(), Tag(0xFFFE, 0xE00D));
        assert_eq!(elem.length(), Length(0));
        assert_eq!(bytes_read, 8);
    }
}
