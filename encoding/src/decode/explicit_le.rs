//! Explicit VR Little Endian transfer syntax implementation (decoding).

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{
    read_item_header_le, BasicDecode, DecodeFrom, ReadLengthSnafu, ReadReservedSnafu, ReadTagSnafu,
    ReadVrSnafu, Result, UnknownVrSnafu,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dcmio_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcmio_core::{Tag, VR};
use snafu::ResultExt;
use std::io::Read;

/// A data element decoder for the Explicit VR Little Endian transfer
/// syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRLittleEndianDecoder {
    basic: LittleEndianBasicDecoder,
}

impl<S: ?Sized> DecodeFrom<S> for ExplicitVRLittleEndianDecoder
where
    S: Read,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        // retrieve tag
        let Tag(group, element) = self.basic.decode_tag(&mut *source).context(ReadTagSnafu)?;

        let mut buf = [0u8; 4];
        if group == 0xFFFE {
            // item tags and delimiters do not have a VR or reserved field
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            return Ok((
                DataElementHeader::new((group, element), VR::UN, Length(len)),
                8, // tag + len
            ));
        }

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
            LittleEndian::read_u32(&buf)
        } else {
            // read 2 bytes for the value length
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            bytes_read = 8;
            u32::from(LittleEndian::read_u16(&buf[0..2]))
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
    use super::ExplicitVRLittleEndianDecoder;
    use crate::decode::DecodeFrom;
    use dcmio_core::header::{HasLength, Header, Length};
    use dcmio_core::{Tag, VR};
    use std::io::{Cursor, Read, Seek, SeekFrom};

    // manually crafting some DICOM data elements
    //  Tag: (0002,0000) File Meta Information Group Length
    //  VR: UL
    //  Length: 4
    //  Value: 202
    // --
    //  Tag: (0002,0010) Transfer Syntax UID
    //  VR: UI
    //  Length: 20
    //  Value: "1.2.840.10008.1.2.1\0" == ExplicitVRLittleEndian
    // --
    const RAW: &[u8; 40] = &[
        0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00, 0xCA, 0x00, 0x00, 0x00, 0x02, 0x00, 0x10,
        0x00, b'U', b'I', 0x14, 0x00, 0x31, 0x2e, 0x32, 0x2e, 0x38, 0x34, 0x30, 0x2e, 0x31, 0x30,
        0x30, 0x30, 0x38, 0x2e, 0x31, 0x2e, 0x32, 0x2e, 0x31, 0x00,
    ];

    #[test]
    fn decode_data_elements() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW.as_ref());
        {
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find an element");
            assert_eq!(elem.tag(), Tag(0x0002, 0x0000));
            assert_eq!(elem.vr(), VR::UL);
            assert_eq!(elem.length(), Length(4));
            assert_eq!(bytes_read, 8);
            let mut buffer = [0; 4];
            cursor.read_exact(&mut buffer).expect("should read it fine");
            assert_eq!(&buffer, &[0xCA, 0x00, 0x00, 0x00]);
        }
        {
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find an element");
            assert_eq!(elem.tag(), Tag(0x0002, 0x0010));
            assert_eq!(elem.vr(), VR::UI);
            assert_eq!(elem.length(), Length(20));
            assert_eq!(bytes_read, 8);
            let mut buffer = [0; 20];
            cursor.read_exact(&mut buffer).expect("should read it fine");
            assert_eq!(&buffer[..], b"1.2.840.10008.1.2.1\0".as_ref());
        }
    }

    #[test]
    fn unknown_vr_is_an_error() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let raw = [0x08u8, 0x00, 0x05, 0x00, 0x0A, 0x0B, 0x00, 0x00];
        let mut cursor = Cursor::new(&raw[..]);
        assert!(dec.decode_header(&mut cursor).is_err());
    }

    // manually crafting some DICOM sequence/item delimiters
    //  Tag: (0008,103F) Series Description Code Sequence
    //  VR: SQ
    //  Reserved bytes: 0x0000
    //  Length: 0xFFFF_FFFF
    // --
    //  Tag: (FFFE,E000) Item
    //  Length: 0xFFFF_FFFF (unspecified)
    // --
    //  Tag: (FFFE,E00D) Item Delimitation Item
    //  Length: 0
    // --
    //  Tag: (FFFE,E0DD) Sequence Delimitation Item
    //  Length: 0
    // --
    const RAW_SEQUENCE_ITEMS: &[u8] = &[
        0x08, 0x00, 0x3F, 0x10, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0x00,
        0xE0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, 0xFE, 0xFF,
        0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn decode_items() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW_SEQUENCE_ITEMS);
        {
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find an element header");
            assert_eq!(elem.tag(), Tag(0x0008, 0x103F));
            assert_eq!(elem.vr(), VR::SQ);
            assert!(elem.length().is_undefined());
            assert_eq!(bytes_read, 12);
        }
        assert_eq!(cursor.stream_position().unwrap(), 12);
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find an item header");
            assert!(elem.is_item());
            assert!(elem.length().is_undefined());
        }
        assert_eq!(cursor.stream_position().unwrap(), 20);
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find an item delimiter");
            assert!(elem.is_item_delimiter());
        }
        assert_eq!(cursor.stream_position().unwrap(), 28);
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find a sequence delimiter");
            assert!(elem.is_sequence_delimiter());
        }
        assert_eq!(cursor.seek(SeekFrom::Current(0)).unwrap(), 36);
    }
}
