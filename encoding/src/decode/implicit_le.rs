//! Implicit VR Little Endian transfer syntax implementation (decoding).

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{read_item_header_le, BasicDecode, DecodeFrom, ReadLengthSnafu, ReadTagSnafu, Result};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dcmio_core::dictionary::{dictionary_vr, DataDictionary, StubDataDictionary};
use dcmio_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcmio_core::{Tag, VR};
use snafu::ResultExt;
use std::io::Read;

/// A data element decoder for the Implicit VR Little Endian transfer
/// syntax.
///
/// The VR is not present on the wire, so it is resolved through a data
/// dictionary: unknown tags come out as UN, except for group lengths (UL)
/// and private creators (LO).
#[derive(Debug, Clone)]
pub struct ImplicitVRLittleEndianDecoder<D = StubDataDictionary> {
    dict: D,
    basic: LittleEndianBasicDecoder,
}

impl Default for ImplicitVRLittleEndianDecoder<StubDataDictionary> {
    fn default() -> Self {
        ImplicitVRLittleEndianDecoder::with_dict(StubDataDictionary)
    }
}

impl<D> ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
{
    /// Retrieve a decoder that resolves value representations through the
    /// given data dictionary.
    pub fn with_dict(dict: D) -> Self {
        ImplicitVRLittleEndianDecoder {
            dict,
            basic: LittleEndianBasicDecoder,
        }
    }
}

impl<D, S: ?Sized> DecodeFrom<S> for ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
    S: Read,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        // retrieve tag and 32-bit value length
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadTagSnafu)?;
        let group = LittleEndian::read_u16(&buf[0..2]);
        let element = LittleEndian::read_u16(&buf[2..4]);
        let len = LittleEndian::read_u32(&buf[4..8]);
        let tag = Tag(group, element);

        // items and delimiters carry no VR to resolve
        let vr = if group == 0xFFFE {
            VR::UN
        } else {
            dictionary_vr(&self.dict, tag)
        };

        Ok((DataElementHeader::new(tag, vr, Length(len)), 8))
    }

    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        read_item_header_le(source)
    }

    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        self.basic.decode_tag(source).context(ReadTagSnafu)
    }
}
