//! The data element parser and the nested readers it produces.
//!
//! [`read_element_value`] reads one element's value according to the kind
//! of its VR: character data and binary numbers are materialized
//! immediately, while bulk data and sequences come back as lazy streams
//! bounded to the enclosing source. [`SequenceReader`] and [`ItemReader`]
//! drive the recursive sequence and item protocol in both of its length
//! encoding modes.

use crate::bulkdata::{BulkDataStream, EncapsulatedIterator, NativeMultiFrame, OneShotIterator};
use crate::error::{
    InvalidDelimiterLengthSnafu, InvalidItemTagSnafu, InvalidValueTypeSnafu, Result,
    TruncatedSequenceSnafu, UndefinedLengthNotAllowedSnafu, UnexpectedDelimiterSnafu,
};
use crate::stateful::{DataSetSource, Scope};
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use dcmio_core::dataset::{DataElement, DataSet, Sequence, Value};
use dcmio_core::header::{
    DataElementHeader, HasLength, Header, Length, SequenceItemHeader, Tag, VrKind, ITEM,
    ITEM_DELIMITER, PIXEL_DATA, SEQUENCE_DELIMITER, VR,
};
use dcmio_core::value::{PrimitiveValue, C};
use dcmio_encoding::text::TextCodec;
use dcmio_encoding::transfer_syntax::TransferSyntax;
use snafu::ensure;
use std::io::Read;

/// The value of an element produced by the streaming layer: either
/// already materialized, or a lazy stream bounded to the input.
pub enum ElementValue<'a, R: Read> {
    /// A fully materialized primitive value.
    Primitive(PrimitiveValue),
    /// A fully materialized sequence.
    Sequence(Sequence),
    /// A lazy reader over the items of a sequence.
    SequenceStream(SequenceReader<'a, R>),
    /// A lazy stream of bulk data fragments.
    BulkData(BulkDataStream<'a, R>),
}

/// A data element as produced by the streaming layer, before any
/// materialization: its value may be a lazy stream holding a bounded view
/// of the underlying reader, valid until the producing iterator advances.
pub struct StreamedElement<'a, R: Read> {
    /// The element header as found on the wire.
    pub header: DataElementHeader,
    /// The element's value.
    pub value: ElementValue<'a, R>,
}

impl<'a, R: Read> HasLength for StreamedElement<'a, R> {
    fn length(&self) -> Length {
        self.header.len
    }
}

impl<'a, R: Read> Header for StreamedElement<'a, R> {
    fn tag(&self) -> Tag {
        self.header.tag
    }
}

impl<'a, R: Read> StreamedElement<'a, R> {
    /// Wrap an owned, materialized element in the streaming element form.
    pub fn from_owned(elem: DataElement) -> Self {
        let (header, value) = elem.into_parts();
        let value = match value {
            Value::Primitive(v) => ElementValue::Primitive(v),
            Value::Sequence(v) => ElementValue::Sequence(v),
        };
        StreamedElement { header, value }
    }

    /// Materialize this element, buffering any value that is still a lazy
    /// stream.
    ///
    /// A bulk data stream is buffered into the in-memory form appropriate
    /// for its VR: byte fragments for OB, OW and UN (keeping the fragment
    /// structure of encapsulated pixel data), binary number lists for OL,
    /// OD and OF, and strings for UC, UR and UT. A sequence stream is
    /// collected item by item, with no transforms applied.
    pub fn into_owned(self) -> Result<DataElement> {
        let StreamedElement { header, value } = self;
        let value = match value {
            ElementValue::Primitive(v) => Value::Primitive(v),
            ElementValue::Sequence(v) => Value::Sequence(v),
            ElementValue::SequenceStream(mut seq) => Value::Sequence(seq.collect_plain()?),
            ElementValue::BulkData(stream) => buffer_bulk_data(&header, stream)?,
        };
        Ok(DataElement::new_with_len(
            header.tag, header.vr, header.len, value,
        ))
    }
}

/// Buffer a bulk data stream into the in-memory form determined by the
/// element's VR.
fn buffer_bulk_data<R: Read>(
    header: &DataElementHeader,
    mut stream: BulkDataStream<'_, R>,
) -> Result<Value> {
    let endianness = stream.endianness();
    let value = match header.vr {
        VR::OB | VR::OW | VR::UN => {
            let fragments: C<Vec<u8>> = stream.collect_fragments()?.into();
            PrimitiveValue::Fragments(fragments)
        }
        VR::OL | VR::OD | VR::OF | VR::UC | VR::UR | VR::UT => {
            let mut fragments = stream.collect_fragments()?;
            ensure!(
                fragments.len() <= 1,
                InvalidValueTypeSnafu {
                    tag: header.tag,
                    got: dcmio_core::value::ValueType::Fragments,
                    context: "multiple fragments in a single-fragment VR",
                }
            );
            let data = fragments.pop().unwrap_or_default();
            match header.vr {
                VR::OL => PrimitiveValue::U32(bytes_to_u32(&data, endianness)),
                VR::OD => PrimitiveValue::F64(bytes_to_f64(&data, endianness)),
                VR::OF => PrimitiveValue::F32(bytes_to_f32(&data, endianness)),
                VR::UC => {
                    // UC keeps trailing spaces and splits into multiple values
                    let text = dcmio_encoding::DefaultCharacterSetCodec
                        .decode(&data)
                        .unwrap_or_default();
                    PrimitiveValue::Strs(text.split('\\').map(str::to_owned).collect())
                }
                // UR and UT admit no backslash separation;
                // trailing whitespace is dropped
                _ => {
                    let text = dcmio_encoding::DefaultCharacterSetCodec
                        .decode(&data)
                        .unwrap_or_default();
                    PrimitiveValue::Strs(smallvec::smallvec![text.trim_end().to_owned()])
                }
            }
        }
        _ => {
            return InvalidValueTypeSnafu {
                tag: header.tag,
                got: dcmio_core::value::ValueType::Fragments,
                context: "bulk data stream under a non bulk data VR",
            }
            .fail()
        }
    };
    Ok(Value::Primitive(value))
}

fn bytes_to_u32(data: &[u8], endianness: Endianness) -> C<u32> {
    let count = data.len() / 4;
    let mut out = smallvec::smallvec![0u32; count];
    match endianness {
        Endianness::Little => LittleEndian::read_u32_into(&data[..count * 4], &mut out),
        Endianness::Big => BigEndian::read_u32_into(&data[..count * 4], &mut out),
    }
    out
}

fn bytes_to_f32(data: &[u8], endianness: Endianness) -> C<f32> {
    let count = data.len() / 4;
    let mut out = smallvec::smallvec![0f32; count];
    match endianness {
        Endianness::Little => LittleEndian::read_f32_into(&data[..count * 4], &mut out),
        Endianness::Big => BigEndian::read_f32_into(&data[..count * 4], &mut out),
    }
    out
}

fn bytes_to_f64(data: &[u8], endianness: Endianness) -> C<f64> {
    let count = data.len() / 8;
    let mut out = smallvec::smallvec![0f64; count];
    match endianness {
        Endianness::Little => LittleEndian::read_f64_into(&data[..count * 8], &mut out),
        Endianness::Big => BigEndian::read_f64_into(&data[..count * 8], &mut out),
    }
    out
}

/// Read the value following the given element header, producing a
/// streamed element whose value is materialized or lazy depending on the
/// kind of the VR.
pub(crate) fn read_element_value<'a, R: Read>(
    source: &'a mut DataSetSource<R>,
    header: DataElementHeader,
) -> Result<StreamedElement<'a, R>> {
    let value = match header.vr.kind() {
        VrKind::Text => {
            let len = defined_length(&header)?;
            if len == 0 {
                ElementValue::Primitive(PrimitiveValue::Strs(C::new()))
            } else {
                let text = read_text(source, len)?;
                let strip_leading = !matches!(header.vr, VR::ST | VR::LT);
                let values = text
                    .split('\\')
                    .map(|s| {
                        if strip_leading {
                            s.trim_matches(char::is_whitespace).to_owned()
                        } else {
                            s.trim_end_matches(char::is_whitespace).to_owned()
                        }
                    })
                    .collect();
                ElementValue::Primitive(PrimitiveValue::Strs(values))
            }
        }
        VrKind::UniqueIdentifier => {
            let len = defined_length(&header)?;
            if len == 0 {
                ElementValue::Primitive(PrimitiveValue::Strs(C::new()))
            } else {
                let text = read_text(source, len)?;
                let values = text
                    .split('\\')
                    .map(|s| s.trim_matches(|c| c == '\0' || c == ' ').to_owned())
                    .collect();
                ElementValue::Primitive(PrimitiveValue::Strs(values))
            }
        }
        VrKind::BinaryNumber => {
            let len = defined_length(&header)?;
            let mut data = vec![0u8; len as usize];
            source.read_exact(&mut data)?;
            let endianness = source.endianness();
            ElementValue::Primitive(match header.vr {
                VR::SS => {
                    let count = data.len() / 2;
                    let mut out = smallvec::smallvec![0i16; count];
                    match endianness {
                        Endianness::Little => {
                            LittleEndian::read_i16_into(&data[..count * 2], &mut out)
                        }
                        Endianness::Big => BigEndian::read_i16_into(&data[..count * 2], &mut out),
                    }
                    PrimitiveValue::I16(out)
                }
                VR::US => {
                    let count = data.len() / 2;
                    let mut out = smallvec::smallvec![0u16; count];
                    match endianness {
                        Endianness::Little => {
                            LittleEndian::read_u16_into(&data[..count * 2], &mut out)
                        }
                        Endianness::Big => BigEndian::read_u16_into(&data[..count * 2], &mut out),
                    }
                    PrimitiveValue::U16(out)
                }
                VR::SL => {
                    let count = data.len() / 4;
                    let mut out = smallvec::smallvec![0i32; count];
                    match endianness {
                        Endianness::Little => {
                            LittleEndian::read_i32_into(&data[..count * 4], &mut out)
                        }
                        Endianness::Big => BigEndian::read_i32_into(&data[..count * 4], &mut out),
                    }
                    PrimitiveValue::I32(out)
                }
                VR::UL => PrimitiveValue::U32(bytes_to_u32(&data, endianness)),
                VR::FL => PrimitiveValue::F32(bytes_to_f32(&data, endianness)),
                // FD
                _ => PrimitiveValue::F64(bytes_to_f64(&data, endianness)),
            })
        }
        VrKind::AttributeTag => {
            let len = defined_length(&header)?;
            let count = len / 4;
            let mut tags = C::with_capacity(count as usize);
            for _ in 0..count {
                tags.push(source.decode_tag()?);
            }
            // drop any bytes beyond the last whole tag
            source.skip(u64::from(len % 4))?;
            ElementValue::Primitive(PrimitiveValue::Tags(tags))
        }
        VrKind::Sequence => {
            let end = header
                .len
                .get()
                .map(|len| source.position() + u64::from(len));
            let mark = source.push_scope(Scope::Sequence { end });
            ElementValue::SequenceStream(SequenceReader {
                len: header.len,
                end,
                mark,
                done: false,
                source,
            })
        }
        VrKind::BulkData => match header.len.get() {
            Some(len) => {
                let start = source.position();
                let end = start + u64::from(len);
                source.push_scope(Scope::Value { end });
                ElementValue::BulkData(BulkDataStream::OneShot(OneShotIterator::new(
                    source, start, end,
                )))
            }
            None => {
                // an undefined length means the encapsulated fragment
                // protocol, which only pixel data is allowed to use
                ensure!(
                    header.tag == PIXEL_DATA,
                    UndefinedLengthNotAllowedSnafu { tag: header.tag }
                );
                let mark = source.push_scope(Scope::Encapsulated { fragment_end: None });
                ElementValue::BulkData(BulkDataStream::Encapsulated(EncapsulatedIterator::new(
                    source, mark,
                )))
            }
        },
    };
    Ok(StreamedElement { header, value })
}

fn defined_length(header: &DataElementHeader) -> Result<u32> {
    header
        .len
        .get()
        .ok_or_else(|| UndefinedLengthNotAllowedSnafu { tag: header.tag }.build())
}

fn read_text<R: Read>(source: &mut DataSetSource<R>, len: u32) -> Result<String> {
    let mut data = vec![0u8; len as usize];
    source.read_exact(&mut data)?;
    // the default repertoire decode cannot fail: stray bytes are escaped
    Ok(dcmio_encoding::DefaultCharacterSetCodec
        .decode(&data)
        .unwrap_or_default())
}

/// A common interface for the readers that produce a data set's elements
/// one at a time: the top level file reader and the per-item readers.
pub trait ElementRead<R: Read> {
    /// Produce the next data element of this data set, draining whatever
    /// lazy content the previous element left open. Yields `None` at the
    /// natural end of the data set.
    fn next_element(&mut self) -> Result<Option<StreamedElement<'_, R>>>;

    /// The transfer syntax governing this data set.
    fn syntax(&self) -> &'static TransferSyntax;

    /// The declared byte length of this data set, undefined when it is
    /// delimiter-terminated or top level.
    fn byte_length(&self) -> Length;
}

/// Reads the items of a sequence value, in encounter order.
///
/// In explicit length mode the reader is bounded to the sequence's byte
/// extent; in undefined length mode it ends at the sequence delimitation
/// item. Asking for the next item drains whatever remained unread of the
/// previously returned one.
pub struct SequenceReader<'a, R: Read> {
    source: &'a mut DataSetSource<R>,
    mark: usize,
    end: Option<u64>,
    len: Length,
    done: bool,
}

impl<'a, R: Read> SequenceReader<'a, R> {
    /// The declared byte length of the sequence value.
    pub fn byte_length(&self) -> Length {
        self.len
    }

    /// Produce a reader over the next item's data set, or `None` at the
    /// end of the sequence.
    pub fn next_item(&mut self) -> Result<Option<ItemReader<'_, R>>> {
        if self.done {
            return Ok(None);
        }
        self.source.unwind(self.mark + 1)?;
        if let Some(end) = self.end {
            if self.source.position() >= end {
                self.finish();
                return Ok(None);
            }
        }
        let position = self.source.position();
        let item = match self.source.decode_item_header() {
            Err(crate::error::Error::UnexpectedEndOfInput { .. }) if self.end.is_none() => {
                return TruncatedSequenceSnafu { position }.fail();
            }
            other => other?,
        };
        match item {
            SequenceItemHeader::Item { len } => {
                let end = len.get().map(|l| self.source.position() + u64::from(l));
                let mark = self.source.push_scope(Scope::Item { end });
                Ok(Some(ItemReader {
                    len,
                    end,
                    mark,
                    done: false,
                    source: &mut *self.source,
                }))
            }
            SequenceItemHeader::SequenceDelimiter => {
                // a delimiter may only terminate an undefined-length
                // sequence
                ensure!(self.end.is_none(), UnexpectedDelimiterSnafu { position });
                self.finish();
                Ok(None)
            }
            SequenceItemHeader::ItemDelimiter => InvalidItemTagSnafu {
                tag: ITEM_DELIMITER,
                position,
            }
            .fail(),
        }
    }

    /// Advance to the end of the sequence, draining all remaining items.
    pub fn close(&mut self) -> Result<()> {
        while self.next_item()?.is_some() {}
        Ok(())
    }

    /// Collect the remaining items into an in-memory sequence, with no
    /// transforms applied.
    pub fn collect_plain(&mut self) -> Result<Sequence> {
        let mut seq = Sequence::new();
        while let Some(mut item) = self.next_item()? {
            seq.push(item.collect_plain()?);
        }
        Ok(seq)
    }

    fn finish(&mut self) {
        let position = self.source.position();
        self.source.set_scope(self.mark, Scope::Value { end: position });
        self.done = true;
    }
}

/// Reads the data elements of one sequence item.
///
/// An item of defined length ends when its byte extent is exhausted; an
/// item of undefined length ends at its item delimitation item.
#[derive(Debug)]
pub struct ItemReader<'a, R: Read> {
    source: &'a mut DataSetSource<R>,
    mark: usize,
    end: Option<u64>,
    len: Length,
    done: bool,
}

impl<'a, R: Read> ItemReader<'a, R> {
    /// Advance to the end of the item, draining all remaining elements.
    pub fn close(&mut self) -> Result<()> {
        while self.next_element()?.is_some() {}
        Ok(())
    }

    /// Collect the remaining elements into a data set, with no transforms
    /// applied.
    pub fn collect_plain(&mut self) -> Result<DataSet> {
        let mut ds = DataSet::with_length(self.len);
        while let Some(elem) = self.next_element()? {
            ds.put(elem.into_owned()?);
        }
        Ok(ds)
    }

    fn finish(&mut self) {
        let position = self.source.position();
        self.source.set_scope(self.mark, Scope::Value { end: position });
        self.done = true;
    }
}

impl<'a, R: Read> ElementRead<R> for ItemReader<'a, R> {
    fn next_element(&mut self) -> Result<Option<StreamedElement<'_, R>>> {
        if self.done {
            return Ok(None);
        }
        self.source.unwind(self.mark + 1)?;
        if let Some(end) = self.end {
            if self.source.position() >= end {
                self.finish();
                return Ok(None);
            }
        }
        let position = self.source.position();
        let header = self.source.decode_header()?;
        match header.tag {
            ITEM_DELIMITER => {
                ensure!(
                    header.len == Length(0),
                    InvalidDelimiterLengthSnafu {
                        len: header.len,
                        position,
                    }
                );
                // only an undefined-length item ends on a delimiter
                ensure!(
                    self.end.is_none(),
                    InvalidItemTagSnafu {
                        tag: ITEM_DELIMITER,
                        position,
                    }
                );
                self.finish();
                Ok(None)
            }
            SEQUENCE_DELIMITER => UnexpectedDelimiterSnafu { position }.fail(),
            ITEM => InvalidItemTagSnafu {
                tag: ITEM,
                position,
            }
            .fail(),
            _ => read_element_value(self.source, header).map(Some),
        }
    }

    fn syntax(&self) -> &'static TransferSyntax {
        self.source.syntax()
    }

    fn byte_length(&self) -> Length {
        self.len
    }
}
