//! The built-in element transforms.
//!
//! Each of these is exposed as a method of
//! [`ParseOptions`](crate::pipeline::ParseOptions); they are ordinary
//! implementations of [`Transform`] and can be combined freely with
//! caller-supplied ones.

use crate::bulkdata::{BulkDataStream, NativeMultiFrame};
use crate::error::{InvalidValueTypeSnafu, Result, UnsupportedCharacterSetSnafu};
use crate::pipeline::Transform;
use crate::read::{ElementValue, StreamedElement};
use dcmio_core::header::{DataElementHeader, Tag, PIXEL_DATA, SPECIFIC_CHARACTER_SET, VR};
use dcmio_core::value::{PrimitiveValue, ValueType};
use dcmio_encoding::text::{DefaultCharacterSetCodec, DynTextCodec, TextCodec};
use snafu::ensure;
use std::io::Read;

/// Image pixel module elements tracked by the frame splitting transform.
const ROWS: Tag = Tag(0x0028, 0x0010);
const COLUMNS: Tag = Tag(0x0028, 0x0011);
const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);

/// Excludes all group length elements (gggg,0000) from the output.
pub struct DropGroupLengths;

impl<R: Read> Transform<R> for DropGroupLengths {
    fn apply<'a>(
        &mut self,
        elem: StreamedElement<'a, R>,
    ) -> Result<Option<StreamedElement<'a, R>>> {
        if elem.header.tag.is_group_length() {
            Ok(None)
        } else {
            Ok(Some(elem))
        }
    }
}

/// Discards the basic offset table fragment of encapsulated pixel data,
/// advancing the fragment stream so that its next fragment is the first
/// frame.
pub struct DropBasicOffsetTable;

impl<R: Read> Transform<R> for DropBasicOffsetTable {
    fn apply<'a>(
        &mut self,
        mut elem: StreamedElement<'a, R>,
    ) -> Result<Option<StreamedElement<'a, R>>> {
        if elem.header.tag == PIXEL_DATA {
            if let ElementValue::BulkData(stream) = &mut elem.value {
                if stream.is_encapsulated() {
                    if let Some(mut table) = stream.next_fragment()? {
                        table.close()?;
                    }
                }
            }
        }
        Ok(Some(elem))
    }
}

/// Converts the bulk data of matched elements to byte region references
/// into the input, draining the stream without buffering any payload.
pub struct ReferenceBulkData<F> {
    predicate: F,
}

impl<F> ReferenceBulkData<F>
where
    F: FnMut(&DataElementHeader) -> bool,
{
    /// Reference the bulk data of every element matched by `predicate`.
    pub fn new(predicate: F) -> Self {
        ReferenceBulkData { predicate }
    }
}

impl ReferenceBulkData<fn(&DataElementHeader) -> bool> {
    /// Reference pixel data only, the default definition of bulk data.
    pub fn pixel_data_only() -> Self {
        ReferenceBulkData {
            predicate: |header: &DataElementHeader| header.tag == PIXEL_DATA,
        }
    }
}

impl<R, F> Transform<R> for ReferenceBulkData<F>
where
    R: Read,
    F: FnMut(&DataElementHeader) -> bool,
{
    fn apply<'a>(
        &mut self,
        mut elem: StreamedElement<'a, R>,
    ) -> Result<Option<StreamedElement<'a, R>>> {
        if (self.predicate)(&elem.header) {
            if let ElementValue::BulkData(stream) = &mut elem.value {
                let regions = stream.collect_references()?;
                elem.value = ElementValue::Primitive(PrimitiveValue::Regions(regions));
            }
        }
        Ok(Some(elem))
    }
}

/// Splits uncompressed pixel data into one fragment per image frame.
///
/// The transform remembers the last values seen for the image pixel
/// module elements it depends on. When the pixel data element arrives,
/// encapsulated (compressed) data passes through unchanged; uncompressed
/// data is re-partitioned into `rows * columns * samples per pixel *
/// bits allocated / 8` byte frames. Pixel data that does not conform
/// (a bits allocated value that is not a whole number of bytes, or a
/// non-positive frame length) is dropped from the output.
#[derive(Default)]
pub struct SplitPixelDataFrames {
    rows: i64,
    columns: i64,
    samples_per_pixel: i64,
    bits_allocated: i64,
    number_of_frames: i64,
}

impl SplitPixelDataFrames {
    fn record(&mut self, elem: &StreamedElement<'_, impl Read>) -> Result<()> {
        let slot = match elem.header.tag {
            ROWS => &mut self.rows,
            COLUMNS => &mut self.columns,
            SAMPLES_PER_PIXEL => &mut self.samples_per_pixel,
            BITS_ALLOCATED => &mut self.bits_allocated,
            NUMBER_OF_FRAMES => &mut self.number_of_frames,
            _ => return Ok(()),
        };
        let value = match &elem.value {
            ElementValue::Primitive(v) => v.int_value(),
            _ => None,
        };
        match value {
            Some(v) => {
                *slot = v;
                Ok(())
            }
            None => InvalidValueTypeSnafu {
                tag: elem.header.tag,
                got: value_type_of(&elem.value),
                context: "not convertible to an integer",
            }
            .fail(),
        }
    }
}

fn value_type_of<R: Read>(value: &ElementValue<'_, R>) -> ValueType {
    match value {
        ElementValue::Primitive(v) => v.value_type(),
        _ => ValueType::Fragments,
    }
}

impl<R: Read> Transform<R> for SplitPixelDataFrames {
    fn apply<'a>(
        &mut self,
        mut elem: StreamedElement<'a, R>,
    ) -> Result<Option<StreamedElement<'a, R>>> {
        self.record(&elem)?;
        if elem.header.tag != PIXEL_DATA {
            return Ok(Some(elem));
        }

        match elem.value {
            // encapsulated (compressed) pixel data passes through
            ElementValue::BulkData(stream) if stream.is_encapsulated() => {
                elem.value = ElementValue::BulkData(stream);
                Ok(Some(elem))
            }
            ElementValue::BulkData(stream) => {
                // only whole-byte sample sizes can be split
                if self.bits_allocated % 8 != 0 {
                    return Ok(None);
                }
                let frame_length =
                    self.rows * self.columns * self.samples_per_pixel * self.bits_allocated / 8;
                if frame_length <= 0 {
                    return Ok(None);
                }
                let frames = self.number_of_frames.max(1) as u64;
                match stream {
                    BulkDataStream::OneShot(one_shot) => {
                        let split = NativeMultiFrame::from_one_shot(
                            one_shot,
                            elem.header.tag,
                            frame_length as u64,
                            frames,
                        )?;
                        elem.value = ElementValue::BulkData(BulkDataStream::Frames(split));
                        Ok(Some(elem))
                    }
                    // already split
                    other => {
                        elem.value = ElementValue::BulkData(other);
                        Ok(Some(elem))
                    }
                }
            }
            value => {
                elem.value = value;
                Ok(Some(elem))
            }
        }
    }
}

/// Decodes textual values to UTF-8 according to the specific character
/// set in effect.
///
/// The transform maintains an encoding system of three decoders, for the
/// alphabetic, ideographic and phonetic component groups of person
/// names, initialized from the default repertoire and updated whenever a
/// specific character set (0008,0005) element is seen. When fewer than
/// three terms are declared, the last one is repeated. Decoding failures
/// keep the original value, as textual corruption is common and often
/// intentional.
pub struct Utf8Text<L> {
    lookup: L,
    terms: Vec<String>,
}

impl<L> Utf8Text<L>
where
    L: FnMut(&str) -> Option<DynTextCodec>,
{
    /// Create the transform with the given character set term lookup.
    pub fn new(lookup: L) -> Self {
        Utf8Text {
            lookup,
            terms: Vec::new(),
        }
    }

    /// The decoder for the component group at `index` (0 alphabetic,
    /// 1 ideographic, 2 phonetic) under the character sets currently in
    /// effect.
    fn codec(&mut self, index: usize) -> Result<DynTextCodec> {
        let term = match self.terms.get(index).or_else(|| self.terms.last()) {
            Some(term) => term.as_str(),
            None => return Ok(Box::new(DefaultCharacterSetCodec)),
        };
        match (self.lookup)(term) {
            Some(codec) => Ok(codec),
            None => UnsupportedCharacterSetSnafu { term }.fail(),
        }
    }

    fn update_character_sets(&mut self, elem: &StreamedElement<'_, impl Read>) -> Result<()> {
        let terms: Vec<String> = match &elem.value {
            ElementValue::Primitive(PrimitiveValue::Strs(v)) => v.iter().cloned().collect(),
            // an absent or non-textual value selects the default repertoire
            _ => Vec::new(),
        };
        // resolve eagerly so that a bad character set fails on the
        // element that declared it
        self.terms = terms;
        for index in 0..self.terms.len().min(3) {
            self.codec(index)?;
        }
        Ok(())
    }
}

fn recode(codec: &DynTextCodec, text: &str) -> String {
    // the parser materialized this text through the default repertoire,
    // which is reversible; take the original bytes back and decode them
    // with the declared character set
    let bytes = match DefaultCharacterSetCodec.encode(text) {
        Ok(bytes) => bytes,
        Err(_) => return text.to_owned(),
    };
    match codec.decode(&bytes) {
        Ok(decoded) => decoded,
        Err(_) => {
            tracing::warn!(
                "could not decode text with character set {:?}, keeping raw value",
                codec.name()
            );
            text.to_owned()
        }
    }
}

impl<R, L> Transform<R> for Utf8Text<L>
where
    R: Read,
    L: FnMut(&str) -> Option<DynTextCodec>,
{
    fn apply<'a>(
        &mut self,
        mut elem: StreamedElement<'a, R>,
    ) -> Result<Option<StreamedElement<'a, R>>> {
        if elem.header.tag == SPECIFIC_CHARACTER_SET {
            self.update_character_sets(&elem)?;
            return Ok(Some(elem));
        }

        match elem.header.vr {
            VR::PN => {
                let codecs = [self.codec(0)?, self.codec(1)?, self.codec(2)?];
                if let ElementValue::Primitive(PrimitiveValue::Strs(values)) = &mut elem.value {
                    if let Some(name) = values.first() {
                        // the component groups (alphabetic, ideographic,
                        // phonetic) each use their own decoder
                        let decoded: Vec<String> = name
                            .split('=')
                            .enumerate()
                            .map(|(i, group)| {
                                if i < codecs.len() {
                                    recode(&codecs[i], group)
                                } else {
                                    group.to_owned()
                                }
                            })
                            .collect();
                        *values = smallvec::smallvec![decoded.join("=")];
                    }
                }
            }
            VR::SH | VR::LO | VR::ST | VR::LT => {
                let codec = self.codec(0)?;
                if let ElementValue::Primitive(PrimitiveValue::Strs(values)) = &mut elem.value {
                    for value in values.iter_mut() {
                        *value = recode(&codec, value);
                    }
                }
            }
            VR::UC | VR::UT => {
                let codec = self.codec(0)?;
                match &mut elem.value {
                    ElementValue::Primitive(PrimitiveValue::Strs(values)) => {
                        for value in values.iter_mut() {
                            *value = recode(&codec, value);
                        }
                    }
                    ElementValue::BulkData(stream) => {
                        // large text arrives as a stream; it has to be
                        // buffered to be decoded
                        let mut fragments = stream.collect_fragments()?;
                        ensure!(
                            fragments.len() <= 1,
                            InvalidValueTypeSnafu {
                                tag: elem.header.tag,
                                got: ValueType::Fragments,
                                context: "multiple fragments in a text value",
                            }
                        );
                        let data = fragments.pop().unwrap_or_default();
                        let text = match codec.decode(&data) {
                            Ok(decoded) => decoded,
                            Err(_) => DefaultCharacterSetCodec
                                .decode(&data)
                                .unwrap_or_default(),
                        };
                        let values = if elem.header.vr == VR::UC {
                            text.split('\\').map(str::to_owned).collect()
                        } else {
                            smallvec::smallvec![text.trim_end().to_owned()]
                        };
                        elem.value = ElementValue::Primitive(PrimitiveValue::Strs(values));
                    }
                    _ => (),
                }
            }
            _ => (),
        }
        Ok(Some(elem))
    }
}
