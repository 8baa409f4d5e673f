//! Tests of the streaming layer and the parse-time transform pipeline,
//! against hand-crafted DICOM files.

use dcmio_core::value::{ByteRegion, PrimitiveValue};
use dcmio_core::{HasLength, Tag, Value, VR};
use dcmio_encoding::text::{DynTextCodec, TextCodec};
use dcmio_parser::{
    parse, parse_with_options, DataSetReader, ElementRead, ElementValue, ParseOptions,
};
use smallvec::smallvec;

const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

/// Builds the preamble, signature and a minimal file meta group declaring
/// the given transfer syntax.
fn file_prefix(uid: &str) -> Vec<u8> {
    let mut uid_bytes = uid.as_bytes().to_vec();
    if uid_bytes.len() % 2 != 0 {
        uid_bytes.push(0x00);
    }
    let group_length = 8 + uid_bytes.len() as u32;

    let mut out = vec![0u8; 128];
    out.extend_from_slice(b"DICM");
    out.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00]);
    out.extend_from_slice(&group_length.to_le_bytes());
    out.extend_from_slice(&[0x02, 0x00, 0x10, 0x00, b'U', b'I']);
    out.extend_from_slice(&(uid_bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(&uid_bytes);
    out
}

/// The absolute offset at which the data set body starts for the files
/// built by [`file_prefix`].
fn body_offset(uid: &str) -> u64 {
    file_prefix(uid).len() as u64
}

fn us_element(tag: Tag, value: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&tag.group().to_le_bytes());
    out.extend_from_slice(&tag.element().to_le_bytes());
    out.extend_from_slice(b"US\x02\x00");
    out.extend_from_slice(&value.to_le_bytes());
    out
}

#[test]
fn parse_keeps_the_meta_group() {
    // the meta group length element itself is worth 12 bytes on the wire:
    // `02 00 00 00 'U' 'L' 04 00` followed by the 32-bit count
    let data = file_prefix(EXPLICIT_VR_LE);
    let ds = parse(&data[..]).unwrap();

    let glen = ds.get(Tag(0x0002, 0x0000)).expect("group length present");
    assert_eq!(glen.vr(), VR::UL);
    assert_eq!(glen.int_value(), Some(28));

    let uid = ds.get(Tag(0x0002, 0x0010)).expect("transfer syntax present");
    assert_eq!(uid.string(), Some(EXPLICIT_VR_LE));
}

#[test]
fn parse_simple_body_elements() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // (0008,0060) Modality, CS, "OT"
    data.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'O', b'T']);
    // (0010,0010) Patient Name, PN, "Doe^John" padded with a space
    data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x0A, 0x00]);
    data.extend_from_slice(b"Doe^John  ");
    // (0028,0010) Rows, US, 256
    data.extend_from_slice(&us_element(Tag(0x0028, 0x0010), 256));

    let ds = parse(&data[..]).unwrap();
    assert_eq!(ds.get(Tag(0x0008, 0x0060)).unwrap().string(), Some("OT"));
    assert_eq!(
        ds.get(Tag(0x0010, 0x0010)).unwrap().string(),
        Some("Doe^John")
    );
    assert_eq!(ds.get(Tag(0x0028, 0x0010)).unwrap().int_value(), Some(256));
}

#[test]
fn empty_undefined_length_sequence() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // (0008,1140) SQ of undefined length, immediately terminated
    data.extend_from_slice(&[
        0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
    ]);
    data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00]);

    // at the streaming level, the first `next_item` reports the end
    let mut reader = DataSetReader::new(&data[..]).unwrap();
    loop {
        let elem = reader.next_element().unwrap().expect("an element");
        if elem.header.tag != Tag(0x0008, 0x1140) {
            continue;
        }
        match elem.value {
            ElementValue::SequenceStream(mut seq) => {
                assert!(seq.next_item().unwrap().is_none());
            }
            _ => panic!("expected a sequence stream"),
        }
        break;
    }
    assert!(reader.next_element().unwrap().is_none());

    // at the data set level, the sequence materializes with no items
    let ds = parse(&data[..]).unwrap();
    let seq = ds
        .get(Tag(0x0008, 0x1140))
        .and_then(|e| e.value().sequence())
        .expect("a sequence value");
    assert!(seq.is_empty());
}

#[test]
fn nested_sequence_items() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // (0008,1140) SQ, undefined length, with one undefined-length item
    // holding a (0008,0060) element
    data.extend_from_slice(&[
        0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
    ]);
    data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF]);
    data.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'M', b'R']);
    data.extend_from_slice(&[0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00]);
    data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00]);
    // followed by a plain element
    data.extend_from_slice(&us_element(Tag(0x0028, 0x0010), 1));

    let ds = parse(&data[..]).unwrap();
    let seq = ds
        .get(Tag(0x0008, 0x1140))
        .and_then(|e| e.value().sequence())
        .expect("a sequence value");
    assert_eq!(seq.len(), 1);
    let item = &seq.items()[0];
    assert_eq!(item.get(Tag(0x0008, 0x0060)).unwrap().string(), Some("MR"));
    // the element after the sequence is still read correctly
    assert_eq!(ds.get(Tag(0x0028, 0x0010)).unwrap().int_value(), Some(1));
}

/// Encapsulated pixel data with an empty basic offset table and two
/// fragments.
fn encapsulated_pixel_data() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&[
        0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
    ]);
    out.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00]);
    out.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, 0x12, 0x23]);
    out.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, 0x45, 0x67]);
    out.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00]);
    out
}

#[test]
fn encapsulated_fragments_are_buffered() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&encapsulated_pixel_data());

    let ds = parse(&data[..]).unwrap();
    let pixel = ds.get(Tag(0x7FE0, 0x0010)).unwrap();
    assert!(pixel.length().is_undefined());
    assert_eq!(
        pixel.value(),
        &Value::Primitive(PrimitiveValue::Fragments(smallvec![
            vec![],
            vec![0x12, 0x23],
            vec![0x45, 0x67],
        ]))
    );
}

#[test]
fn drop_basic_offset_table_discards_the_first_fragment() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&encapsulated_pixel_data());

    let options = ParseOptions::new().drop_basic_offset_table();
    let ds = parse_with_options(&data[..], options).unwrap();
    let pixel = ds.get(Tag(0x7FE0, 0x0010)).unwrap();
    assert_eq!(
        pixel.value(),
        &Value::Primitive(PrimitiveValue::Fragments(smallvec![
            vec![0x12, 0x23],
            vec![0x45, 0x67],
        ]))
    );
}

#[test]
fn reference_bulk_data_records_fragment_regions() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&encapsulated_pixel_data());

    let base = body_offset(EXPLICIT_VR_LE);
    let options = ParseOptions::new().reference_bulk_data();
    let ds = parse_with_options(&data[..], options).unwrap();
    let pixel = ds.get(Tag(0x7FE0, 0x0010)).unwrap();
    assert_eq!(
        pixel.value(),
        &Value::Primitive(PrimitiveValue::Regions(smallvec![
            // basic offset table: after the 12-byte element header and
            // the 8-byte item header
            ByteRegion {
                offset: base + 20,
                length: 0
            },
            ByteRegion {
                offset: base + 28,
                length: 2
            },
            ByteRegion {
                offset: base + 38,
                length: 2
            },
        ]))
    );
}

#[test]
fn native_bulk_data_is_referenced_without_buffering() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // (7FE0,0010) OB of defined length 4
    data.extend_from_slice(&[
        0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 1, 2, 3, 4,
    ]);

    let base = body_offset(EXPLICIT_VR_LE);
    let options = ParseOptions::new().reference_bulk_data();
    let ds = parse_with_options(&data[..], options).unwrap();
    let pixel = ds.get(Tag(0x7FE0, 0x0010)).unwrap();
    assert_eq!(
        pixel.value(),
        &Value::Primitive(PrimitiveValue::Regions(smallvec![ByteRegion {
            offset: base + 12,
            length: 4
        }]))
    );
}

/// The image pixel module elements needed by the frame splitting
/// transform: rows=1, columns=5, samples per pixel=1, bits allocated=8,
/// number of frames=2.
fn image_pixel_module() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&us_element(Tag(0x0028, 0x0002), 1));
    // (0028,0008) Number of Frames, IS, "2 "
    out.extend_from_slice(&[0x28, 0x00, 0x08, 0x00, b'I', b'S', 0x02, 0x00, b'2', b' ']);
    out.extend_from_slice(&us_element(Tag(0x0028, 0x0010), 1));
    out.extend_from_slice(&us_element(Tag(0x0028, 0x0011), 5));
    out.extend_from_slice(&us_element(Tag(0x0028, 0x0100), 8));
    out
}

#[test]
fn split_uncompressed_pixel_data_into_frames() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&image_pixel_module());
    // (7FE0,0010) OB of defined length 10: two 5-byte frames
    data.extend_from_slice(&[
        0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00,
    ]);
    data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

    let options = ParseOptions::new().split_uncompressed_pixel_data_frames();
    let ds = parse_with_options(&data[..], options).unwrap();
    let pixel = ds.get(Tag(0x7FE0, 0x0010)).unwrap();
    assert_eq!(
        pixel.value(),
        &Value::Primitive(PrimitiveValue::Fragments(smallvec![
            vec![1, 2, 3, 4, 5],
            vec![6, 7, 8, 9, 10],
        ]))
    );
}

#[test]
fn split_frames_leaves_encapsulated_data_alone() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&image_pixel_module());
    data.extend_from_slice(&encapsulated_pixel_data());

    let options = ParseOptions::new().split_uncompressed_pixel_data_frames();
    let ds = parse_with_options(&data[..], options).unwrap();
    let pixel = ds.get(Tag(0x7FE0, 0x0010)).unwrap();
    assert_eq!(
        pixel.value(),
        &Value::Primitive(PrimitiveValue::Fragments(smallvec![
            vec![],
            vec![0x12, 0x23],
            vec![0x45, 0x67],
        ]))
    );
}

#[test]
fn drop_group_lengths_removes_them_everywhere() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // (0008,0000) group length and a regular element
    data.extend_from_slice(&[
        0x08, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00,
    ]);
    data.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'O', b'T']);

    let options = ParseOptions::new().drop_group_lengths();
    let ds = parse_with_options(&data[..], options).unwrap();
    assert!(ds.get(Tag(0x0002, 0x0000)).is_none());
    assert!(ds.get(Tag(0x0008, 0x0000)).is_none());
    assert!(ds.get(Tag(0x0008, 0x0060)).is_some());
}

#[test]
fn advancing_past_an_unread_stream_lands_on_the_next_element() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // a native bulk data element followed by a plain element
    data.extend_from_slice(&[
        0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 9, 9, 9, 9, 9, 9,
    ]);
    data.extend_from_slice(&us_element(Tag(0x7FE0, 0x0011), 7));

    let base = body_offset(EXPLICIT_VR_LE);
    let mut reader = DataSetReader::new(&data[..]).unwrap();
    // skip over the meta elements
    loop {
        let elem = reader.next_element().unwrap().expect("an element");
        if elem.header.tag == Tag(0x7FE0, 0x0010) {
            // leave the bulk data stream untouched
            break;
        }
    }
    let elem = reader.next_element().unwrap().expect("the next element");
    assert_eq!(elem.header.tag, Tag(0x7FE0, 0x0011));
    match elem.value {
        ElementValue::Primitive(PrimitiveValue::U16(v)) => assert_eq!(&v[..], &[7]),
        _ => panic!("expected unsigned shorts"),
    }
    // the unread stream was drained up to its end boundary, so the next
    // element (8-byte header, 2-byte value) was read from the right spot
    assert_eq!(reader.position(), base + 12 + 6 + 8 + 2);
}

struct MappedCodec {
    term: &'static str,
    upper: bool,
}

impl TextCodec for MappedCodec {
    fn name(&self) -> &str {
        self.term
    }

    fn decode(&self, text: &[u8]) -> dcmio_encoding::text::Result<String> {
        let s = String::from_utf8_lossy(text);
        Ok(if self.upper {
            s.to_uppercase()
        } else {
            s.to_lowercase()
        })
    }

    fn encode(&self, text: &str) -> dcmio_encoding::text::Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

#[test]
fn person_name_components_use_their_own_decoders() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // (0008,0005) Specific Character Set: two terms, space padded
    data.extend_from_slice(&[0x08, 0x00, 0x05, 0x00, b'C', b'S', 0x0A, 0x00]);
    data.extend_from_slice(b"X-LO\\X-UP ");
    // (0010,0010) Patient Name with three component groups
    data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x0E, 0x00]);
    data.extend_from_slice(b"Ab^Cd=Ef^Gh=Ij");

    let lookup = |term: &str| -> Option<DynTextCodec> {
        match term {
            "X-LO" => Some(Box::new(MappedCodec {
                term: "X-LO",
                upper: false,
            })),
            "X-UP" => Some(Box::new(MappedCodec {
                term: "X-UP",
                upper: true,
            })),
            _ => None,
        }
    };
    let options = ParseOptions::new().utf8_text_with(lookup);
    let ds = parse_with_options(&data[..], options).unwrap();
    // alphabetic group through the first decoder, ideographic through the
    // second, phonetic repeats the last declared term
    assert_eq!(
        ds.get(Tag(0x0010, 0x0010)).unwrap().string(),
        Some("ab^cd=EF^GH=IJ")
    );
}

#[test]
fn latin_text_is_decoded_to_utf8() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&[0x08, 0x00, 0x05, 0x00, b'C', b'S', 0x0A, 0x00]);
    data.extend_from_slice(b"ISO_IR 100");
    // (0010,0010) Patient Name: "Jérôme^" in latin-1
    data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00]);
    data.extend_from_slice(&[b'J', 0xE9, b'r', 0xF4, b'm', b'e', b'^', b' ']);

    let options = ParseOptions::new().utf8_text();
    let ds = parse_with_options(&data[..], options).unwrap();
    assert_eq!(
        ds.get(Tag(0x0010, 0x0010)).unwrap().string(),
        Some("Jérôme^")
    );
}

#[test]
fn reference_and_text_transforms_commute_on_offsets() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&[0x08, 0x00, 0x05, 0x00, b'C', b'S', 0x0A, 0x00]);
    data.extend_from_slice(b"ISO_IR 100");
    data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x04, 0x00]);
    data.extend_from_slice(&[0xE9, 0xE9, 0xE9, 0xE9]);
    data.extend_from_slice(&encapsulated_pixel_data());

    let first = parse_with_options(
        &data[..],
        ParseOptions::new().reference_bulk_data().utf8_text(),
    )
    .unwrap();
    let second = parse_with_options(
        &data[..],
        ParseOptions::new().utf8_text().reference_bulk_data(),
    )
    .unwrap();

    let regions_of = |ds: &dcmio_core::DataSet| match ds
        .get(Tag(0x7FE0, 0x0010))
        .unwrap()
        .value()
    {
        Value::Primitive(PrimitiveValue::Regions(regions)) => regions.clone(),
        other => panic!("expected regions, got {:?}", other),
    };
    assert_eq!(regions_of(&first), regions_of(&second));
}

#[test]
fn closing_the_reader_drains_the_whole_data_set() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&encapsulated_pixel_data());
    let total = data.len() as u64;

    let mut reader = DataSetReader::new(&data[..]).unwrap();
    reader.close().unwrap();
    assert!(reader.next_element().unwrap().is_none());
    assert_eq!(reader.position(), total);
}

struct DropModality;

impl<R: std::io::Read> dcmio_parser::Transform<R> for DropModality {
    fn apply<'a>(
        &mut self,
        elem: dcmio_parser::StreamedElement<'a, R>,
    ) -> dcmio_parser::Result<Option<dcmio_parser::StreamedElement<'a, R>>> {
        if elem.header.tag == Tag(0x0008, 0x0060) {
            Ok(None)
        } else {
            Ok(Some(elem))
        }
    }
}

#[test]
fn caller_supplied_transforms_run_in_order() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'O', b'T']);
    data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00]);
    data.extend_from_slice(b"Doe^John");

    let options = ParseOptions::new().with_transform(DropModality);
    let ds = parse_with_options(&data[..], options).unwrap();
    assert!(ds.get(Tag(0x0008, 0x0060)).is_none());
    assert!(ds.get(Tag(0x0010, 0x0010)).is_some());
}

#[test]
fn transforms_apply_to_sequence_items_first() {
    // post-order: the item elements are transformed before the sequence
    // element, so dropping by tag empties the item
    let mut data = file_prefix(EXPLICIT_VR_LE);
    data.extend_from_slice(&[
        0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
    ]);
    data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF]);
    data.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'M', b'R']);
    data.extend_from_slice(&[0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00]);
    data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00]);

    let options = ParseOptions::new().with_transform(DropModality);
    let ds = parse_with_options(&data[..], options).unwrap();
    let seq = ds
        .get(Tag(0x0008, 0x1140))
        .and_then(|e| e.value().sequence())
        .expect("the sequence is kept");
    assert_eq!(seq.len(), 1);
    assert!(seq.items()[0].is_empty());
}

#[test]
fn missing_signature_is_rejected() {
    let mut data = vec![0u8; 128];
    data.extend_from_slice(b"DCIM"); // scrambled
    data.extend_from_slice(&[0u8; 16]);
    assert!(matches!(
        parse(&data[..]),
        Err(dcmio_parser::Error::BadSignature { .. })
    ));
}

#[test]
fn undefined_length_outside_pixel_data_is_rejected() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // (0008,0000) OB with undefined length is not valid
    data.extend_from_slice(&[
        0x08, 0x00, 0x01, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
    ]);
    assert!(matches!(
        parse(&data[..]),
        Err(dcmio_parser::Error::UndefinedLengthNotAllowed { .. })
    ));
}

#[test]
fn truncated_sequence_is_reported() {
    let mut data = file_prefix(EXPLICIT_VR_LE);
    // an undefined-length sequence with no delimiter before EOF
    data.extend_from_slice(&[
        0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
    ]);
    let err = parse(&data[..]).unwrap_err();
    assert!(matches!(
        err,
        dcmio_parser::Error::TruncatedSequence { .. }
    ));
}
