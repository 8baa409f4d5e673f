//! The data element writer: serializes data sets back into the DICOM
//! file format, recomputing value lengths and the file meta group length
//! on the way out.

use crate::options::ConstructOptions;
use dcmio_core::dataset::{DataElement, DataSet, Sequence, Value};
use dcmio_core::header::{
    DataElementHeader, Header, Length, Tag, VrKind, FILE_META_GROUP_LENGTH, TRANSFER_SYNTAX_UID,
    VR,
};
use dcmio_core::value::{PrimitiveValue, ValueType};
use dcmio_core::HasLength;
use dcmio_encoding::encode::DynEncoder;
use dcmio_encoding::text::TextCodec;
use dcmio_encoding::transfer_syntax::{self, TransferSyntax, EXPLICIT_VR_LITTLE_ENDIAN};
use smallvec::smallvec;
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::Write;

/// An error which may occur while constructing DICOM output.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The header data set given to the writer holds elements outside
    /// the file meta group.
    #[snafu(display("Expected a file meta group, found element tagged {}", tag))]
    NotMetaHeader { tag: Tag, backtrace: Backtrace },

    #[snafu(display("Transfer Syntax UID (0002,0010) not present in file meta group"))]
    MissingTransferSyntax { backtrace: Backtrace },

    #[snafu(display("Writing in transfer syntax {} is not supported", uid))]
    UnsupportedSyntax { uid: String, backtrace: Backtrace },

    #[snafu(display("Failed to encode data element"))]
    Encode {
        #[snafu(backtrace)]
        source: dcmio_encoding::encode::Error,
    },

    #[snafu(display("Failed to write to output"))]
    WriteFailure {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Value of element tagged {} in form {} cannot be written: {}",
        tag,
        got,
        context
    ))]
    InvalidValueType {
        tag: Tag,
        got: ValueType,
        context: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Construct transform failed"))]
    TransformFailure {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wrap an arbitrary error raised by a caller-supplied transform.
    pub fn transform<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::TransformFailure {
            source: Box::new(source),
        }
    }
}

/// Writes data elements one at a time into a DICOM file.
///
/// On construction the writer emits the 128-byte preamble of zeros, the
/// "DICM" signature, and the file meta group in Explicit VR Little
/// Endian, with the file meta group length element recomputed from the
/// other meta elements. Body elements are then written in the transfer
/// syntax declared by the header.
pub struct DataElementWriter<W: Write> {
    to: W,
    syntax: &'static TransferSyntax,
    encoder: DynEncoder<W>,
    options: ConstructOptions,
}

impl<W: Write> DataElementWriter<W> {
    /// Create a writer over `to`, writing the preamble, signature and the
    /// given file meta group immediately.
    pub fn new(to: W, meta: &DataSet) -> Result<Self> {
        DataElementWriter::new_with_options(to, meta, ConstructOptions::new())
    }

    /// Create a writer over `to` with construct options, which are
    /// applied to the meta elements now and to every body element upon
    /// [`write`](Self::write).
    pub fn new_with_options(
        mut to: W,
        meta: &DataSet,
        mut options: ConstructOptions,
    ) -> Result<Self> {
        if let Some(stray) = meta.iter().find(|e| !e.tag().is_meta()) {
            return NotMetaHeaderSnafu { tag: stray.tag() }.fail();
        }

        let uid = meta
            .get(TRANSFER_SYNTAX_UID)
            .and_then(DataElement::string)
            .map(str::to_owned);
        let uid = match uid {
            Some(uid) => uid,
            None => return MissingTransferSyntaxSnafu.fail(),
        };
        let syntax = transfer_syntax::from_uid(&uid);
        let encoder = match syntax.encoder_for::<W>() {
            Some(encoder) => encoder,
            None => return UnsupportedSyntaxSnafu { uid }.fail(),
        };

        // process the meta elements up front: transforms may change
        // lengths, and the group length must account for the final shape
        let mut processed = Vec::new();
        for elem in meta.iter() {
            if elem.tag() == FILE_META_GROUP_LENGTH {
                continue;
            }
            if let Some(elem) =
                process_element(elem.clone(), &EXPLICIT_VR_LITTLE_ENDIAN, &mut options)?
            {
                processed.push(elem);
            }
        }

        let group_length: u64 = processed
            .iter()
            .map(|e| EXPLICIT_VR_LITTLE_ENDIAN.element_size(e.vr(), e.length().0))
            .sum();
        let group_length_elem = DataElement::new_with_len(
            FILE_META_GROUP_LENGTH,
            VR::UL,
            Length(4),
            Value::Primitive(PrimitiveValue::U32(smallvec![group_length as u32])),
        );

        // 128-byte preamble of zeros, then the "DICM" signature
        to.write_all(&[0u8; 128]).context(WriteFailureSnafu)?;
        to.write_all(b"DICM").context(WriteFailureSnafu)?;

        // meta elements are always in Explicit VR Little Endian,
        // ascending tag order; the group length element leads
        let meta_encoder = dcmio_encoding::encode::file_header_encoder();
        emit_element(&mut to, &meta_encoder, &group_length_elem)?;
        for elem in &processed {
            emit_element(&mut to, &meta_encoder, elem)?;
        }

        Ok(DataElementWriter {
            to,
            syntax,
            encoder,
            options,
        })
    }

    /// The transfer syntax that body elements are written in.
    pub fn transfer_syntax(&self) -> &'static TransferSyntax {
        self.syntax
    }

    /// Write a single data element in the body transfer syntax, applying
    /// the construct transforms and recomputing its value length first.
    pub fn write(&mut self, elem: &DataElement) -> Result<()> {
        let elem = match process_element(elem.clone(), self.syntax, &mut self.options)? {
            Some(elem) => elem,
            None => return Ok(()),
        };
        emit_element(&mut self.to, self.encoder.as_ref(), &elem)
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.to
    }
}

/// Apply the construct transforms to an element (pre-order: the element
/// first, then the elements of its items) and recompute its lengths.
fn process_element(
    elem: DataElement,
    syntax: &TransferSyntax,
    options: &mut ConstructOptions,
) -> Result<Option<DataElement>> {
    let mut elem = elem;
    for transform in options.transforms.iter_mut() {
        match transform.apply(elem)? {
            Some(out) => elem = out,
            None => return Ok(None),
        }
    }

    // recurse into sequence items after the parent has been transformed
    let (header, value) = elem.into_parts();
    let value = match value {
        Value::Sequence(seq) => {
            let mut out = Sequence::new();
            for item in seq {
                let item_len = item.length();
                let mut processed = DataSet::with_length(item_len);
                for child in item {
                    if let Some(child) = process_element(child, syntax, options)? {
                        processed.put(child);
                    }
                }
                out.push(processed);
            }
            Value::Sequence(out)
        }
        value => value,
    };

    let mut elem = DataElement::new_with_len(header.tag, header.vr, header.len, value);
    recompute_length(&mut elem, syntax)?;
    Ok(Some(elem))
}

/// Recompute the value length of an element (and, recursively, of its
/// items) from its actual content.
///
/// An undefined length declared on the element or on an item is kept: it
/// selects the delimiter-terminated encoding. Everything else is summed
/// from the content, rounded up to even, and falls back to undefined on
/// 32-bit overflow.
fn recompute_length(elem: &mut DataElement, syntax: &TransferSyntax) -> Result<()> {
    let keep_undefined = elem.length().is_undefined();
    let tag = elem.tag();
    let vr = elem.vr();
    let len = match elem.value_mut() {
        Value::Primitive(v) => {
            ensure!(
                !matches!(v, PrimitiveValue::Regions(_)),
                InvalidValueTypeSnafu {
                    tag,
                    got: ValueType::Regions,
                    context: "byte region references hold no data to write",
                }
            );
            if keep_undefined {
                Length::UNDEFINED
            } else {
                let n = match v {
                    PrimitiveValue::Strs(values) => encoded_text(values).len() as u64,
                    v => v.byte_len(),
                };
                even_length(n)
            }
        }
        Value::Sequence(seq) => {
            let mut total: u64 = 0;
            let mut any_undefined = keep_undefined;
            for item in seq.items_mut() {
                let item_len = recompute_item_length(item, syntax)?;
                item.set_length(item_len);
                match item_len.get() {
                    // item header is 8 bytes, plus the item content
                    Some(l) => total += 8 + u64::from(l),
                    None => any_undefined = true,
                }
            }
            if any_undefined {
                Length::UNDEFINED
            } else {
                even_length(total)
            }
        }
    };
    elem.set_length(len);
    Ok(())
}

fn recompute_item_length(item: &mut DataSet, syntax: &TransferSyntax) -> Result<Length> {
    let keep_undefined = item.length().is_undefined();
    let elems: Vec<DataElement> = std::mem::take(item).into_iter().collect();
    let mut total: u64 = 0;
    let mut any_undefined = keep_undefined;
    for mut child in elems {
        recompute_length(&mut child, syntax)?;
        match child.length().get() {
            Some(l) => total += syntax.header_size(child.vr()) + u64::from(l),
            None => any_undefined = true,
        }
        item.put(child);
    }
    if any_undefined {
        Ok(Length::UNDEFINED)
    } else if total > u64::from(u32::MAX - 1) {
        Ok(Length::UNDEFINED)
    } else {
        Ok(Length(total as u32))
    }
}

fn even_length(n: u64) -> Length {
    let n = n + n % 2;
    if n >= u64::from(u32::MAX) {
        Length::UNDEFINED
    } else {
        Length(n as u32)
    }
}

/// The padding byte used to round a value of this VR to even length.
fn padding_byte(vr: VR) -> u8 {
    match vr.kind() {
        // UIDs are padded with a null byte, all other text with a space
        VrKind::UniqueIdentifier => 0x00,
        _ => b' ',
    }
}

/// Serialize the text value of an element, joining its values with
/// backslash separators.
///
/// Values are encoded back through the default repertoire, which restores
/// the original bytes of any text the parser materialized; text outside
/// the repertoire (such as values decoded to UTF-8 by the text transform)
/// is written in UTF-8.
fn encoded_text(values: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(b'\\');
        }
        match dcmio_encoding::DefaultCharacterSetCodec.encode(value) {
            Ok(bytes) => out.extend_from_slice(&bytes),
            Err(_) => out.extend_from_slice(value.as_bytes()),
        }
    }
    out
}

/// Emit one data element: header, then value, padded to even length.
fn emit_element<W, E>(to: &mut W, encoder: &E, elem: &DataElement) -> Result<()>
where
    W: Write,
    E: dcmio_encoding::EncodeTo<W> + ?Sized,
{
    let header = DataElementHeader::new(elem.tag(), elem.vr(), elem.length());
    encoder.encode_element_header(to, header).context(EncodeSnafu)?;

    match elem.value() {
        Value::Primitive(v) => emit_primitive(to, encoder, elem, v),
        Value::Sequence(seq) => emit_sequence(to, encoder, elem, seq),
    }
}

fn emit_primitive<W, E>(
    to: &mut W,
    encoder: &E,
    elem: &DataElement,
    value: &PrimitiveValue,
) -> Result<()>
where
    W: Write,
    E: dcmio_encoding::EncodeTo<W> + ?Sized,
{
    match value {
        PrimitiveValue::Empty => Ok(()),
        PrimitiveValue::Strs(values) => {
            let mut bytes = encoded_text(values);
            if bytes.len() % 2 != 0 {
                bytes.push(padding_byte(elem.vr()));
            }
            to.write_all(&bytes).context(WriteFailureSnafu)
        }
        PrimitiveValue::Fragments(fragments) => {
            if elem.length().is_undefined() {
                // encapsulated form: one item per fragment, then the
                // sequence delimitation item
                for fragment in fragments {
                    let len = fragment.len() as u32 + (fragment.len() as u32 % 2);
                    encoder.encode_item_header(to, len).context(EncodeSnafu)?;
                    to.write_all(fragment).context(WriteFailureSnafu)?;
                    if fragment.len() % 2 != 0 {
                        to.write_all(&[0x00]).context(WriteFailureSnafu)?;
                    }
                }
                encoder.encode_sequence_delimiter(to).context(EncodeSnafu)
            } else {
                let total: usize = fragments.iter().map(Vec::len).sum();
                for fragment in fragments {
                    to.write_all(fragment).context(WriteFailureSnafu)?;
                }
                if total % 2 != 0 {
                    to.write_all(&[0x00]).context(WriteFailureSnafu)?;
                }
                Ok(())
            }
        }
        PrimitiveValue::Regions(_) => InvalidValueTypeSnafu {
            tag: elem.tag(),
            got: ValueType::Regions,
            context: "byte region references hold no data to write",
        }
        .fail(),
        PrimitiveValue::I16(values) => {
            for &v in values {
                encoder.encode_ss(to, v).context(EncodeSnafu)?;
            }
            Ok(())
        }
        PrimitiveValue::U16(values) => {
            for &v in values {
                encoder.encode_us(to, v).context(EncodeSnafu)?;
            }
            Ok(())
        }
        PrimitiveValue::I32(values) => {
            for &v in values {
                encoder.encode_sl(to, v).context(EncodeSnafu)?;
            }
            Ok(())
        }
        PrimitiveValue::U32(values) => {
            for &v in values {
                encoder.encode_ul(to, v).context(EncodeSnafu)?;
            }
            Ok(())
        }
        PrimitiveValue::F32(values) => {
            for &v in values {
                encoder.encode_fl(to, v).context(EncodeSnafu)?;
            }
            Ok(())
        }
        PrimitiveValue::F64(values) => {
            for &v in values {
                encoder.encode_fd(to, v).context(EncodeSnafu)?;
            }
            Ok(())
        }
        PrimitiveValue::Tags(values) => {
            for &v in values {
                encoder.encode_tag(to, v).context(EncodeSnafu)?;
            }
            Ok(())
        }
    }
}

fn emit_sequence<W, E>(to: &mut W, encoder: &E, elem: &DataElement, seq: &Sequence) -> Result<()>
where
    W: Write,
    E: dcmio_encoding::EncodeTo<W> + ?Sized,
{
    for item in seq.items() {
        encoder
            .encode_item_header(to, item.length().0)
            .context(EncodeSnafu)?;
        for child in item.iter() {
            emit_element(to, encoder, child)?;
        }
        if item.length().is_undefined() {
            encoder.encode_item_delimiter(to).context(EncodeSnafu)?;
        }
    }
    if elem.length().is_undefined() {
        encoder.encode_sequence_delimiter(to).context(EncodeSnafu)?;
    }
    Ok(())
}

/// Write a complete data set as a DICOM file: preamble, signature, the
/// file meta group (with its group length recomputed), and the body in
/// the transfer syntax declared by (0002,0010).
pub fn construct<W: Write>(to: W, data_set: &DataSet) -> Result<()> {
    construct_with_options(to, data_set, ConstructOptions::new())
}

/// Write a complete data set as a DICOM file, applying the given
/// construct options to every element.
pub fn construct_with_options<W: Write>(
    to: W,
    data_set: &DataSet,
    options: ConstructOptions,
) -> Result<()> {
    let meta = data_set.meta_set();
    let mut writer = DataElementWriter::new_with_options(to, &meta, options)?;
    for elem in data_set.iter().filter(|e| !e.tag().is_meta()) {
        writer.write(elem)?;
    }
    Ok(())
}
