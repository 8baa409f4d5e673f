//! The top level driver for reading DICOM files: the 128-byte preamble
//! and "DICM" signature, the buffered file meta group, the transfer
//! syntax resolution, and the optional deflate wrapper around the body.

use crate::error::{
    BadSignatureSnafu, DecodeHeaderSnafu, InvalidItemTagSnafu, MissingMetaGroupLengthSnafu,
    MissingTransferSyntaxSnafu, ReadFailureSnafu, Result, UnexpectedDelimiterSnafu,
    UnexpectedEndOfInputSnafu,
};
use crate::read::{read_element_value, ElementRead, StreamedElement};
use crate::stateful::DataSetSource;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dcmio_core::dataset::DataElement;
use dcmio_core::dictionary::{DataDictionary, StubDataDictionary};
use dcmio_core::header::{
    Header, Length, FILE_META_GROUP_LENGTH, ITEM, ITEM_DELIMITER, SEQUENCE_DELIMITER,
    TRANSFER_SYNTAX_UID, VR,
};
use dcmio_core::value::PrimitiveValue;
use dcmio_core::Value;
use dcmio_encoding::decode::{file_header_decoder, DecodeFrom};
use dcmio_encoding::transfer_syntax::{self, TransferSyntax, EXPLICIT_VR_LITTLE_ENDIAN};
use flate2::read::DeflateDecoder;
use smallvec::smallvec;
use snafu::{ensure, IntoError};
use std::collections::VecDeque;
use std::io::{self, Cursor, Read};

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

/// The byte source of the data set body: the original reader, or an
/// inflating wrapper around it when the transfer syntax is the deflated
/// one.
pub enum Body<R: Read> {
    /// The data set follows in its stored form.
    Plain(R),
    /// The data set is deflated and inflated on the fly.
    Deflated(DeflateDecoder<R>),
}

impl<R: Read> Read for Body<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Plain(r) => r.read(buf),
            Body::Deflated(r) => r.read(buf),
        }
    }
}

/// An iterator over the data elements of a DICOM file.
///
/// The file meta elements are yielded first, already materialized, and
/// the body elements follow in the transfer syntax declared by the meta
/// group. Advancing past an element whose value is a lazy stream drains
/// whatever the consumer left unread, so the underlying position always
/// lands on the next element boundary.
pub struct DataSetReader<R: Read> {
    meta: VecDeque<DataElement>,
    source: DataSetSource<Body<R>>,
    done: bool,
}

impl<R: Read> DataSetReader<R> {
    /// Create a reader over a standard DICOM file, resolving implicit VRs
    /// with an empty dictionary.
    pub fn new(src: R) -> Result<Self> {
        DataSetReader::new_with_dictionary(src, StubDataDictionary)
    }

    /// Create a reader over a standard DICOM file, resolving implicit VRs
    /// through the given data dictionary.
    pub fn new_with_dictionary<D>(mut src: R, dict: D) -> Result<Self>
    where
        D: DataDictionary + 'static,
    {
        let mut position: u64 = 0;

        // 128-byte preamble (content ignored) and "DICM" signature
        let mut preamble = [0u8; 132];
        read_exact_plain(&mut src, &mut preamble, &mut position)?;
        ensure!(preamble[128..132] == DICM_MAGIC_CODE, BadSignatureSnafu);

        // the first element must be the file meta group length
        let mut first = [0u8; 12];
        read_exact_plain(&mut src, &mut first, &mut position)?;
        let decoder = file_header_decoder();
        let (header, _) = decoder
            .decode_header(&mut &first[..])
            .map_err(|e| DecodeHeaderSnafu { position: 132u64 }.into_error(e))?;
        ensure!(
            header.tag() == FILE_META_GROUP_LENGTH && header.len == Length(4),
            MissingMetaGroupLengthSnafu { tag: header.tag() }
        );
        let group_length = LittleEndian::read_u32(&first[8..12]);

        // buffer exactly that many bytes of meta elements
        let mut meta_bytes = vec![0u8; group_length as usize];
        read_exact_plain(&mut src, &mut meta_bytes, &mut position)?;

        let mut meta = VecDeque::new();
        meta.push_back(DataElement::new_with_len(
            FILE_META_GROUP_LENGTH,
            VR::UL,
            Length(4),
            Value::Primitive(PrimitiveValue::U32(smallvec![group_length])),
        ));

        // the meta group is always encoded in Explicit VR Little Endian
        let mut meta_source = DataSetSource::new(
            Cursor::new(meta_bytes),
            &EXPLICIT_VR_LITTLE_ENDIAN,
            StubDataDictionary,
            position - u64::from(group_length),
        );
        while meta_source.has_data_left()? {
            let header = meta_source.decode_header()?;
            let elem = read_element_value(&mut meta_source, header)?.into_owned()?;
            meta.push_back(elem);
        }

        // resolve the body transfer syntax from (0002,0010)
        let uid = meta
            .iter()
            .find(|e| e.tag() == TRANSFER_SYNTAX_UID)
            .and_then(DataElement::string)
            .map(str::to_owned);
        let uid = match uid {
            Some(uid) => uid,
            None => return MissingTransferSyntaxSnafu.fail(),
        };
        let syntax = transfer_syntax::from_uid(&uid);
        if syntax.uid() != uid.trim_end_matches(['\0', ' ']) {
            tracing::debug!(
                "no dedicated specifier for transfer syntax {:?}, \
                 reading data set as Explicit VR Little Endian",
                uid
            );
        }

        let source = if syntax.is_deflated() {
            // offsets restart at zero in the inflated stream
            DataSetSource::new(Body::Deflated(DeflateDecoder::new(src)), syntax, dict, 0)
        } else {
            DataSetSource::new(Body::Plain(src), syntax, dict, position)
        };

        Ok(DataSetReader {
            meta,
            source,
            done: false,
        })
    }

    /// The transfer syntax of the data set body.
    pub fn transfer_syntax(&self) -> &'static TransferSyntax {
        self.source.syntax()
    }

    /// The absolute number of bytes consumed from the body's input.
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Discard all remaining data elements, leaving the input at the end
    /// of the data set.
    pub fn close(&mut self) -> Result<()> {
        while self.next_element()?.is_some() {}
        Ok(())
    }
}

impl<R: Read> ElementRead<Body<R>> for DataSetReader<R> {
    fn next_element(&mut self) -> Result<Option<StreamedElement<'_, Body<R>>>> {
        // meta elements come first, already materialized
        if let Some(elem) = self.meta.pop_front() {
            return Ok(Some(StreamedElement::from_owned(elem)));
        }
        if self.done {
            return Ok(None);
        }
        // drain whatever the previous element left open
        self.source.unwind(0)?;
        if !self.source.has_data_left()? {
            // end of input is only a natural ending at the top level
            self.done = true;
            return Ok(None);
        }
        let position = self.source.position();
        let header = self.source.decode_header()?;
        match header.tag() {
            ITEM | ITEM_DELIMITER => InvalidItemTagSnafu {
                tag: header.tag(),
                position,
            }
            .fail(),
            SEQUENCE_DELIMITER => UnexpectedDelimiterSnafu { position }.fail(),
            _ => read_element_value(&mut self.source, header).map(Some),
        }
    }

    fn syntax(&self) -> &'static TransferSyntax {
        self.source.syntax()
    }

    fn byte_length(&self) -> Length {
        Length::UNDEFINED
    }
}

fn read_exact_plain<R: Read>(src: &mut R, buf: &mut [u8], position: &mut u64) -> Result<()> {
    use snafu::ResultExt;
    match src.read_exact(buf) {
        Ok(()) => {
            *position += buf.len() as u64;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => UnexpectedEndOfInputSnafu {
            position: *position,
        }
        .fail(),
        Err(e) => Err(e).context(ReadFailureSnafu {
            position: *position,
        }),
    }
}
