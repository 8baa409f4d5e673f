//! Module holding the stateful data set source: a counting reader which
//! tracks the absolute byte offset of everything consumed from the input,
//! decodes element and item headers through the transfer syntax strategy,
//! and keeps a stack of open scopes so that lazily read structures can be
//! drained when their consumer moves on.
//!
//! The scope stack is the single mechanism that keeps the byte position
//! synchronized with the protocol: every lazily read structure (a bulk
//! data value, an encapsulated pixel data sequence, a sequence, an item)
//! registers a scope when it starts, and whichever reader resumes control
//! afterwards unwinds the scopes opened below its own before reading
//! further.

use crate::error::{
    DecodeHeaderSnafu, InvalidItemTagSnafu, ReadFailureSnafu, Result, UndefinedLengthNotAllowedSnafu,
    UnexpectedDelimiterSnafu, UnexpectedEndOfInputSnafu,
};
use dcmio_core::dictionary::DataDictionary;
use dcmio_core::header::{
    DataElementHeader, Header, SequenceItemHeader, Tag, VrKind, PIXEL_DATA, VR,
};
use dcmio_encoding::decode::DynDecoder;
use dcmio_encoding::transfer_syntax::{Endianness, TransferSyntax};
use snafu::{ensure, IntoError, ResultExt};
use std::io::{self, BufRead, BufReader, Read};

/// A scope describes how to advance the input past a structure that was
/// handed out for lazy reading and may have been abandoned by its
/// consumer.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scope {
    /// A value field of defined extent: skipping to `end` closes it.
    Value { end: u64 },
    /// An encapsulated pixel data sequence, terminated by a sequence
    /// delimitation item. `fragment_end` is the end offset of the
    /// fragment currently handed out, if any.
    Encapsulated { fragment_end: Option<u64> },
    /// A sequence of items. A defined end offset closes it by skipping;
    /// an undefined one requires walking items until the sequence
    /// delimitation item.
    Sequence { end: Option<u64> },
    /// A single sequence item. A defined end offset closes it by
    /// skipping; an undefined one requires walking data elements until
    /// the item delimitation item.
    Item { end: Option<u64> },
}

/// A stateful source of DICOM data set content.
///
/// Wraps a byte source with a running offset counter (the absolute number
/// of bytes consumed from the original input), the data element decoder
/// selected by the transfer syntax, and the scope stack described in the
/// module documentation. Bounded sub-readers produced by the parsing
/// layer all share this counter.
pub struct DataSetSource<R: Read> {
    from: BufReader<R>,
    decoder: DynDecoder<BufReader<R>>,
    syntax: &'static TransferSyntax,
    position: u64,
    scopes: Vec<Scope>,
}

impl<R: Read> std::fmt::Debug for DataSetSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DataSetSource")
            .field("syntax", &self.syntax.uid())
            .field("position", &self.position)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl<R: Read> DataSetSource<R> {
    /// Create a new source over `from`, decoding according to the given
    /// transfer syntax and resolving implicit VRs through `dict`.
    /// `position` is the number of bytes of the original input already
    /// consumed before this source takes over.
    pub fn new<D>(from: R, syntax: &'static TransferSyntax, dict: D, position: u64) -> Self
    where
        D: DataDictionary + 'static,
    {
        DataSetSource {
            from: BufReader::new(from),
            decoder: syntax.decoder_for(dict),
            syntax,
            position,
            scopes: Vec::new(),
        }
    }

    /// The transfer syntax this source decodes with.
    pub fn syntax(&self) -> &'static TransferSyntax {
        self.syntax
    }

    /// The byte order of the data.
    pub fn endianness(&self) -> Endianness {
        self.syntax.endianness()
    }

    /// The absolute number of bytes consumed from the original input.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Check whether at least one more byte can be read.
    pub(crate) fn has_data_left(&mut self) -> Result<bool> {
        let position = self.position;
        let buf = self
            .from
            .fill_buf()
            .context(ReadFailureSnafu { position })?;
        Ok(!buf.is_empty())
    }

    /// Decode a full data element header, advancing the position by the
    /// exact number of bytes the header took on the wire.
    pub(crate) fn decode_header(&mut self) -> Result<DataElementHeader> {
        let position = self.position;
        let (header, bytes_read) = self
            .decoder
            .decode_header(&mut self.from)
            .map_err(|e| map_decode_error(e, position))?;
        self.position += bytes_read as u64;
        Ok(header)
    }

    /// Decode an item or delimitation header (always 8 bytes).
    pub(crate) fn decode_item_header(&mut self) -> Result<SequenceItemHeader> {
        let position = self.position;
        let header = self
            .decoder
            .decode_item_header(&mut self.from)
            .map_err(|e| map_decode_error(e, position))?;
        self.position += 8;
        Ok(header)
    }

    /// Decode an attribute tag in the byte order of the transfer syntax.
    pub(crate) fn decode_tag(&mut self) -> Result<Tag> {
        let position = self.position;
        let tag = self
            .decoder
            .decode_tag(&mut self.from)
            .map_err(|e| map_decode_error(e, position))?;
        self.position += 4;
        Ok(tag)
    }

    /// Read exactly `buf.len()` bytes, failing with `UnexpectedEndOfInput`
    /// if the source ends mid-field.
    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let position = self.position;
        match self.from.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                UnexpectedEndOfInputSnafu { position }.fail()
            }
            Err(e) => Err(e).context(ReadFailureSnafu { position }),
        }
    }

    /// Plain read, used by the bounded bulk data readers.
    pub(crate) fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.from.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Advance the input by `n` bytes without retaining them.
    pub(crate) fn skip(&mut self, n: u64) -> Result<()> {
        let position = self.position;
        let copied = io::copy(&mut (&mut self.from).take(n), &mut io::sink())
            .context(ReadFailureSnafu { position })?;
        self.position += copied;
        ensure!(
            copied == n,
            UnexpectedEndOfInputSnafu {
                position: self.position
            }
        );
        Ok(())
    }

    /// Advance the input up to the given absolute offset.
    pub(crate) fn skip_to(&mut self, end: u64) -> Result<()> {
        if end <= self.position {
            return Ok(());
        }
        let n = end - self.position;
        self.skip(n)
    }

    /// Register a new open scope, returning its index in the stack.
    pub(crate) fn push_scope(&mut self, scope: Scope) -> usize {
        self.scopes.push(scope);
        self.scopes.len() - 1
    }

    /// Update the scope at the given index, recording reading progress
    /// (such as the extent of the fragment currently handed out) or
    /// neutralizing a scope whose terminator has been consumed.
    pub(crate) fn set_scope(&mut self, mark: usize, scope: Scope) {
        self.scopes[mark] = scope;
    }

    /// The number of open scopes.
    pub(crate) fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Close every scope above the stack length `target`, skipping the
    /// remaining content of each, deepest first. This is what drains
    /// abandoned lazy values when a parent iterator advances.
    pub(crate) fn unwind(&mut self, target: usize) -> Result<()> {
        while self.scopes.len() > target {
            if let Some(scope) = self.scopes.pop() {
                self.skip_scope(scope)?;
            }
        }
        Ok(())
    }

    fn skip_scope(&mut self, scope: Scope) -> Result<()> {
        match scope {
            Scope::Value { end }
            | Scope::Sequence { end: Some(end) }
            | Scope::Item { end: Some(end) } => self.skip_to(end),
            Scope::Encapsulated { fragment_end } => {
                if let Some(end) = fragment_end {
                    self.skip_to(end)?;
                }
                self.skip_encapsulated()
            }
            Scope::Sequence { end: None } => self.skip_sequence_undefined(),
            Scope::Item { end: None } => self.skip_item_undefined(),
        }
    }

    /// Skip the remaining fragments of an encapsulated pixel data value,
    /// leaving the position right after the sequence delimitation item.
    fn skip_encapsulated(&mut self) -> Result<()> {
        loop {
            let position = self.position;
            match self.decode_item_header()? {
                SequenceItemHeader::Item { len } => match len.get() {
                    Some(len) => self.skip(u64::from(len))?,
                    None => {
                        return UndefinedLengthNotAllowedSnafu {
                            tag: dcmio_core::ITEM,
                        }
                        .fail()
                    }
                },
                SequenceItemHeader::SequenceDelimiter => return Ok(()),
                SequenceItemHeader::ItemDelimiter => {
                    return InvalidItemTagSnafu {
                        tag: dcmio_core::ITEM_DELIMITER,
                        position,
                    }
                    .fail()
                }
            }
        }
    }

    /// Skip the remaining items of a sequence of undefined length,
    /// leaving the position right after the sequence delimitation item.
    fn skip_sequence_undefined(&mut self) -> Result<()> {
        loop {
            let position = self.position;
            match self.decode_item_header()? {
                SequenceItemHeader::Item { len } => match len.get() {
                    Some(len) => self.skip(u64::from(len))?,
                    None => self.skip_item_undefined()?,
                },
                SequenceItemHeader::SequenceDelimiter => return Ok(()),
                SequenceItemHeader::ItemDelimiter => {
                    return InvalidItemTagSnafu {
                        tag: dcmio_core::ITEM_DELIMITER,
                        position,
                    }
                    .fail()
                }
            }
        }
    }

    /// Skip the remaining data elements of an item of undefined length,
    /// leaving the position right after the item delimitation item.
    fn skip_item_undefined(&mut self) -> Result<()> {
        loop {
            let position = self.position;
            let header = self.decode_header()?;
            match header.tag() {
                dcmio_core::ITEM_DELIMITER => return Ok(()),
                dcmio_core::SEQUENCE_DELIMITER => {
                    return UnexpectedDelimiterSnafu { position }.fail()
                }
                dcmio_core::ITEM => {
                    return InvalidItemTagSnafu {
                        tag: dcmio_core::ITEM,
                        position,
                    }
                    .fail()
                }
                tag => match header.len.get() {
                    Some(len) => self.skip(u64::from(len))?,
                    None if header.vr == VR::SQ => self.skip_sequence_undefined()?,
                    None if header.vr.kind() == VrKind::BulkData && tag == PIXEL_DATA => {
                        self.skip_encapsulated()?
                    }
                    None => return UndefinedLengthNotAllowedSnafu { tag }.fail(),
                },
            }
        }
    }
}

/// Decoding failures at the end of the input surface as
/// `UnexpectedEndOfInput`; any other failure keeps its decoding context.
fn map_decode_error(e: dcmio_encoding::decode::Error, position: u64) -> crate::error::Error {
    use dcmio_encoding::decode::Error as DE;
    let eof = match &e {
        DE::ReadTag { source, .. }
        | DE::ReadVr { source, .. }
        | DE::ReadReserved { source, .. }
        | DE::ReadLength { source, .. }
        | DE::ReadItemHeader { source, .. } => source.kind() == io::ErrorKind::UnexpectedEof,
        _ => false,
    };
    if eof {
        UnexpectedEndOfInputSnafu { position }.build()
    } else {
        DecodeHeaderSnafu { position }.into_error(e)
    }
}
