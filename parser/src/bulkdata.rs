//! Bulk data streams: lazily read value fields that expose their content
//! as a succession of bounded readers, without buffering.
//!
//! Three variants exist. A one-shot stream holds a single payload of
//! known extent (the native form of bulk data). An encapsulated stream
//! walks the item-delimited fragment protocol of compressed pixel data.
//! A native multi-frame stream re-partitions a single native payload into
//! fixed-size image frames.
//!
//! Every stream drains the previously returned reader when it is asked
//! for the next one, and the underlying scope stack guarantees that a
//! stream abandoned mid-way is drained when the enclosing element
//! iterator advances.

use crate::error::{
    InvalidItemTagSnafu, ReadFailureSnafu, Result, UndefinedLengthNotAllowedSnafu,
    UnexpectedEndOfInputSnafu,
};
use crate::stateful::{DataSetSource, Scope};
use dcmio_core::header::Length;
use dcmio_core::value::{ByteRegion, C};
use dcmio_core::SequenceItemHeader;
use dcmio_encoding::transfer_syntax::Endianness;
use snafu::{ensure, ResultExt};
use std::io::Read;

/// A bounded reader over one contiguous region of the input, produced by
/// a bulk data stream. Reading past the region's end yields EOF; the
/// enclosing source's offset counter keeps running.
pub struct BulkDataReader<'a, R: Read> {
    source: &'a mut DataSetSource<R>,
    offset: u64,
    end: u64,
}

impl<'a, R: Read> BulkDataReader<'a, R> {
    fn new(source: &'a mut DataSetSource<R>, offset: u64, end: u64) -> Self {
        BulkDataReader {
            source,
            offset,
            end,
        }
    }

    /// The absolute offset of the start of this region in the input.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The total length of this region in bytes.
    pub fn region_len(&self) -> u64 {
        self.end - self.offset
    }

    /// The number of bytes not yet read from this region.
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.source.position())
    }

    /// Discard the rest of this region.
    pub fn close(&mut self) -> Result<()> {
        self.source.skip_to(self.end)
    }

    /// Read the rest of this region into a byte vector.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.remaining() as usize);
        let position = self.source.position();
        self.read_to_end(&mut out)
            .context(ReadFailureSnafu { position })?;
        Ok(out)
    }
}

impl<'a, R: Read> Read for BulkDataReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let up_to = remaining.min(buf.len() as u64) as usize;
        let n = self.source.read_raw(&mut buf[..up_to])?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input ended inside a bulk data region",
            ));
        }
        Ok(n)
    }
}

/// A lazy bulk data value: an iterator of bounded fragment readers.
pub enum BulkDataStream<'a, R: Read> {
    /// A single payload of known extent.
    OneShot(OneShotIterator<'a, R>),
    /// The encapsulated pixel data fragment protocol.
    Encapsulated(EncapsulatedIterator<'a, R>),
    /// A native payload split into fixed-size frames.
    Frames(NativeMultiFrame<'a, R>),
}

impl<'a, R: Read> BulkDataStream<'a, R> {
    /// Produce the next fragment as a bounded reader, draining whatever
    /// remained of the previous one. Yields `None` once the stream is
    /// exhausted.
    pub fn next_fragment(&mut self) -> Result<Option<BulkDataReader<'_, R>>> {
        match self {
            BulkDataStream::OneShot(it) => it.next(),
            BulkDataStream::Encapsulated(it) => it.next(),
            BulkDataStream::Frames(it) => it.next(),
        }
    }

    /// Discard all remaining fragments.
    pub fn close(&mut self) -> Result<()> {
        while let Some(mut fragment) = self.next_fragment()? {
            fragment.close()?;
        }
        Ok(())
    }

    /// Whether this stream follows the encapsulated fragment protocol.
    pub fn is_encapsulated(&self) -> bool {
        matches!(self, BulkDataStream::Encapsulated(_))
    }

    /// The value length declared for this stream on the wire.
    pub fn declared_length(&self) -> Length {
        match self {
            BulkDataStream::OneShot(it) => Length((it.end - it.start) as u32),
            BulkDataStream::Encapsulated(_) => Length::UNDEFINED,
            BulkDataStream::Frames(it) => Length((it.end - it.start) as u32),
        }
    }

    /// The byte order of the enclosing transfer syntax.
    pub fn endianness(&self) -> Endianness {
        match self {
            BulkDataStream::OneShot(it) => it.source.endianness(),
            BulkDataStream::Encapsulated(it) => it.source.endianness(),
            BulkDataStream::Frames(it) => it.source.endianness(),
        }
    }

    /// Buffer every remaining fragment into memory, in file order.
    pub fn collect_fragments(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut fragments = Vec::new();
        while let Some(mut reader) = self.next_fragment()? {
            fragments.push(reader.read_to_vec()?);
        }
        Ok(fragments)
    }

    /// Record the extent of every remaining fragment as a byte region,
    /// draining the stream without copying any payload bytes.
    pub fn collect_references(&mut self) -> Result<C<ByteRegion>> {
        let mut regions = C::new();
        while let Some(mut reader) = self.next_fragment()? {
            regions.push(ByteRegion {
                offset: reader.offset(),
                length: reader.region_len(),
            });
            reader.close()?;
        }
        Ok(regions)
    }
}

/// A bulk data stream holding exactly one payload of known extent.
pub struct OneShotIterator<'a, R: Read> {
    pub(crate) source: &'a mut DataSetSource<R>,
    pub(crate) start: u64,
    pub(crate) end: u64,
    pub(crate) done: bool,
}

impl<'a, R: Read> OneShotIterator<'a, R> {
    pub(crate) fn new(source: &'a mut DataSetSource<R>, start: u64, end: u64) -> Self {
        OneShotIterator {
            source,
            start,
            end,
            done: false,
        }
    }

    fn next(&mut self) -> Result<Option<BulkDataReader<'_, R>>> {
        if self.done {
            // drain whatever the consumer left of the single payload
            self.source.skip_to(self.end)?;
            return Ok(None);
        }
        self.done = true;
        Ok(Some(BulkDataReader::new(
            self.source,
            self.start,
            self.end,
        )))
    }
}

/// A bulk data stream over the encapsulated pixel data fragment protocol:
/// item-delimited fragments terminated by a sequence delimitation item,
/// all of it in little endian regardless of the outer byte order. The
/// first fragment is the basic offset table, possibly of zero length.
pub struct EncapsulatedIterator<'a, R: Read> {
    source: &'a mut DataSetSource<R>,
    mark: usize,
    fragment_end: Option<u64>,
    done: bool,
}

impl<'a, R: Read> EncapsulatedIterator<'a, R> {
    pub(crate) fn new(source: &'a mut DataSetSource<R>, mark: usize) -> Self {
        EncapsulatedIterator {
            source,
            mark,
            fragment_end: None,
            done: false,
        }
    }

    fn next(&mut self) -> Result<Option<BulkDataReader<'_, R>>> {
        if self.done {
            return Ok(None);
        }
        // close the previously returned fragment
        if let Some(end) = self.fragment_end.take() {
            self.source.skip_to(end)?;
            self.source
                .set_scope(self.mark, Scope::Encapsulated { fragment_end: None });
        }

        let position = self.source.position();
        match self.source.decode_item_header()? {
            SequenceItemHeader::Item { len } => {
                let len = len.get().ok_or_else(|| {
                    UndefinedLengthNotAllowedSnafu {
                        tag: dcmio_core::ITEM,
                    }
                    .build()
                })?;
                let offset = self.source.position();
                let end = offset + u64::from(len);
                self.fragment_end = Some(end);
                self.source.set_scope(
                    self.mark,
                    Scope::Encapsulated {
                        fragment_end: Some(end),
                    },
                );
                Ok(Some(BulkDataReader::new(self.source, offset, end)))
            }
            SequenceItemHeader::SequenceDelimiter => {
                self.done = true;
                // the terminator has been consumed; the scope has nothing
                // left to drain
                let position = self.source.position();
                self.source
                    .set_scope(self.mark, Scope::Value { end: position });
                Ok(None)
            }
            SequenceItemHeader::ItemDelimiter => InvalidItemTagSnafu {
                tag: dcmio_core::ITEM_DELIMITER,
                position,
            }
            .fail(),
        }
    }
}

/// A bulk data stream that splits one native (uncompressed) payload into
/// `frames_total` readers of exactly `frame_length` bytes each. Bytes
/// trailing the last frame are discarded.
pub struct NativeMultiFrame<'a, R: Read> {
    source: &'a mut DataSetSource<R>,
    start: u64,
    end: u64,
    frame_length: u64,
    frames_total: u64,
    frames_read: u64,
    done: bool,
}

impl<'a, R: Read> NativeMultiFrame<'a, R> {
    /// Re-partition a one-shot stream into fixed-size frames. The stream
    /// must not have been consumed yet, and the frame length must be
    /// positive.
    pub(crate) fn from_one_shot(
        one_shot: OneShotIterator<'a, R>,
        tag: dcmio_core::Tag,
        frame_length: u64,
        frames_total: u64,
    ) -> Result<Self> {
        ensure!(
            frame_length > 0,
            crate::error::InvalidFrameLengthSnafu {
                tag,
                frame_length: frame_length as i64,
            }
        );
        ensure!(!one_shot.done, crate::error::MultipleFragmentsSnafu { tag });
        Ok(NativeMultiFrame {
            source: one_shot.source,
            start: one_shot.start,
            end: one_shot.end,
            frame_length,
            frames_total: frames_total.max(1),
            frames_read: 0,
            done: false,
        })
    }

    fn next(&mut self) -> Result<Option<BulkDataReader<'_, R>>> {
        if self.done {
            return Ok(None);
        }
        if self.frames_read == self.frames_total {
            // discard any bytes trailing the last frame
            self.source.skip_to(self.end)?;
            self.done = true;
            return Ok(None);
        }
        let frame_start = self.start + self.frames_read * self.frame_length;
        let frame_end = frame_start + self.frame_length;
        ensure!(
            frame_end <= self.end,
            UnexpectedEndOfInputSnafu {
                position: frame_start
            }
        );
        // close the previously returned frame
        self.source.skip_to(frame_start)?;
        self.frames_read += 1;
        Ok(Some(BulkDataReader::new(
            self.source,
            frame_start,
            frame_end,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stateful::{DataSetSource, Scope};
    use dcmio_core::dictionary::StubDataDictionary;
    use dcmio_encoding::transfer_syntax::EXPLICIT_VR_LITTLE_ENDIAN;
    use std::io::{Cursor, Read};

    fn source_over(data: Vec<u8>) -> DataSetSource<Cursor<Vec<u8>>> {
        DataSetSource::new(
            Cursor::new(data),
            &EXPLICIT_VR_LITTLE_ENDIAN,
            StubDataDictionary,
            0,
        )
    }

    /// Three fragments: an empty offset table, {AA BB} and {CC DD}.
    fn encapsulated_source() -> DataSetSource<Cursor<Vec<u8>>> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB]);
        data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, 0xCC, 0xDD]);
        data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00]);
        source_over(data)
    }

    #[test]
    fn encapsulated_fragment_regions() {
        let mut source = encapsulated_source();
        let mark = source.push_scope(Scope::Encapsulated { fragment_end: None });
        let mut stream =
            BulkDataStream::Encapsulated(EncapsulatedIterator::new(&mut source, mark));
        let regions = stream.collect_references().unwrap();
        assert_eq!(
            &regions[..],
            &[
                ByteRegion {
                    offset: 8,
                    length: 0
                },
                ByteRegion {
                    offset: 16,
                    length: 2
                },
                ByteRegion {
                    offset: 26,
                    length: 2
                },
            ]
        );
    }

    #[test]
    fn partially_read_fragments_are_drained_on_advance() {
        let mut source = encapsulated_source();
        let mark = source.push_scope(Scope::Encapsulated { fragment_end: None });
        let mut stream =
            BulkDataStream::Encapsulated(EncapsulatedIterator::new(&mut source, mark));

        // skip the offset table, then read only one byte of the first
        // real fragment
        let _ = stream.next_fragment().unwrap().expect("offset table");
        let mut buf = [0u8; 1];
        stream
            .next_fragment()
            .unwrap()
            .expect("first fragment")
            .read_exact(&mut buf)
            .unwrap();
        assert_eq!(buf, [0xAA]);

        // the next fragment still starts at the right place
        let mut fragment = stream.next_fragment().unwrap().expect("second fragment");
        assert_eq!(fragment.offset(), 26);
        assert_eq!(fragment.read_to_vec().unwrap(), vec![0xCC, 0xDD]);
        assert!(stream.next_fragment().unwrap().is_none());
    }

    #[test]
    fn frames_split_and_discard_trailing_bytes() {
        let mut source = source_over(vec![1, 2, 3, 4, 5, 6, 0]);
        source.push_scope(Scope::Value { end: 7 });
        let one_shot = OneShotIterator::new(&mut source, 0, 7);
        let split =
            NativeMultiFrame::from_one_shot(one_shot, dcmio_core::PIXEL_DATA, 2, 3).unwrap();
        let mut stream = BulkDataStream::Frames(split);

        let fragments = stream.collect_fragments().unwrap();
        assert_eq!(fragments, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        // the trailing padding byte was discarded along the way
        drop(stream);
        assert_eq!(source.position(), 7);
    }

    #[test]
    fn frames_beyond_the_payload_are_an_error() {
        let mut source = source_over(vec![1, 2, 3, 4, 5, 6]);
        source.push_scope(Scope::Value { end: 6 });
        let one_shot = OneShotIterator::new(&mut source, 0, 6);
        let mut split =
            NativeMultiFrame::from_one_shot(one_shot, dcmio_core::PIXEL_DATA, 4, 2).unwrap();

        assert!(split.next().unwrap().is_some());
        assert!(matches!(
            split.next(),
            Err(crate::error::Error::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn zero_frame_length_is_rejected() {
        let mut source = source_over(vec![]);
        source.push_scope(Scope::Value { end: 0 });
        let one_shot = OneShotIterator::new(&mut source, 0, 0);
        assert!(matches!(
            NativeMultiFrame::from_one_shot(one_shot, dcmio_core::PIXEL_DATA, 0, 1),
            Err(crate::error::Error::InvalidFrameLength { .. })
        ));
    }
}
