//! The parse-time transform pipeline and the high level `parse` entry
//! points.
//!
//! A transform is a fallible function from one data element to zero or
//! one data elements, applied to every element encountered during a
//! parse. Transforms run in the order they were registered. For sequence
//! elements they run in post-order: the items are collected (with the
//! transforms applied to their own elements) before the sequence element
//! itself is transformed.
//!
//! After all transforms have run on an element, any value still left as a
//! bulk data stream is buffered into the in-memory form of its VR, so a
//! caller of [`parse`] never observes a stream that is still open.

use crate::error::Result;
use crate::file::{Body, DataSetReader};
use crate::read::{ElementRead, ElementValue, StreamedElement};
use crate::transforms;
use dcmio_core::dataset::DataSet;
use dcmio_core::dictionary::{DataDictionary, StubDataDictionary};
use dcmio_core::header::DataElementHeader;
use dcmio_encoding::text::DynTextCodec;
use std::io::Read;

/// A transform of data elements, applied during parsing.
///
/// Returning `Ok(None)` drops the element from the output; returning an
/// error aborts the parse. A transform receives elements whose bulk data
/// values may still be lazy streams, and is free to consume, replace or
/// re-wrap them.
pub trait Transform<R: Read> {
    /// Apply this transform to one data element.
    fn apply<'a>(
        &mut self,
        elem: StreamedElement<'a, R>,
    ) -> Result<Option<StreamedElement<'a, R>>>;
}

/// Adapter implementing [`Transform`] for a plain function or closure.
pub struct FnTransform<F>(pub F);

impl<R, F> Transform<R> for FnTransform<F>
where
    R: Read,
    F: for<'a> FnMut(StreamedElement<'a, R>) -> Result<Option<StreamedElement<'a, R>>>,
{
    fn apply<'a>(
        &mut self,
        elem: StreamedElement<'a, R>,
    ) -> Result<Option<StreamedElement<'a, R>>> {
        (self.0)(elem)
    }
}

/// The set of options guiding a parse: an ordered pipeline of element
/// transforms.
///
/// The type parameter is the byte source that the transforms will
/// observe; for the high level entry points this is [`Body<R>`].
pub struct ParseOptions<R: Read> {
    transforms: Vec<Box<dyn Transform<R>>>,
}

impl<R: Read> Default for ParseOptions<R> {
    fn default() -> Self {
        ParseOptions::new()
    }
}

impl<R: Read> ParseOptions<R> {
    /// Create an empty option set: no transforms beyond the implicit
    /// bulk data buffering.
    pub fn new() -> Self {
        ParseOptions {
            transforms: Vec::new(),
        }
    }

    /// Append an arbitrary transform to the pipeline.
    pub fn with_transform<T>(mut self, transform: T) -> Self
    where
        T: Transform<R> + 'static,
    {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Append a function or closure as a transform.
    pub fn with_transform_fn<F>(self, f: F) -> Self
    where
        F: for<'a> FnMut(StreamedElement<'a, R>) -> Result<Option<StreamedElement<'a, R>>>
            + 'static,
    {
        self.with_transform(FnTransform(f))
    }

    /// Exclude all group length elements (gggg,0000) from the output.
    pub fn drop_group_lengths(self) -> Self {
        self.with_transform(transforms::DropGroupLengths)
    }

    /// Discard the basic offset table fragment of encapsulated pixel
    /// data, so that the first produced fragment is the first frame.
    pub fn drop_basic_offset_table(self) -> Self {
        self.with_transform(transforms::DropBasicOffsetTable)
    }

    /// Record pixel data as byte region references into the input instead
    /// of buffering the payload.
    pub fn reference_bulk_data(self) -> Self {
        self.with_transform(transforms::ReferenceBulkData::pixel_data_only())
    }

    /// Record the bulk data of every element matched by `predicate` as
    /// byte region references into the input instead of buffering the
    /// payload.
    pub fn reference_bulk_data_if<F>(self, predicate: F) -> Self
    where
        F: FnMut(&DataElementHeader) -> bool + 'static,
    {
        self.with_transform(transforms::ReferenceBulkData::new(predicate))
    }

    /// Split uncompressed pixel data into one fragment per image frame,
    /// according to the image pixel module elements seen earlier in the
    /// data set.
    pub fn split_uncompressed_pixel_data_frames(self) -> Self {
        self.with_transform(transforms::SplitPixelDataFrames::default())
    }

    /// Decode all textual values to UTF-8 following the specific
    /// character set (0008,0005) of the data set, resolving character set
    /// terms with the built-in lookup.
    pub fn utf8_text(self) -> Self {
        self.utf8_text_with(dcmio_encoding::text::lookup_term)
    }

    /// Decode all textual values to UTF-8, resolving specific character
    /// set terms through the given lookup function.
    pub fn utf8_text_with<L>(self, lookup: L) -> Self
    where
        L: FnMut(&str) -> Option<DynTextCodec> + 'static,
    {
        self.with_transform(transforms::Utf8Text::new(lookup))
    }
}

/// Collect the remaining elements of the given reader into a data set,
/// running the option transforms on each element (post-order for
/// sequences) and buffering any bulk data value that is still a stream
/// afterwards.
pub fn collect_data_set<R, S>(source: &mut S, options: &mut ParseOptions<R>) -> Result<DataSet>
where
    R: Read,
    S: ElementRead<R>,
{
    let mut ds = DataSet::with_length(source.byte_length());
    'elements: loop {
        let raw = match source.next_element()? {
            Some(elem) => elem,
            None => break,
        };

        // materialize sequences depth-first so that the transforms see
        // the final shape of the items before the sequence element itself
        let elem = match raw.value {
            ElementValue::SequenceStream(mut seq) => {
                let mut items = Vec::new();
                while let Some(mut item) = seq.next_item()? {
                    items.push(collect_data_set(&mut item, options)?);
                }
                StreamedElement {
                    header: raw.header,
                    value: ElementValue::Sequence(items.into()),
                }
            }
            value => StreamedElement {
                header: raw.header,
                value,
            },
        };

        let mut elem = elem;
        for transform in options.transforms.iter_mut() {
            match transform.apply(elem)? {
                Some(out) => elem = out,
                // dropped; anything left unread is drained on the next
                // call to the source
                None => continue 'elements,
            }
        }

        ds.put(elem.into_owned()?);
    }
    Ok(ds)
}

/// Parse a complete DICOM file into an in-memory data set, including its
/// file meta elements, with no transforms applied beyond the implicit
/// bulk data buffering.
pub fn parse<R: Read>(src: R) -> Result<DataSet> {
    parse_with_options(src, ParseOptions::new())
}

/// Parse a complete DICOM file into an in-memory data set, applying the
/// given options in order to every element.
pub fn parse_with_options<R: Read>(src: R, options: ParseOptions<Body<R>>) -> Result<DataSet> {
    parse_with_dictionary(src, StubDataDictionary, options)
}

/// Parse a complete DICOM file, resolving implicit VRs through the given
/// data dictionary and applying the given options in order to every
/// element.
pub fn parse_with_dictionary<R, D>(
    src: R,
    dict: D,
    mut options: ParseOptions<Body<R>>,
) -> Result<DataSet>
where
    R: Read,
    D: DataDictionary + 'static,
{
    let mut reader = DataSetReader::new_with_dictionary(src, dict)?;
    collect_data_set(&mut reader, &mut options)
}
