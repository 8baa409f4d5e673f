//! Construct-time transforms.
//!
//! Mirroring the parse-time pipeline, a construct transform is a fallible
//! function from one owned data element to zero or one elements, applied
//! to every element before it is encoded. For sequence elements the
//! transforms run in pre-order: the sequence element first, then the
//! elements of its items. After the transforms, the writer recomputes
//! every value length, so a transform that wants a different length
//! encoding only has to flip lengths between defined and undefined.

use crate::write::Result;
use dcmio_core::dataset::{DataElement, Value};
use dcmio_core::header::Length;

/// A transform of data elements, applied while constructing output.
///
/// Returning `Ok(None)` drops the element from the output; returning an
/// error aborts the write.
pub trait ConstructTransform {
    /// Apply this transform to one data element.
    fn apply(&mut self, elem: DataElement) -> Result<Option<DataElement>>;
}

/// Adapter implementing [`ConstructTransform`] for a plain function or
/// closure.
pub struct FnConstructTransform<F>(pub F);

impl<F> ConstructTransform for FnConstructTransform<F>
where
    F: FnMut(DataElement) -> Result<Option<DataElement>>,
{
    fn apply(&mut self, elem: DataElement) -> Result<Option<DataElement>> {
        (self.0)(elem)
    }
}

/// The set of options guiding a construct: an ordered pipeline of
/// construct transforms.
#[derive(Default)]
pub struct ConstructOptions {
    pub(crate) transforms: Vec<Box<dyn ConstructTransform>>,
}

impl ConstructOptions {
    /// Create an empty option set.
    pub fn new() -> Self {
        ConstructOptions {
            transforms: Vec::new(),
        }
    }

    /// Append an arbitrary transform to the pipeline.
    pub fn with_transform<T>(mut self, transform: T) -> Self
    where
        T: ConstructTransform + 'static,
    {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Append a function or closure as a transform.
    pub fn with_transform_fn<F>(self, f: F) -> Self
    where
        F: FnMut(DataElement) -> Result<Option<DataElement>> + 'static,
    {
        self.with_transform(FnConstructTransform(f))
    }

    /// Write all sequences and sequence items with explicit lengths.
    /// This option should come after any other option that changes
    /// sequence contents.
    pub fn explicit_lengths(self) -> Self {
        self.with_transform(ExplicitLengths)
    }

    /// Write all sequences and sequence items with undefined,
    /// delimiter-terminated lengths. This option should come after any
    /// other option that changes sequence contents.
    pub fn undefined_lengths(self) -> Self {
        self.with_transform(UndefinedLengths)
    }
}

/// Clears undefined lengths from sequence elements and their items, so
/// that the writer's length recomputation produces explicit lengths
/// throughout.
pub struct ExplicitLengths;

impl ConstructTransform for ExplicitLengths {
    fn apply(&mut self, mut elem: DataElement) -> Result<Option<DataElement>> {
        clear_undefined_lengths(&mut elem);
        Ok(Some(elem))
    }
}

// The writer recomputes lengths after the transforms run, so clearing the
// undefined markers is all it takes. The recursion is required because
// elements are written in pre-order: a parent's length is computed before
// its children are transformed, and any child left undefined would force
// the parent back to undefined.
fn clear_undefined_lengths(elem: &mut DataElement) {
    if let Value::Sequence(seq) = elem.value_mut() {
        clear_item_lengths(seq);
        elem.set_length(Length(0));
    }
}

fn clear_item_lengths(seq: &mut dcmio_core::Sequence) {
    for item in seq.items_mut() {
        let elems: Vec<DataElement> = std::mem::take(item).into_iter().collect();
        item.set_length(Length(0));
        for mut child in elems {
            clear_undefined_lengths(&mut child);
            item.put(child);
        }
    }
}

/// Marks sequence elements and their items with undefined lengths, so
/// that they are written in the delimiter-terminated encoding.
pub struct UndefinedLengths;

impl ConstructTransform for UndefinedLengths {
    fn apply(&mut self, mut elem: DataElement) -> Result<Option<DataElement>> {
        if let Value::Sequence(seq) = elem.value_mut() {
            for item in seq.items_mut() {
                item.set_length(Length::UNDEFINED);
            }
            elem.set_length(Length::UNDEFINED);
        }
        Ok(Some(elem))
    }
}
