//! In-memory representation of data sets, sequences and owned data
//! elements.
//!
//! A [`DataSet`] maps tags to data elements with unique keys, iterated in
//! ascending tag order. Sequence values nest full data sets, one per item,
//! so the model forms a tree.

use crate::header::{DataElementHeader, HasLength, Header, Length, Tag, VR};
use crate::value::PrimitiveValue;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// An owned DICOM data element value: either a primitive (materialized)
/// value or a nested sequence of items.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An in-memory primitive value.
    Primitive(PrimitiveValue),
    /// A nested sequence of items.
    Sequence(Sequence),
}

impl Value {
    /// Retrieve the primitive value, if this value is one.
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(v) => Some(v),
            Value::Sequence(_) => None,
        }
    }

    /// Retrieve the nested sequence, if this value is one.
    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            Value::Primitive(_) => None,
            Value::Sequence(v) => Some(v),
        }
    }
}

impl From<PrimitiveValue> for Value {
    fn from(v: PrimitiveValue) -> Self {
        Value::Primitive(v)
    }
}

impl From<Sequence> for Value {
    fn from(v: Sequence) -> Self {
        Value::Sequence(v)
    }
}

/// A data type that represents and owns a DICOM data element.
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    header: DataElementHeader,
    value: Value,
}

impl DataElement {
    /// Create a data element from the given parts, with the value length
    /// derived from the value: the unpadded byte length for primitive
    /// values, or an undefined length for sequences.
    ///
    /// This method will not check whether the value representation is
    /// compatible with the given value.
    pub fn new<T, V>(tag: T, vr: VR, value: V) -> Self
    where
        T: Into<Tag>,
        V: Into<Value>,
    {
        let value = value.into();
        let len = match &value {
            Value::Primitive(v) => Length(v.byte_len() as u32),
            Value::Sequence(_) => Length::UNDEFINED,
        };
        DataElement {
            header: DataElementHeader::new(tag, vr, len),
            value,
        }
    }

    /// Create a data element from the given parts.
    ///
    /// This method will not check whether the length accurately represents
    /// the given value's byte length, nor whether the value representation
    /// is compatible with the value.
    pub fn new_with_len<T, V>(tag: T, vr: VR, len: Length, value: V) -> Self
    where
        T: Into<Tag>,
        V: Into<Value>,
    {
        DataElement {
            header: DataElementHeader::new(tag, vr, len),
            value: value.into(),
        }
    }

    /// Create an empty data element.
    pub fn empty<T: Into<Tag>>(tag: T, vr: VR) -> Self {
        DataElement {
            header: DataElementHeader::new(tag, vr, Length(0)),
            value: Value::Primitive(PrimitiveValue::Empty),
        }
    }

    /// Retrieve the element header.
    pub fn header(&self) -> &DataElementHeader {
        &self.header
    }

    /// Replace the element's value length.
    pub fn set_length(&mut self, len: Length) {
        self.header.len = len;
    }

    /// Retrieve the value representation.
    pub fn vr(&self) -> VR {
        self.header.vr
    }

    /// Retrieve a reference to the data value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Retrieve a mutable reference to the data value.
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Move the data value out of the element, discarding the rest.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Split the element into its header and value.
    pub fn into_parts(self) -> (DataElementHeader, Value) {
        (self.header, self.value)
    }

    /// Retrieve the first value as a string slice,
    /// if the element holds character data.
    pub fn string(&self) -> Option<&str> {
        self.value.primitive().and_then(PrimitiveValue::string)
    }

    /// Retrieve the first value as an integer,
    /// converting binary and decimal string forms alike.
    pub fn int_value(&self) -> Option<i64> {
        self.value.primitive().and_then(PrimitiveValue::int_value)
    }
}

impl HasLength for DataElement {
    #[inline]
    fn length(&self) -> Length {
        self.header.len
    }
}

impl Header for DataElement {
    #[inline]
    fn tag(&self) -> Tag {
        self.header.tag
    }
}

/// A DICOM sequence: an ordered list of items, each item being a data set
/// with its own byte length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence {
    items: Vec<DataSet>,
}

impl Sequence {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Sequence { items: Vec::new() }
    }

    /// Retrieve the items of this sequence.
    pub fn items(&self) -> &[DataSet] {
        &self.items
    }

    /// Retrieve the items of this sequence, mutably.
    pub fn items_mut(&mut self) -> &mut Vec<DataSet> {
        &mut self.items
    }

    /// Append an item to the sequence.
    pub fn push(&mut self, item: DataSet) {
        self.items.push(item);
    }

    /// The number of items in the sequence.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the sequence contains no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<DataSet>> for Sequence {
    fn from(items: Vec<DataSet>) -> Self {
        Sequence { items }
    }
}

impl IntoIterator for Sequence {
    type Item = DataSet;
    type IntoIter = std::vec::IntoIter<DataSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A DICOM data set: a mapping from tags to data elements with unique
/// keys, plus the byte length of the set as declared by its enclosing
/// item (undefined at the top level).
///
/// Iteration is in ascending tag order, which is also the emission order
/// on write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    entries: BTreeMap<Tag, DataElement>,
    len: Length,
}

impl DataSet {
    /// Create a new empty data set of undefined byte length.
    pub fn new() -> Self {
        DataSet {
            entries: BTreeMap::new(),
            len: Length::UNDEFINED,
        }
    }

    /// Create a new empty data set with the given byte length.
    pub fn with_length(len: Length) -> Self {
        DataSet {
            entries: BTreeMap::new(),
            len,
        }
    }

    /// The byte length of this data set, which may be undefined.
    pub fn length(&self) -> Length {
        self.len
    }

    /// Replace the recorded byte length of this data set.
    pub fn set_length(&mut self, len: Length) {
        self.len = len;
    }

    /// Insert a data element into the set, replacing (and returning) any
    /// previous element with the same tag.
    pub fn put(&mut self, elem: DataElement) -> Option<DataElement> {
        self.entries.insert(elem.tag(), elem)
    }

    /// Remove the element with the given tag, if present.
    pub fn remove(&mut self, tag: Tag) -> Option<DataElement> {
        self.entries.remove(&tag)
    }

    /// Retrieve the element with the given tag, if present.
    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        self.entries.get(&tag)
    }

    /// Whether an element with the given tag is present.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// The number of elements in the set.
    pub fn element_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the data set has no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the elements in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = &DataElement> {
        self.entries.values()
    }

    /// Iterate over the elements of the file meta group (0002,xxxx),
    /// in ascending tag order.
    pub fn meta_elements(&self) -> impl Iterator<Item = &DataElement> {
        self.entries.values().filter(|e| e.tag().is_meta())
    }

    /// Extract the file meta group into its own data set.
    pub fn meta_set(&self) -> DataSet {
        let entries = self
            .entries
            .iter()
            .filter(|(tag, _)| tag.is_meta())
            .map(|(tag, e)| (*tag, e.clone()))
            .collect();
        DataSet {
            entries,
            len: Length::UNDEFINED,
        }
    }

    /// Whether every element in this set belongs to the file meta group.
    pub fn is_meta_header(&self) -> bool {
        self.entries.keys().all(|tag| tag.is_meta())
    }
}

impl IntoIterator for DataSet {
    type Item = DataElement;
    type IntoIter = DataSetIntoIter;

    fn into_iter(self) -> Self::IntoIter {
        DataSetIntoIter {
            inner: self.entries.into_iter(),
        }
    }
}

/// An iterator consuming the elements of a data set in ascending tag
/// order.
pub struct DataSetIntoIter {
    inner: btree_map::IntoIter<Tag, DataElement>,
}

impl Iterator for DataSetIntoIter {
    type Item = DataElement;

    fn next(&mut self) -> Option<DataElement> {
        self.inner.next().map(|(_, elem)| elem)
    }
}

impl FromIterator<DataElement> for DataSet {
    fn from_iter<I: IntoIterator<Item = DataElement>>(iter: I) -> Self {
        let mut ds = DataSet::new();
        for elem in iter {
            ds.put(elem);
        }
        ds
    }
}
