//! This crate contains the DICOM core library,
//! with the data structures shared by the parsing and writing machinery:
//! attribute tags, value representations, value lengths, in-memory values,
//! data sets, and the data dictionary contract.
//!
//! The crate is part of the [`dcmio`](https://crates.io/crates/dcmio)
//! project, and is not expected to be used directly: the parent crate
//! re-exports everything of interest here.

pub mod dataset;
pub mod dictionary;
pub mod header;
pub mod value;

pub use crate::dataset::{DataElement, DataSet, Sequence, Value};
pub use crate::dictionary::{dictionary_vr, DataDictionary, StubDataDictionary, TagDictionary};
pub use crate::header::{
    DataElementHeader, HasLength, Header, Length, SequenceItemHeader, Tag, VrKind,
    FILE_META_GROUP_LENGTH, ITEM, ITEM_DELIMITER, PIXEL_DATA, SEQUENCE_DELIMITER,
    SPECIFIC_CHARACTER_SET, TRANSFER_SYNTAX_UID, VR,
};
pub use crate::value::{ByteRegion, PrimitiveValue, C};
