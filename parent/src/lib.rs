//! This crate serves as a parent for the library crates of the dcmio
//! project.
//!
//! For the high-level API to reading and writing DICOM files, please see
//! [`dcmio_object`](../dcmio_object), re-exported here as [`object`];
//! the streaming layer lives in [`parser`].

pub use dcmio_core as core;
pub use dcmio_encoding as encoding;
pub use dcmio_object as object;
pub use dcmio_parser as parser;

pub use dcmio_core::{DataElement, DataSet, Length, PrimitiveValue, Sequence, Tag, Value, VR};
pub use dcmio_object::{construct, open_file, ConstructOptions, DataElementWriter};
pub use dcmio_parser::{parse, parse_with_options, DataSetReader, ParseOptions};
