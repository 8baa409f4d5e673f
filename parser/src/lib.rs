//! This crate works on top of the DICOM encoding primitives to provide
//! a streaming parser of DICOM data sets.
//!
//! The parsing machinery comes in two levels. The low level is the
//! [`DataSetReader`]: an iterator producing one data element at a time,
//! in which bulk data values and sequences are lazy streams bounded to
//! the input, so that very large payloads can flow through without being
//! buffered. The high level is [`parse`] and its companions, which drive
//! the reader to a full in-memory [`DataSet`](dcmio_core::DataSet) while
//! applying a configurable pipeline of element transforms.
//!
//! The crate is part of the [`dcmio`](https://crates.io/crates/dcmio)
//! project.

pub mod bulkdata;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod read;
pub mod stateful;
pub mod transforms;

pub use crate::bulkdata::{BulkDataReader, BulkDataStream};
pub use crate::error::{Error, Result};
pub use crate::file::{Body, DataSetReader};
pub use crate::pipeline::{
    collect_data_set, parse, parse_with_dictionary, parse_with_options, FnTransform, ParseOptions,
    Transform,
};
pub use crate::read::{ElementRead, ElementValue, ItemReader, SequenceReader, StreamedElement};
pub use crate::stateful::DataSetSource;
