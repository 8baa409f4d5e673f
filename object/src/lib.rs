//! This crate provides the high-level interface of the
//! [`dcmio`](https://crates.io/crates/dcmio) project: reading a complete
//! DICOM file into an in-memory data set, and constructing DICOM files
//! from data sets.
//!
//! Reading is delegated to the streaming parser and gathered behind
//! [`parse`]; writing lives here, in the [`DataElementWriter`] and the
//! [`construct`] function, with construct-time transforms in
//! [`options`].
//!
//! ```no_run
//! use dcmio_object::{construct, open_file};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data_set = open_file("image.dcm")?;
//! let mut out = Vec::new();
//! construct(&mut out, &data_set)?;
//! # Ok(())
//! # }
//! ```

pub mod options;
pub mod write;

use snafu::{ResultExt, Snafu};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub use crate::options::{ConstructOptions, ConstructTransform, FnConstructTransform};
pub use crate::write::{construct, construct_with_options, DataElementWriter};
pub use dcmio_core::dataset::{DataElement, DataSet, Sequence, Value};
pub use dcmio_parser::{parse, parse_with_dictionary, parse_with_options, ParseOptions};

/// An error opening and parsing a DICOM file from the file system.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not open file {}", path.display()))]
    OpenFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not parse DICOM file"))]
    Parse {
        #[snafu(backtrace)]
        source: dcmio_parser::Error,
    },
}

/// Read the DICOM file at the given path into an in-memory data set,
/// with no transforms applied.
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<DataSet, Error> {
    let path = path.as_ref();
    let file = File::open(path).context(OpenFileSnafu { path })?;
    parse(BufReader::new(file)).context(ParseSnafu)
}
