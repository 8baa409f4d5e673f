//! Crate-level error types for data set parsing.

use dcmio_core::value::ValueType;
use dcmio_core::{Length, Tag};
use snafu::{Backtrace, Snafu};

/// An error which may occur while parsing a DICOM data set.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The input ended in the middle of a field or declared structure.
    #[snafu(display("Unexpected end of input at position {}", position))]
    UnexpectedEndOfInput { position: u64, backtrace: Backtrace },

    #[snafu(display("Failed to read from input at position {}", position))]
    ReadFailure {
        position: u64,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not decode element header at position {}", position))]
    DecodeHeader {
        position: u64,
        #[snafu(backtrace)]
        source: dcmio_encoding::decode::Error,
    },

    /// The 4 bytes following the file preamble did not spell "DICM".
    #[snafu(display("Invalid DICOM file signature"))]
    BadSignature { backtrace: Backtrace },

    #[snafu(display(
        "Expected File Meta Information Group Length (0002,0000), found {}",
        tag
    ))]
    MissingMetaGroupLength { tag: Tag, backtrace: Backtrace },

    #[snafu(display("Transfer Syntax UID (0002,0010) not present in file meta group"))]
    MissingTransferSyntax { backtrace: Backtrace },

    #[snafu(display("Unexpected item tag {} at position {}", tag, position))]
    InvalidItemTag {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Unexpected delimiter at position {}", position))]
    UnexpectedDelimiter { position: u64, backtrace: Backtrace },

    #[snafu(display(
        "Delimiter at position {} has non-zero length {}",
        position,
        len
    ))]
    InvalidDelimiterLength {
        len: Length,
        position: u64,
        backtrace: Backtrace,
    },

    /// The input ended inside a sequence of undefined length,
    /// before its sequence delimitation item.
    #[snafu(display("Truncated sequence at position {}", position))]
    TruncatedSequence { position: u64, backtrace: Backtrace },

    #[snafu(display(
        "Element tagged {} cannot have an undefined length",
        tag
    ))]
    UndefinedLengthNotAllowed { tag: Tag, backtrace: Backtrace },

    #[snafu(display(
        "Unexpected value form {} of element tagged {}: {}",
        got,
        tag,
        context
    ))]
    InvalidValueType {
        tag: Tag,
        got: ValueType,
        context: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Cannot split pixel data of element tagged {} into frames of {} bytes",
        tag,
        frame_length
    ))]
    InvalidFrameLength {
        tag: Tag,
        frame_length: i64,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Cannot split pixel data of element tagged {} holding more than one fragment",
        tag
    ))]
    MultipleFragments { tag: Tag, backtrace: Backtrace },

    #[snafu(display("No decoder available for specific character set term {:?}", term))]
    UnsupportedCharacterSet { term: String, backtrace: Backtrace },

    #[snafu(display("Transform function failed"))]
    TransformFailure {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wrap an arbitrary error raised by a caller-supplied transform.
    pub fn transform<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::TransformFailure {
            source: Box::new(source),
        }
    }
}
