//! This crate contains the DICOM encoding and decoding primitives:
//! the transfer syntax specifiers and their polymorphic data element
//! decoders and encoders, the basic (endianness aware) binary codecs,
//! and the text codec interface for specific character sets.
//!
//! The crate is part of the [`dcmio`](https://crates.io/crates/dcmio)
//! project, and is typically consumed through the parser and object
//! crates rather than directly.

pub mod decode;
pub mod encode;
pub mod text;
pub mod transfer_syntax;

pub use crate::decode::{BasicDecode, DecodeFrom, DynDecoder};
pub use crate::encode::{DynEncoder, EncodeTo};
pub use crate::text::{DefaultCharacterSetCodec, DynTextCodec, TextCodec};
pub use crate::transfer_syntax::{Endianness, TransferSyntax};
