//! This module contains reusable components for encoding and decoding text
//! in DICOM data structures, including support for character repertoires.
//!
//! The default character repertoire (the ISO-IR 6 subset of ISO 8859-1) is
//! always available, as are the UTF-8 and GB18030 repertoires. Any other
//! specific character set defined term is resolved through
//! [`lookup_term`], which callers may replace with their own lookup when
//! configuring the text decoding pipeline.

use encoding::all::{GB18030, ISO_8859_1, UTF_8};
use encoding::label::encoding_from_whatwg_label;
use encoding::{DecoderTrap, EncoderTrap, Encoding, EncodingRef, RawDecoder, StringWriter};
use snafu::{Backtrace, Snafu};

/// An error from a text encoding or decoding procedure.
#[derive(Debug, Snafu)]
#[snafu(display("{}", message))]
pub struct TextEncodingError {
    message: String,
    backtrace: Backtrace,
}

impl TextEncodingError {
    /// Build an error from a message of arbitrary type.
    pub fn new<T: Into<String>>(message: T) -> Self {
        TextEncodingSnafu {
            message: message.into(),
        }
        .build()
    }
}

pub type Result<T> = std::result::Result<T, TextEncodingError>;

/// A holder of encoding and decoding mechanisms for text in DICOM content,
/// which according to the standard, depends on the specific character set.
pub trait TextCodec {
    /// Obtain a name for this text encoding,
    /// usually a specific character set defined term that refers to it.
    fn name(&self) -> &str;

    /// Decode the given byte buffer as a single string. The resulting string
    /// _may_ contain backslash characters ('\') to delimit individual values,
    /// and should be split later on if required.
    fn decode(&self, text: &[u8]) -> Result<String>;

    /// Encode a text value into a byte vector. The input string can
    /// feature multiple text values by using the backslash character ('\')
    /// as the value delimiter.
    fn encode(&self, text: &str) -> Result<Vec<u8>>;
}

impl<T: ?Sized> TextCodec for Box<T>
where
    T: TextCodec,
{
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn decode(&self, text: &[u8]) -> Result<String> {
        self.as_ref().decode(text)
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        self.as_ref().encode(text)
    }
}

impl<'a, T: ?Sized> TextCodec for &'a T
where
    T: TextCodec,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn decode(&self, text: &[u8]) -> Result<String> {
        (**self).decode(text)
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        (**self).encode(text)
    }
}

/// Type alias for a type erased text codec.
pub type DynTextCodec = Box<dyn TextCodec>;

fn decode_text_trap(
    _decoder: &mut dyn RawDecoder,
    input: &[u8],
    output: &mut dyn StringWriter,
) -> bool {
    let c = input[0];
    let o0 = c & 7;
    let o1 = (c & 56) >> 3;
    let o2 = (c & 192) >> 6;
    output.write_char('\\');
    output.write_char((o2 + b'0') as char);
    output.write_char((o1 + b'0') as char);
    output.write_char((o0 + b'0') as char);
    true
}

/// Data type representing the default character repertoire.
///
/// Decoding is infallible: bytes outside the repertoire are written out as
/// escaped octal codes rather than producing an error.
#[derive(Debug, Default, Clone, PartialEq, Eq, Copy)]
pub struct DefaultCharacterSetCodec;

impl TextCodec for DefaultCharacterSetCodec {
    fn name(&self) -> &str {
        "ISO_IR 6"
    }

    fn decode(&self, text: &[u8]) -> Result<String> {
        ISO_8859_1
            .decode(text, DecoderTrap::Call(decode_text_trap))
            .map_err(TextEncodingError::new)
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        ISO_8859_1
            .encode(text, EncoderTrap::Strict)
            .map_err(TextEncodingError::new)
    }
}

/// Data type representing the UTF-8 character set (ISO-IR 192).
#[derive(Debug, Default, Clone, PartialEq, Eq, Copy)]
pub struct Utf8CharacterSetCodec;

impl TextCodec for Utf8CharacterSetCodec {
    fn name(&self) -> &str {
        "ISO_IR 192"
    }

    fn decode(&self, text: &[u8]) -> Result<String> {
        UTF_8
            .decode(text, DecoderTrap::Call(decode_text_trap))
            .map_err(TextEncodingError::new)
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        UTF_8
            .encode(text, EncoderTrap::Strict)
            .map_err(TextEncodingError::new)
    }
}

/// Data type representing the GB18030 character set.
#[derive(Debug, Default, Clone, PartialEq, Eq, Copy)]
pub struct Gb18030CharacterSetCodec;

impl TextCodec for Gb18030CharacterSetCodec {
    fn name(&self) -> &str {
        "GB18030"
    }

    fn decode(&self, text: &[u8]) -> Result<String> {
        GB18030
            .decode(text, DecoderTrap::Call(decode_text_trap))
            .map_err(TextEncodingError::new)
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        GB18030
            .encode(text, EncoderTrap::Strict)
            .map_err(TextEncodingError::new)
    }
}

/// A text codec backed by an arbitrary character encoding implementation,
/// labelled with the specific character set term that selected it.
struct LabelledTextCodec {
    term: String,
    inner: EncodingRef,
}

impl std::fmt::Debug for LabelledTextCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("LabelledTextCodec")
            .field("term", &self.term)
            .finish()
    }
}

impl TextCodec for LabelledTextCodec {
    fn name(&self) -> &str {
        &self.term
    }

    fn decode(&self, text: &[u8]) -> Result<String> {
        self.inner
            .decode(text, DecoderTrap::Strict)
            .map_err(TextEncodingError::new)
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        self.inner
            .encode(text, EncoderTrap::Strict)
            .map_err(TextEncodingError::new)
    }
}

/// Mapping of specific character set defined terms (PS3.2 D.6.2) to the
/// WHATWG encoding labels which implement them.
fn term_label(term: &str) -> Option<&'static str> {
    Some(match term {
        "" | "ISO 2022 IR 6" | "ISO_IR 6" => "us-ascii",
        "ISO_IR 100" | "ISO 2022 IR 100" => "iso-8859-1",
        "ISO_IR 101" | "ISO 2022 IR 101" => "iso-8859-2",
        "ISO_IR 109" | "ISO 2022 IR 109" => "iso-8859-3",
        "ISO_IR 110" | "ISO 2022 IR 110" => "iso-8859-4",
        "ISO_IR 144" | "ISO 2022 IR 144" => "iso-8859-5",
        "ISO_IR 127" | "ISO 2022 IR 127" => "iso-8859-6",
        "ISO_IR 126" | "ISO 2022 IR 126" => "iso-8859-7",
        "ISO_IR 138" | "ISO 2022 IR 138" => "iso-8859-8",
        "ISO_IR 148" | "ISO 2022 IR 148" => "iso-8859-9",
        "ISO_IR 13" | "ISO 2022 IR 13" => "shift_jis",
        "ISO 2022 IR 87" | "ISO 2022 IR 159" => "iso-2022-jp",
        "ISO 2022 IR 149" => "euc-kr",
        "ISO_IR 192" => "utf-8",
        "GB18030" => "gb18030",
        "GBK" => "gbk",
        _ => return None,
    })
}

/// Resolve a specific character set defined term to a text codec.
///
/// This is the built-in implementation of the encoding lookup used by the
/// UTF-8 text transform; terms that the available encodings cannot serve
/// resolve to `None`. The term is matched with trailing spaces ignored,
/// and an empty term maps to the default repertoire.
pub fn lookup_term(term: &str) -> Option<DynTextCodec> {
    let term = term.trim_end();
    match term {
        "ISO_IR 192" => return Some(Box::new(Utf8CharacterSetCodec)),
        "GB18030" => return Some(Box::new(Gb18030CharacterSetCodec)),
        _ => (),
    }
    let inner = encoding_from_whatwg_label(term_label(term)?)?;
    Some(Box::new(LabelledTextCodec {
        term: term.to_owned(),
        inner,
    }))
}
