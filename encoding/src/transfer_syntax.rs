//! Module containing the DICOM transfer syntax specifiers and the UID
//! lookup that resolves them.
//!
//! A [`TransferSyntax`] carries the static properties of an encoding (byte
//! order, VR explicitness, and whether the data set is deflated) and acts
//! as a factory for the matching data element decoder and encoder. The set
//! of specifiers is a closed, process-wide constant table: compressed
//! pixel data syntaxes are all handled by parsing their containers as
//! Explicit VR Little Endian with the pixel data kept as opaque fragments.

use crate::decode::basic::BasicDecoder;
use crate::decode::explicit_be::ExplicitVRBigEndianDecoder;
use crate::decode::explicit_le::ExplicitVRLittleEndianDecoder;
use crate::decode::implicit_le::ImplicitVRLittleEndianDecoder;
use crate::decode::DynDecoder;
use crate::encode::explicit_be::ExplicitVRBigEndianEncoder;
use crate::encode::explicit_le::ExplicitVRLittleEndianEncoder;
use crate::encode::implicit_le::ImplicitVRLittleEndianEncoder;
use crate::encode::DynEncoder;
use dcmio_core::dictionary::DataDictionary;
use dcmio_core::VR;
use std::io::{Read, Write};

pub use byteordered::Endianness;

/// A DICOM transfer syntax specifier.
#[derive(Debug)]
pub struct TransferSyntax {
    /// The unique identifier of the transfer syntax.
    uid: &'static str,
    /// The name of the transfer syntax.
    name: &'static str,
    /// The byte order of data.
    byte_order: Endianness,
    /// Whether the transfer syntax mandates an explicit value
    /// representation, or the VR is implicit.
    explicit_vr: bool,
    /// Whether the data set following the file meta group is compressed
    /// with the Deflate algorithm.
    deflated: bool,
}

/// The Implicit VR Little Endian transfer syntax.
pub static IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax {
    uid: "1.2.840.10008.1.2",
    name: "Implicit VR Little Endian",
    byte_order: Endianness::Little,
    explicit_vr: false,
    deflated: false,
};

/// The Explicit VR Little Endian transfer syntax.
pub static EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax {
    uid: "1.2.840.10008.1.2.1",
    name: "Explicit VR Little Endian",
    byte_order: Endianness::Little,
    explicit_vr: true,
    deflated: false,
};

/// The Explicit VR Big Endian transfer syntax.
pub static EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax {
    uid: "1.2.840.10008.1.2.2",
    name: "Explicit VR Big Endian",
    byte_order: Endianness::Big,
    explicit_vr: true,
    deflated: false,
};

/// The Deflated Explicit VR Little Endian transfer syntax.
pub static DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax {
    uid: "1.2.840.10008.1.2.1.99",
    name: "Deflated Explicit VR Little Endian",
    byte_order: Endianness::Little,
    explicit_vr: true,
    deflated: true,
};

impl PartialEq for TransferSyntax {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

/// Obtain the transfer syntax specifier registered for the given UID.
///
/// Trailing null characters and spaces in `uid` are ignored. UIDs with no
/// specifier of their own, which includes all of the compressed pixel
/// data syntaxes, resolve to Explicit VR Little Endian as per PS3.5 A.4:
/// their data sets are read as an explicit VR little endian stream in
/// which the pixel data stays encapsulated.
pub fn from_uid(uid: &str) -> &'static TransferSyntax {
    match uid.trim_end_matches(['\0', ' ']) {
        "1.2.840.10008.1.2" => &IMPLICIT_VR_LITTLE_ENDIAN,
        "1.2.840.10008.1.2.1" => &EXPLICIT_VR_LITTLE_ENDIAN,
        "1.2.840.10008.1.2.2" => &EXPLICIT_VR_BIG_ENDIAN,
        "1.2.840.10008.1.2.1.99" => &DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
        _ => &EXPLICIT_VR_LITTLE_ENDIAN,
    }
}

impl TransferSyntax {
    /// Obtain this transfer syntax' unique identifier.
    pub const fn uid(&self) -> &'static str {
        self.uid
    }

    /// Obtain the name of this transfer syntax.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Obtain this transfer syntax' expected endianness.
    pub const fn endianness(&self) -> Endianness {
        self.byte_order
    }

    /// Whether this transfer syntax stores the VR of each element on the
    /// wire.
    pub const fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// Whether the data set portion of the stream is deflated.
    pub const fn is_deflated(&self) -> bool {
        self.deflated
    }

    /// Retrieve the appropriate data element decoder for this transfer
    /// syntax, resolving implicit VRs through the given data dictionary.
    ///
    /// For the deflated transfer syntax, the resulting decoder expects an
    /// already inflated stream: the consumer of this method needs to adapt
    /// the reader before using the decoder.
    pub fn decoder_for<S, D>(&self, dict: D) -> DynDecoder<S>
    where
        S: ?Sized + Read,
        D: DataDictionary + 'static,
    {
        if self.explicit_vr {
            match self.byte_order {
                Endianness::Little => Box::new(ExplicitVRLittleEndianDecoder::default()),
                Endianness::Big => Box::new(ExplicitVRBigEndianDecoder::default()),
            }
        } else {
            Box::new(ImplicitVRLittleEndianDecoder::with_dict(dict))
        }
    }

    /// Retrieve the appropriate data element encoder for this transfer
    /// syntax. Yields `None` for the deflated transfer syntax, for which
    /// writing is not supported.
    pub fn encoder_for<W>(&self) -> Option<DynEncoder<W>>
    where
        W: ?Sized + Write,
    {
        if self.deflated {
            return None;
        }
        Some(if self.explicit_vr {
            match self.byte_order {
                Endianness::Little => Box::new(ExplicitVRLittleEndianEncoder::default()),
                Endianness::Big => Box::new(ExplicitVRBigEndianEncoder::default()),
            }
        } else {
            Box::new(ImplicitVRLittleEndianEncoder::default())
        })
    }

    /// Obtain a dynamic basic decoder, based on this transfer syntax'
    /// expected endianness.
    pub fn basic_decoder(&self) -> BasicDecoder {
        BasicDecoder::from(self.endianness())
    }

    /// The number of bytes of a serialized element header with the given
    /// VR under this transfer syntax.
    pub fn header_size(&self, vr: VR) -> u64 {
        if self.explicit_vr && vr.has_32bit_length() {
            12
        } else {
            8
        }
    }

    /// The number of bytes of a whole serialized data element with the
    /// given VR and value length under this transfer syntax. Used for
    /// length precomputation, notably of the file meta group length.
    pub fn element_size(&self, vr: VR, value_len: u32) -> u64 {
        self.header_size(vr) + u64::from(value_len)
    }
}
