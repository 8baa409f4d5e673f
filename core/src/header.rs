//! This module contains the assortment of types required for interpreting
//! DICOM data elements: the attribute tag, the value representation, the
//! value length, and the element header composites.

use snafu::{Backtrace, Snafu};
use std::fmt;
use std::str::{from_utf8, FromStr};

/// Error type for issues constructing a sequence item header.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SequenceItemHeaderError {
    /// Unexpected header tag.
    /// Only Item (0xFFFE, 0xE000),
    /// Item Delimiter (0xFFFE, 0xE00D),
    /// or Sequence Delimiter (0xFFFE, 0xE0DD)
    /// are admitted.
    #[snafu(display("Unexpected tag {}", tag))]
    UnexpectedTag { tag: Tag, backtrace: Backtrace },
    /// Unexpected delimiter value length.
    /// Must be zero for delimiters.
    #[snafu(display("Unexpected delimiter length {}", len))]
    UnexpectedDelimiterLength { len: Length, backtrace: Backtrace },
}

type Result<T, E = SequenceItemHeaderError> = std::result::Result<T, E>;

/// Idiomatic alias for a tag's group number.
pub type GroupNumber = u16;
/// Idiomatic alias for a tag's element number.
pub type ElementNumber = u16;

/// The data type for DICOM data element tags.
///
/// A tag is a pair of 16-bit unsigned integers,
/// the _group number_ and the _element number_.
/// Both `(u16, u16)` and `[u16; 2]` can be efficiently converted
/// to this type.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// Obtain the single 32-bit representation of this tag,
    /// with the group number in the 16 most significant bits.
    #[inline]
    pub fn as_u32(self) -> u32 {
        (u32::from(self.0) << 16) | u32::from(self.1)
    }

    /// Reconstruct a tag from its single 32-bit representation.
    #[inline]
    pub fn from_u32(value: u32) -> Tag {
        Tag((value >> 16) as u16, (value & 0xFFFF) as u16)
    }

    /// Whether this tag is part of a private group,
    /// as identified by an odd group number.
    #[inline]
    pub fn is_private(self) -> bool {
        self.0 & 1 == 1
    }

    /// Whether this tag refers to a private creator data element:
    /// a private tag with an element number between 0x0010 and 0x00FF.
    #[inline]
    pub fn is_private_creator(self) -> bool {
        self.is_private() && self.1 >= 0x0010 && self.1 <= 0x00FF
    }

    /// Whether this tag belongs to the file meta information group (0002).
    #[inline]
    pub fn is_meta(self) -> bool {
        self.0 == 0x0002
    }

    /// Whether this tag refers to a group length data element,
    /// as identified by a zero element number.
    #[inline]
    pub fn is_group_length(self) -> bool {
        self.1 == 0x0000
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from(value: (u16, u16)) -> Tag {
        Tag(value.0, value.1)
    }
}

impl From<[u16; 2]> for Tag {
    #[inline]
    fn from(value: [u16; 2]) -> Tag {
        Tag(value[0], value[1])
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

/// The tag of a sequence item: (FFFE,E000).
pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
/// The tag of an item delimitation item: (FFFE,E00D).
pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
/// The tag of a sequence delimitation item: (FFFE,E0DD).
pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);
/// The tag of the file meta information group length element: (0002,0000).
pub const FILE_META_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
/// The tag of the transfer syntax UID element: (0002,0010).
pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
/// The tag of the specific character set element: (0008,0005).
pub const SPECIFIC_CHARACTER_SET: Tag = Tag(0x0008, 0x0005);
/// The tag of the pixel data element: (7FE0,0010).
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

/// A type for representing data set content length, in bytes.
/// An internal value of `0xFFFF_FFFF` represents an undefined
/// (unspecified) length, which has to be determined with a
/// traversal based on the content's encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Length(pub u32);

const UNDEFINED_LEN: u32 = 0xFFFF_FFFF;

impl Length {
    /// A length that is undefined.
    pub const UNDEFINED: Self = Length(UNDEFINED_LEN);

    /// Create a new length value from its internal representation.
    /// This is equivalent to `Length(len)`.
    #[inline]
    pub fn new(len: u32) -> Self {
        Length(len)
    }

    /// Create a new length value with the given number of bytes.
    ///
    /// # Panic
    ///
    /// This function will panic if `len` represents an undefined length.
    #[inline]
    pub fn defined(len: u32) -> Self {
        assert_ne!(len, UNDEFINED_LEN);
        Length(len)
    }

    /// Check whether this length is undefined (unknown).
    #[inline]
    pub fn is_undefined(self) -> bool {
        self.0 == UNDEFINED_LEN
    }

    /// Check whether this length is well defined (known).
    #[inline]
    pub fn is_defined(self) -> bool {
        !self.is_undefined()
    }

    /// Fetch the concrete length value, if defined.
    #[inline]
    pub fn get(self) -> Option<u32> {
        match self.0 {
            UNDEFINED_LEN => None,
            v => Some(v),
        }
    }

    /// Check whether the length is even.
    /// An undefined length is not considered even.
    #[inline]
    pub fn is_even(self) -> bool {
        self.is_defined() && self.0 % 2 == 0
    }
}

impl From<u32> for Length {
    #[inline]
    fn from(o: u32) -> Self {
        Length(o)
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("Length(Undefined)"),
            l => write!(f, "Length({})", l),
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("U/L"),
            l => write!(f, "{}", l),
        }
    }
}

/// The kind of a value representation, which groups VRs sharing the same
/// reading and writing strategy.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum VrKind {
    /// Plain character data with space padding,
    /// split into multiple values by backslash.
    Text,
    /// Fixed-width binary numbers in the byte order of the transfer syntax.
    BinaryNumber,
    /// Large binary payloads, possibly split into fragments,
    /// which are candidates for lazy reading.
    BulkData,
    /// Unique identifiers (UI), character data with null padding.
    UniqueIdentifier,
    /// A sequence of items (SQ).
    Sequence,
    /// Attribute tags (AT).
    AttributeTag,
}

/// An enum type for a DICOM value representation.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
pub enum VR {
    /// Application Entity
    AE,
    /// Age String
    AS,
    /// Attribute Tag
    AT,
    /// Code String
    CS,
    /// Date
    DA,
    /// Decimal String
    DS,
    /// Date Time
    DT,
    /// Floating Point Single
    FL,
    /// Floating Point Double
    FD,
    /// Integer String
    IS,
    /// Long String
    LO,
    /// Long Text
    LT,
    /// Other Byte
    OB,
    /// Other Double
    OD,
    /// Other Float
    OF,
    /// Other Long
    OL,
    /// Other Word
    OW,
    /// Person Name
    PN,
    /// Short String
    SH,
    /// Signed Long
    SL,
    /// Sequence of Items
    SQ,
    /// Signed Short
    SS,
    /// Short Text
    ST,
    /// Time
    TM,
    /// Unlimited Characters
    UC,
    /// Unique Identifier (UID)
    UI,
    /// Unsigned Long
    UL,
    /// Unknown
    UN,
    /// Universal Resource Identifier or Universal Resource Locator (URI/URL)
    UR,
    /// Unsigned Short
    US,
    /// Unlimited Text
    UT,
}

impl VR {
    /// Obtain the value representation corresponding to the given two bytes.
    /// Each byte should represent an alphabetic character in upper case.
    pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
        from_utf8(chars.as_ref())
            .ok()
            .and_then(|s| VR::from_str(s).ok())
    }

    /// Retrieve a string representation of this VR.
    pub fn to_string(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FL => "FL",
            FD => "FD",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OL => "OL",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UC => "UC",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            UR => "UR",
            US => "US",
            UT => "UT",
        }
    }

    /// Retrieve a copy of this VR's byte representation.
    /// The function returns two alphabetic characters in upper case.
    pub fn to_bytes(self) -> [u8; 2] {
        let bytes = self.to_string().as_bytes();
        [bytes[0], bytes[1]]
    }

    /// Retrieve the semantic kind of this VR,
    /// which determines the reading and writing strategy.
    pub fn kind(self) -> VrKind {
        use VR::*;
        match self {
            AE | AS | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM => VrKind::Text,
            FL | FD | SL | SS | UL | US => VrKind::BinaryNumber,
            OB | OD | OF | OL | OW | UC | UN | UR | UT => VrKind::BulkData,
            UI => VrKind::UniqueIdentifier,
            SQ => VrKind::Sequence,
            AT => VrKind::AttributeTag,
        }
    }

    /// Whether an explicit transfer syntax encodes this VR's value length
    /// as a 32-bit integer preceded by two reserved bytes.
    /// All other VRs use a plain 16-bit length field.
    pub fn has_32bit_length(self) -> bool {
        use VR::*;
        matches!(self, OB | OD | OF | OL | OW | SQ | UC | UR | UT | UN)
    }
}

/// Obtain the value representation corresponding to the given string.
/// The string should hold exactly two UTF-8 encoded alphabetic characters
/// in upper case, otherwise no match is made.
impl FromStr for VR {
    type Err = &'static str;

    fn from_str(string: &str) -> std::result::Result<Self, Self::Err> {
        use VR::*;
        match string {
            "AE" => Ok(AE),
            "AS" => Ok(AS),
            "AT" => Ok(AT),
            "CS" => Ok(CS),
            "DA" => Ok(DA),
            "DS" => Ok(DS),
            "DT" => Ok(DT),
            "FL" => Ok(FL),
            "FD" => Ok(FD),
            "IS" => Ok(IS),
            "LO" => Ok(LO),
            "LT" => Ok(LT),
            "OB" => Ok(OB),
            "OD" => Ok(OD),
            "OF" => Ok(OF),
            "OL" => Ok(OL),
            "OW" => Ok(OW),
            "PN" => Ok(PN),
            "SH" => Ok(SH),
            "SL" => Ok(SL),
            "SQ" => Ok(SQ),
            "SS" => Ok(SS),
            "ST" => Ok(ST),
            "TM" => Ok(TM),
            "UC" => Ok(UC),
            "UI" => Ok(UI),
            "UL" => Ok(UL),
            "UN" => Ok(UN),
            "UR" => Ok(UR),
            "US" => Ok(US),
            "UT" => Ok(UT),
            _ => Err("no such value representation"),
        }
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(VR::to_string(*self))
    }
}

/// Trait for any DICOM entity (element or item) which may have a length.
pub trait HasLength {
    /// Retrieve the value data's length as specified by the data element or
    /// item, in bytes.
    ///
    /// According to the standard, the concrete value size may be undefined,
    /// which can be the case for sequence elements or encapsulated pixel
    /// data.
    fn length(&self) -> Length;

    /// Check whether the value is empty (0 length).
    fn is_empty(&self) -> bool {
        self.length() == Length(0)
    }
}

/// A trait for a data type containing a DICOM header.
pub trait Header: HasLength {
    /// Retrieve the element's tag as a `(group, element)` tuple.
    fn tag(&self) -> Tag;

    /// Check whether this is the header of an item.
    fn is_item(&self) -> bool {
        self.tag() == ITEM
    }

    /// Check whether this is the header of an item delimiter.
    fn is_item_delimiter(&self) -> bool {
        self.tag() == ITEM_DELIMITER
    }

    /// Check whether this is the header of a sequence delimiter.
    fn is_sequence_delimiter(&self) -> bool {
        self.tag() == SEQUENCE_DELIMITER
    }

    /// Check whether this is the header of an encapsulated pixel data.
    fn is_encapsulated_pixeldata(&self) -> bool {
        self.tag() == PIXEL_DATA && self.length().is_undefined()
    }
}

/// The header of a single data element: tag, value representation, and
/// value length.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DataElementHeader {
    /// The data element tag.
    pub tag: Tag,
    /// The data element's value representation.
    pub vr: VR,
    /// The data element's value length.
    pub len: Length,
}

impl DataElementHeader {
    /// Create a new data element header with the given properties.
    /// This is just a trivial constructor.
    #[inline]
    pub fn new<T: Into<Tag>>(tag: T, vr: VR, len: Length) -> DataElementHeader {
        DataElementHeader {
            tag: tag.into(),
            vr,
            len,
        }
    }

    /// Retrieve the element's value representation.
    #[inline]
    pub fn vr(&self) -> VR {
        self.vr
    }
}

impl HasLength for DataElementHeader {
    #[inline]
    fn length(&self) -> Length {
        self.len
    }
}

impl Header for DataElementHeader {
    #[inline]
    fn tag(&self) -> Tag {
        self.tag
    }
}

/// Data type for describing a sequence item data element.
/// If the element represents an item, it will also contain
/// the specified length.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SequenceItemHeader {
    /// The cursor contains an item.
    Item {
        /// the length of the item in bytes (can be 0xFFFFFFFF if undefined)
        len: Length,
    },
    /// The cursor read an item delimiter.
    /// The element ends here and should not be read any further.
    ItemDelimiter,
    /// The cursor read a sequence delimiter.
    /// The element ends here and should not be read any further.
    SequenceDelimiter,
}

impl SequenceItemHeader {
    /// Create a sequence item header using the element's raw properties.
    /// An error can be raised if the given properties do not relate to a
    /// sequence item, a sequence item delimiter or a sequence delimiter.
    pub fn new<T: Into<Tag>>(tag: T, len: Length) -> Result<SequenceItemHeader> {
        match tag.into() {
            ITEM => Ok(SequenceItemHeader::Item { len }),
            ITEM_DELIMITER => {
                // delimiters should not have a positive length
                if len != Length(0) {
                    UnexpectedDelimiterLengthSnafu { len }.fail()
                } else {
                    Ok(SequenceItemHeader::ItemDelimiter)
                }
            }
            SEQUENCE_DELIMITER => {
                if len != Length(0) {
                    UnexpectedDelimiterLengthSnafu { len }.fail()
                } else {
                    Ok(SequenceItemHeader::SequenceDelimiter)
                }
            }
            tag => UnexpectedTagSnafu { tag }.fail(),
        }
    }
}

impl HasLength for SequenceItemHeader {
    #[inline]
    fn length(&self) -> Length {
        match *self {
            SequenceItemHeader::Item { len } => len,
            SequenceItemHeader::ItemDelimiter | SequenceItemHeader::SequenceDelimiter => Length(0),
        }
    }
}

impl Header for SequenceItemHeader {
    #[inline]
    fn tag(&self) -> Tag {
        match *self {
            SequenceItemHeader::Item { .. } => ITEM,
            SequenceItemHeader::ItemDelimiter => ITEM_DELIMITER,
            SequenceItemHeader::SequenceDelimiter => SEQUENCE_DELIMITER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_predicates() {
        assert!(Tag(0x0009, 0x0001).is_private());
        assert!(!Tag(0x0008, 0x0001).is_private());
        assert!(Tag(0x0009, 0x0010).is_private_creator());
        assert!(Tag(0x0009, 0x00FF).is_private_creator());
        assert!(!Tag(0x0009, 0x0100).is_private_creator());
        assert!(!Tag(0x0008, 0x0010).is_private_creator());
        assert!(Tag(0x0002, 0x0010).is_meta());
        assert!(!Tag(0x0008, 0x0010).is_meta());
        assert!(Tag(0x0008, 0x0000).is_group_length());
        assert!(!Tag(0x0008, 0x0001).is_group_length());
    }

    #[test]
    fn tag_exhaustive_predicates() {
        // sweep over a representative portion of the tag space
        for group in (0u16..0x00FF).chain([0x7FE0, 0xFFFE]) {
            for element in 0u16..0x0120 {
                let tag = Tag(group, element);
                assert_eq!(tag.is_private(), group % 2 == 1);
                assert_eq!(tag.is_meta(), group == 0x0002);
                assert_eq!(tag.is_group_length(), element == 0x0000);
            }
        }
    }

    #[test]
    fn tag_u32_round_trip() {
        let tag = Tag(0x7FE0, 0x0010);
        assert_eq!(tag.as_u32(), 0x7FE0_0010);
        assert_eq!(Tag::from_u32(0x7FE0_0010), tag);
    }

    #[test]
    fn tag_text_form() {
        assert_eq!(Tag(0x0002, 0x0000).to_string(), "(0002,0000)");
        assert_eq!(Tag(0x7FE0, 0x0010).to_string(), "(7FE0,0010)");
    }

    #[test]
    fn length_undefined() {
        assert!(Length(0xFFFF_FFFF).is_undefined());
        assert!(Length::UNDEFINED.is_undefined());
        assert_eq!(Length::UNDEFINED.get(), None);
        assert_eq!(Length(4).get(), Some(4));
        assert!(Length(4).is_even());
        assert!(!Length(3).is_even());
        assert!(!Length::UNDEFINED.is_even());
    }

    #[test]
    fn vr_lengths_and_kinds() {
        use super::VR::*;
        for vr in [OB, OD, OF, OL, OW, SQ, UC, UR, UT, UN] {
            assert!(vr.has_32bit_length(), "{} should have a 32-bit length", vr);
        }
        for vr in [AE, CS, DS, FL, FD, LO, LT, PN, SH, SS, ST, TM, UI, UL, US, AT] {
            assert!(!vr.has_32bit_length(), "{} should have a 16-bit length", vr);
        }
        assert_eq!(SQ.kind(), VrKind::Sequence);
        assert_eq!(UI.kind(), VrKind::UniqueIdentifier);
        assert_eq!(AT.kind(), VrKind::AttributeTag);
        assert_eq!(OB.kind(), VrKind::BulkData);
        assert_eq!(UT.kind(), VrKind::BulkData);
        assert_eq!(US.kind(), VrKind::BinaryNumber);
        assert_eq!(PN.kind(), VrKind::Text);
    }

    #[test]
    fn vr_binary_round_trip() {
        for s in ["AE", "OB", "SQ", "UI", "UN"] {
            let vr = VR::from_str(s).unwrap();
            assert_eq!(vr.to_string(), s);
            assert_eq!(VR::from_binary(vr.to_bytes()), Some(vr));
        }
        assert_eq!(VR::from_binary([0x00, 0x20]), None);
        assert!(VR::from_str("ZZ").is_err());
    }

    #[test]
    fn sequence_item_headers() {
        let item = SequenceItemHeader::new(ITEM, Length(24)).unwrap();
        assert_eq!(item, SequenceItemHeader::Item { len: Length(24) });
        assert!(item.is_item());

        let delim = SequenceItemHeader::new(SEQUENCE_DELIMITER, Length(0)).unwrap();
        assert!(delim.is_sequence_delimiter());

        assert!(SequenceItemHeader::new(ITEM_DELIMITER, Length(2)).is_err());
        assert!(SequenceItemHeader::new(Tag(0x0008, 0x0005), Length(0)).is_err());
    }
}
