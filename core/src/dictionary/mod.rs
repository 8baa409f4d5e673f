//! Core data dictionary types.
//!
//! The data dictionary is an external collaborator of the encoding engine:
//! it answers the single question "what is the default value representation
//! of this tag". This module provides the lookup contract, a table type
//! with support for the standard wildcard masks, and the fallback rules
//! for tags the dictionary does not know.

pub mod stub;

use crate::header::{Tag, VR};
use std::collections::HashMap;

pub use self::stub::StubDataDictionary;

/// The normalizing masks applied to a tag when consulting the wildcard
/// tables, in precedence order. A mask of `0xFFFF_FFFF` is the exact
/// table, which always wins over any wildcard entry.
pub const WILDCARD_MASKS: [u32; 5] = [
    0xFFFF_FF00,
    0xFFFF_FF0F,
    0xFFFF_000F,
    0xFFFF_0000,
    0xFF00_FFFF,
];

/// Type trait for a dictionary of DICOM attributes.
///
/// The dictionary's only obligation towards the encoding engine is
/// resolving a tag to its default value representation. Implementations
/// return `None` for tags they do not know, letting the caller apply the
/// fallback rules in [`dictionary_vr`].
pub trait DataDictionary {
    /// Fetch the default value representation of the given tag,
    /// or `None` if the dictionary has no record of it.
    fn vr_for_tag(&self, tag: Tag) -> Option<VR>;
}

impl<T: ?Sized> DataDictionary for &T
where
    T: DataDictionary,
{
    fn vr_for_tag(&self, tag: Tag) -> Option<VR> {
        (**self).vr_for_tag(tag)
    }
}

impl<T: ?Sized> DataDictionary for Box<T>
where
    T: DataDictionary,
{
    fn vr_for_tag(&self, tag: Tag) -> Option<VR> {
        (**self).vr_for_tag(tag)
    }
}

/// Resolve the value representation of a tag through the given
/// dictionary, applying the standard fallback rules when the dictionary
/// has no answer: group length elements are UL, private creator elements
/// are LO, and any other unknown tag is UN.
pub fn dictionary_vr<D>(dict: &D, tag: Tag) -> VR
where
    D: DataDictionary + ?Sized,
{
    if let Some(vr) = dict.vr_for_tag(tag) {
        return vr;
    }
    if tag.is_group_length() {
        VR::UL
    } else if tag.is_private_creator() {
        VR::LO
    } else {
        VR::UN
    }
}

/// A data dictionary backed by in-memory tables: one table of exact tag
/// records and one table per wildcard mask.
///
/// Lookup consults the exact table first and then each wildcard table in
/// [`WILDCARD_MASKS`] order, so that an exact record always dominates a
/// wildcard record matching the same tag.
#[derive(Debug, Clone, Default)]
pub struct TagDictionary {
    exact: HashMap<u32, VR>,
    masked: [HashMap<u32, VR>; WILDCARD_MASKS.len()],
}

impl TagDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        TagDictionary::default()
    }

    /// Record the value representation of a single tag.
    pub fn add(&mut self, tag: Tag, vr: VR) -> &mut Self {
        self.exact.insert(tag.as_u32(), vr);
        self
    }

    /// Record the value representation of a range of tags identified by a
    /// normalizing mask: a tag matches the record when
    /// `tag & mask == pattern & mask`.
    ///
    /// # Panics
    ///
    /// Panics if `mask` is not one of the supported [`WILDCARD_MASKS`].
    pub fn add_masked(&mut self, mask: u32, pattern: u32, vr: VR) -> &mut Self {
        let i = WILDCARD_MASKS
            .iter()
            .position(|&m| m == mask)
            .expect("unsupported wildcard mask");
        self.masked[i].insert(pattern & mask, vr);
        self
    }
}

impl DataDictionary for TagDictionary {
    fn vr_for_tag(&self, tag: Tag) -> Option<VR> {
        let value = tag.as_u32();
        if let Some(&vr) = self.exact.get(&value) {
            return Some(vr);
        }
        for (i, &mask) in WILDCARD_MASKS.iter().enumerate() {
            if let Some(&vr) = self.masked[i].get(&(value & mask)) {
                return Some(vr);
            }
        }
        None
    }
}
