//! A data dictionary with no entries.

use super::DataDictionary;
use crate::header::{Tag, VR};

/// An empty data dictionary. Every lookup falls through to the caller's
/// fallback rules, so group lengths still resolve to UL, private creators
/// to LO, and everything else to UN.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StubDataDictionary;

impl DataDictionary for StubDataDictionary {
    fn vr_for_tag(&self, _tag: Tag) -> Option<VR> {
        None
    }
}
