use encoding_rs::UTF_16BE;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The value a character code maps to.
///
/// CID CMaps (`cidchar`/`cidrange`) produce integers, ToUnicode style CMaps
/// (`bfchar`/`bfrange`) produce destination byte strings, usually UTF-16BE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mapping {
    Cid(u32),
    Bytes(Vec<u8>),
}

/// Borrowed form of [`Mapping`] returned by lookups, so decoding a string
/// doesn't allocate per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingRef<'a> {
    Cid(u32),
    Bytes(&'a [u8]),
}

impl Mapping {
    pub fn borrowed(&self) -> MappingRef<'_> {
        match self {
            Mapping::Cid(cid) => MappingRef::Cid(*cid),
            Mapping::Bytes(bytes) => MappingRef::Bytes(bytes),
        }
    }
}

impl From<u32> for Mapping {
    fn from(cid: u32) -> Self {
        Mapping::Cid(cid)
    }
}

impl From<Vec<u8>> for Mapping {
    fn from(bytes: Vec<u8>) -> Self {
        Mapping::Bytes(bytes)
    }
}

impl From<&[u8]> for Mapping {
    fn from(bytes: &[u8]) -> Self {
        Mapping::Bytes(bytes.to_vec())
    }
}

impl<'a> MappingRef<'a> {
    pub fn to_owned_mapping(self) -> Mapping {
        match self {
            MappingRef::Cid(cid) => Mapping::Cid(cid),
            MappingRef::Bytes(bytes) => Mapping::Bytes(bytes.to_vec()),
        }
    }

    pub fn as_cid(self) -> Option<u32> {
        match self {
            MappingRef::Cid(cid) => Some(cid),
            MappingRef::Bytes(_) => None,
        }
    }

    pub fn as_bytes(self) -> Option<&'a [u8]> {
        match self {
            MappingRef::Cid(_) => None,
            MappingRef::Bytes(bytes) => Some(bytes),
        }
    }

    /// Decode a byte string destination as UTF-16BE text.
    ///
    /// Single byte destinations are widened to one code unit, which is how
    /// short `bfrange` targets such as `<20>` are meant to be read.
    pub fn to_unicode(self) -> Option<String> {
        let bytes = self.as_bytes()?;
        if bytes.len() == 1 {
            return char::from_u32(bytes[0] as u32).map(String::from);
        }
        let (text, _) = UTF_16BE.decode_without_bom_handling(bytes);
        Some(text.into_owned())
    }
}
