use log::debug;
use std::sync::Arc;

use crate::error::{Error, ParseError, Result};
use crate::hex::increment_bytes;
use crate::mapping::{Mapping, MappingRef};
use crate::table::{CodeTable, IDENTITY_MAX};

/// Widest `cidrange`/`bfrange` accepted, in codes minus one.
pub const MAX_MAP_RANGE: u32 = (1 << 24) - 1;

pub const IDENTITY_H: &str = "Identity-H";
pub const IDENTITY_V: &str = "Identity-V";

/// A character code mapping table.
///
/// Codes are split out of a byte string using the codespace ranges, which are
/// kept in four buckets, one per code length in bytes. Shorter codes always
/// win over longer ones, so single byte ranges declared next to two byte
/// ranges keep their meaning.
#[derive(Debug, Clone, Default)]
pub struct CMap {
    codespace_ranges: [Vec<(u32, u32)>; 4],
    num_codespace_ranges: usize,
    table: CodeTable,
    name: Option<String>,
    vertical: bool,
    use_cmap: Option<Arc<CMap>>,
    builtin: bool,
}

impl CMap {
    pub fn new() -> CMap {
        CMap::default()
    }

    pub(crate) fn new_builtin() -> CMap {
        CMap {
            builtin: true,
            ..CMap::default()
        }
    }

    /// Create the identity CMap: every `code_len` byte code in `0..=0xFFFF`
    /// maps to the CID with the same value.
    pub fn identity(vertical: bool, code_len: usize) -> CMap {
        debug_assert!((1..=4).contains(&code_len), "identity code length must be 1 to 4 bytes");
        let mut cmap = CMap {
            table: CodeTable::Identity,
            vertical,
            ..CMap::default()
        };
        cmap.codespace_ranges[code_len.clamp(1, 4) - 1].push((0, IDENTITY_MAX));
        cmap.num_codespace_ranges = 1;
        cmap
    }

    pub fn is_identity_table(&self) -> bool {
        matches!(self.table, CodeTable::Identity)
    }

    fn assert_mutable(&self, operation: &str) {
        if self.is_identity_table() {
            panic!("{operation} called on an identity cmap");
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    pub fn set_vertical(&mut self, vertical: bool) {
        self.vertical = vertical;
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// The CMap this one inherits from through `usecmap`.
    pub fn use_cmap(&self) -> Option<&Arc<CMap>> {
        self.use_cmap.as_ref()
    }

    /// Codespace ranges declared for codes of `code_len` bytes.
    pub fn codespace_ranges(&self, code_len: usize) -> &[(u32, u32)] {
        match code_len {
            1..=4 => &self.codespace_ranges[code_len - 1],
            _ => &[],
        }
    }

    pub fn num_codespace_ranges(&self) -> usize {
        self.num_codespace_ranges
    }

    pub fn add_codespace_range(&mut self, code_len: usize, low: u32, high: u32) -> Result<()> {
        if !(1..=4).contains(&code_len) {
            return Err(ParseError::InvalidCodeLength(code_len).into());
        }
        self.codespace_ranges[code_len - 1].push((low, high));
        self.num_codespace_ranges += 1;
        Ok(())
    }

    pub fn map_one(&mut self, code: u32, value: Mapping) {
        self.assert_mutable("map_one");
        self.table.insert(code, value);
    }

    pub fn map_cid_range(&mut self, low: u32, high: u32, dst_low: u32) -> Result<()> {
        self.assert_mutable("map_cid_range");
        check_range(low, high)?;
        self.table.insert_cid_range(low, high, dst_low);
        Ok(())
    }

    /// Map `low..=high` to consecutive destination strings starting at `dst_low`.
    pub fn map_bf_range(&mut self, low: u32, high: u32, dst_low: &[u8]) -> Result<()> {
        self.assert_mutable("map_bf_range");
        check_range(low, high)?;
        if low > high {
            return Ok(());
        }
        let mut dst = dst_low.to_vec();
        for code in low..high {
            let next = {
                let mut next = dst.clone();
                increment_bytes(&mut next);
                next
            };
            self.table.insert(code, Mapping::Bytes(dst));
            dst = next;
        }
        self.table.insert(high, Mapping::Bytes(dst));
        Ok(())
    }

    /// Map `low..=high` positionally to `values`, stopping early if the list
    /// is shorter than the range.
    pub fn map_bf_range_to_array(&mut self, low: u32, high: u32, values: Vec<Mapping>) -> Result<()> {
        self.assert_mutable("map_bf_range_to_array");
        check_range(low, high)?;
        if low > high {
            return Ok(());
        }
        for (code, value) in (low..=high).zip(values) {
            self.table.insert(code, value);
        }
        Ok(())
    }

    #[inline]
    pub fn lookup(&self, code: u32) -> Option<MappingRef<'_>> {
        self.table.get(code)
    }

    #[inline]
    pub fn contains(&self, code: u32) -> bool {
        self.table.contains(code)
    }

    /// Reverse lookup: the lowest code mapping to `value`.
    pub fn char_code_of(&self, value: MappingRef<'_>) -> Option<u32> {
        self.table.code_of(value)
    }

    /// Number of mapped codes.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every mapping in ascending code order.
    pub fn for_each<'a>(&'a self, f: impl FnMut(u32, MappingRef<'a>)) {
        self.table.for_each(f)
    }

    /// The table as a vector indexed by code.
    pub fn to_dense_table(&self) -> Vec<Option<Mapping>> {
        self.table.to_dense()
    }

    /// Read one character code from `bytes` at `offset`.
    ///
    /// Returns the code and the number of bytes it occupies. Codes not
    /// covered by any codespace range are read as a single byte.
    #[inline]
    pub fn read_char_code(&self, bytes: &[u8], offset: usize) -> (u32, usize) {
        let mut code = 0u32;
        for (n, ranges) in self.codespace_ranges.iter().enumerate() {
            let Some(&byte) = bytes.get(offset + n) else {
                break;
            };
            code = (code << 8) | byte as u32;
            if ranges.iter().any(|&(low, high)| low <= code && code <= high) {
                return (code, n + 1);
            }
        }
        (bytes.get(offset).copied().unwrap_or(0) as u32, 1)
    }

    /// Number of bytes `code` occupies when written out.
    pub fn char_code_length(&self, code: u32) -> usize {
        self.codespace_ranges
            .iter()
            .position(|ranges| ranges.iter().any(|&(low, high)| low <= code && code <= high))
            .map_or(1, |n| n + 1)
    }

    pub fn has_identity_name(&self) -> bool {
        matches!(self.name.as_deref(), Some(IDENTITY_H) | Some(IDENTITY_V))
    }

    /// Whether this parsed CMap is an identity CMap in disguise.
    ///
    /// # Panics
    ///
    /// Panics when called on a CMap created by [`CMap::identity`].
    pub fn is_identity(&self) -> bool {
        if self.is_identity_table() {
            panic!("is_identity called on an identity cmap");
        }
        if !self.has_identity_name() {
            return false;
        }
        let CodeTable::Dense(entries) = &self.table else {
            return false;
        };
        entries.len() == IDENTITY_MAX as usize + 1
            && (0u32..)
                .zip(entries)
                .all(|(code, entry)| matches!(entry, Some(Mapping::Cid(cid)) if *cid == code))
    }

    /// Inherit from `base`: take its codespace ranges if none were declared
    /// here and copy every mapping whose code isn't mapped yet.
    pub(crate) fn extend_from(&mut self, base: Arc<CMap>) {
        debug!(
            "merging usecmap {} into {}",
            base.name().unwrap_or("<unnamed>"),
            self.name().unwrap_or("<unnamed>")
        );
        if self.num_codespace_ranges == 0 {
            self.codespace_ranges = base.codespace_ranges.clone();
            self.num_codespace_ranges = base.num_codespace_ranges;
        }
        self.table.merge_missing_from(&base.table);
        self.use_cmap = Some(base);
    }
}

fn check_range(low: u32, high: u32) -> Result<()> {
    if high.saturating_sub(low) > MAX_MAP_RANGE {
        return Err(Error::RangeTooLarge { low, high });
    }
    Ok(())
}
