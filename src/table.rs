use rangemap::RangeInclusiveMap;
use std::mem;

use crate::mapping::{Mapping, MappingRef};

/// Tables whose largest code is at most this value are stored densely.
pub(crate) const DENSE_LIMIT: u32 = 0x10000;

/// Identity tables cover `0..=IDENTITY_MAX`.
pub(crate) const IDENTITY_MAX: u32 = 0xFFFF;

/// Code to value store behind a [`CMap`](crate::CMap).
///
/// Most CMaps only use codes up to 0xFFFF and are kept as a plain vector.
/// Once a code above `DENSE_LIMIT` is inserted the table switches to a range
/// map, so hostile `cidrange` entries spanning millions of codes cost a single
/// range instead of millions of slots.
#[derive(Debug, Clone)]
pub(crate) enum CodeTable {
    Dense(Vec<Option<Mapping>>),
    Sparse(RangeInclusiveMap<u32, SparseTarget>),
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SparseTarget {
    // don't store the cid but its offset to the code
    // so that consecutive codes collapse into one range
    Cid { offset: u32 },
    Bytes(Vec<u8>),
}

impl SparseTarget {
    fn new(code: u32, value: Mapping) -> SparseTarget {
        match value {
            Mapping::Cid(cid) => SparseTarget::Cid {
                offset: cid.wrapping_sub(code),
            },
            Mapping::Bytes(bytes) => SparseTarget::Bytes(bytes),
        }
    }

    fn resolve(&self, code: u32) -> MappingRef<'_> {
        match self {
            SparseTarget::Cid { offset } => MappingRef::Cid(code.wrapping_add(*offset)),
            SparseTarget::Bytes(bytes) => MappingRef::Bytes(bytes),
        }
    }
}

impl Default for CodeTable {
    fn default() -> Self {
        CodeTable::Dense(Vec::new())
    }
}

impl CodeTable {
    #[inline]
    pub fn get(&self, code: u32) -> Option<MappingRef<'_>> {
        match self {
            CodeTable::Dense(entries) => entries.get(code as usize).and_then(Option::as_ref).map(Mapping::borrowed),
            CodeTable::Sparse(map) => map.get(&code).map(|target| target.resolve(code)),
            CodeTable::Identity => (code <= IDENTITY_MAX).then_some(MappingRef::Cid(code)),
        }
    }

    #[inline]
    pub fn contains(&self, code: u32) -> bool {
        match self {
            CodeTable::Dense(entries) => matches!(entries.get(code as usize), Some(Some(_))),
            CodeTable::Sparse(map) => map.contains_key(&code),
            CodeTable::Identity => code <= IDENTITY_MAX,
        }
    }

    pub fn insert(&mut self, code: u32, value: Mapping) {
        if code > DENSE_LIMIT {
            self.make_sparse();
        }
        match self {
            CodeTable::Dense(entries) => {
                let index = code as usize;
                if entries.len() <= index {
                    entries.resize(index + 1, None);
                }
                entries[index] = Some(value);
            }
            CodeTable::Sparse(map) => map.insert(code..=code, SparseTarget::new(code, value)),
            CodeTable::Identity => unreachable!("identity tables are immutable"),
        }
    }

    /// Map `low..=high` to `dst_low, dst_low + 1, ...`. Empty ranges are ignored.
    pub fn insert_cid_range(&mut self, low: u32, high: u32, dst_low: u32) {
        if low > high {
            return;
        }
        if high > DENSE_LIMIT {
            self.make_sparse();
        }
        match self {
            CodeTable::Dense(entries) => {
                if entries.len() <= high as usize {
                    entries.resize(high as usize + 1, None);
                }
                for (code, cid) in (low..=high).zip(0u32..) {
                    entries[code as usize] = Some(Mapping::Cid(dst_low.wrapping_add(cid)));
                }
            }
            CodeTable::Sparse(map) => map.insert(
                low..=high,
                SparseTarget::Cid {
                    offset: dst_low.wrapping_sub(low),
                },
            ),
            CodeTable::Identity => unreachable!("identity tables are immutable"),
        }
    }

    fn make_sparse(&mut self) {
        if let CodeTable::Dense(entries) = self {
            let entries = mem::take(entries);
            let mut map = RangeInclusiveMap::new();
            for (code, entry) in (0u32..).zip(entries) {
                if let Some(value) = entry {
                    map.insert(code..=code, SparseTarget::new(code, value));
                }
            }
            *self = CodeTable::Sparse(map);
        }
    }

    /// Number of mapped codes.
    pub fn len(&self) -> usize {
        match self {
            CodeTable::Dense(entries) => entries.iter().filter(|entry| entry.is_some()).count(),
            CodeTable::Sparse(map) => map
                .iter()
                .map(|(range, _)| (*range.end() - *range.start()) as usize + 1)
                .sum(),
            CodeTable::Identity => IDENTITY_MAX as usize + 1,
        }
    }

    /// Visit every mapped code in ascending order.
    pub fn for_each<'a>(&'a self, mut f: impl FnMut(u32, MappingRef<'a>)) {
        match self {
            CodeTable::Dense(entries) => {
                for (code, entry) in (0u32..).zip(entries) {
                    if let Some(value) = entry {
                        f(code, value.borrowed());
                    }
                }
            }
            CodeTable::Sparse(map) => {
                for (range, target) in map.iter() {
                    for code in range.clone() {
                        f(code, target.resolve(code));
                    }
                }
            }
            CodeTable::Identity => {
                for code in 0..=IDENTITY_MAX {
                    f(code, MappingRef::Cid(code));
                }
            }
        }
    }

    /// Copy every entry of `base` whose code is not mapped here yet.
    pub fn merge_missing_from(&mut self, base: &CodeTable) {
        match base {
            CodeTable::Sparse(base_map) => {
                self.make_sparse();
                if let CodeTable::Sparse(map) = self {
                    for (range, target) in base_map.iter() {
                        let gaps: Vec<_> = map.gaps(range).collect();
                        for gap in gaps {
                            map.insert(gap, target.clone());
                        }
                    }
                }
            }
            CodeTable::Dense(_) | CodeTable::Identity => base.for_each(|code, value| {
                if !self.contains(code) {
                    self.insert(code, value.to_owned_mapping());
                }
            }),
        }
    }

    pub fn to_dense(&self) -> Vec<Option<Mapping>> {
        if let CodeTable::Dense(entries) = self {
            return entries.clone();
        }
        let mut entries = Vec::new();
        self.for_each(|code, value| {
            let index = code as usize;
            if entries.len() <= index {
                entries.resize(index + 1, None);
            }
            entries[index] = Some(value.to_owned_mapping());
        });
        entries
    }

    /// First code, in ascending order, that maps to `value`.
    pub fn code_of(&self, value: MappingRef<'_>) -> Option<u32> {
        match self {
            CodeTable::Dense(entries) => entries
                .iter()
                .position(|entry| entry.as_ref().is_some_and(|mapping| mapping.borrowed() == value))
                .map(|code| code as u32),
            CodeTable::Sparse(map) => map.iter().find_map(|(range, target)| match (target, value) {
                (SparseTarget::Cid { offset }, MappingRef::Cid(cid)) => {
                    let code = cid.wrapping_sub(*offset);
                    range.contains(&code).then_some(code)
                }
                (SparseTarget::Bytes(bytes), MappingRef::Bytes(wanted)) if bytes.as_slice() == wanted => {
                    Some(*range.start())
                }
                _ => None,
            }),
            CodeTable::Identity => match value {
                MappingRef::Cid(cid) if cid <= IDENTITY_MAX => Some(cid),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_and_dense() -> [CodeTable; 2] {
        let dense = CodeTable::default();
        let mut sparse = CodeTable::default();
        sparse.make_sparse();
        [dense, sparse]
    }

    #[test]
    fn representations_agree() {
        for mut table in sparse_and_dense() {
            table.insert(3, Mapping::Bytes(vec![0x00, 0x41]));
            table.insert_cid_range(10, 20, 100);
            table.insert(15, Mapping::Cid(7));

            assert_eq!(table.get(3), Some(MappingRef::Bytes(&[0x00, 0x41])));
            assert_eq!(table.get(10), Some(MappingRef::Cid(100)));
            assert_eq!(table.get(14), Some(MappingRef::Cid(104)));
            assert_eq!(table.get(15), Some(MappingRef::Cid(7)));
            assert_eq!(table.get(16), Some(MappingRef::Cid(106)));
            assert_eq!(table.get(21), None);
            assert!(!table.contains(4));
            assert_eq!(table.len(), 12);
            assert_eq!(table.code_of(MappingRef::Cid(106)), Some(16));
            assert_eq!(table.code_of(MappingRef::Bytes(&[0x00, 0x41])), Some(3));
            assert_eq!(table.code_of(MappingRef::Cid(999)), None);
        }
    }

    #[test]
    fn large_codes_switch_to_sparse() {
        let mut table = CodeTable::default();
        table.insert(5, Mapping::Cid(1));
        table.insert(DENSE_LIMIT, Mapping::Cid(2));
        assert!(matches!(table, CodeTable::Dense(_)));

        table.insert(DENSE_LIMIT + 1, Mapping::Cid(3));
        assert!(matches!(table, CodeTable::Sparse(_)));
        assert_eq!(table.get(5), Some(MappingRef::Cid(1)));
        assert_eq!(table.get(DENSE_LIMIT), Some(MappingRef::Cid(2)));
        assert_eq!(table.get(DENSE_LIMIT + 1), Some(MappingRef::Cid(3)));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn huge_cid_range_stays_one_range() {
        let mut table = CodeTable::default();
        table.insert_cid_range(0, 0x00FF_FFFF, 0);
        match &table {
            CodeTable::Sparse(map) => assert_eq!(map.iter().count(), 1),
            _ => panic!("expected sparse table"),
        }
        assert_eq!(table.get(0x00AB_CDEF), Some(MappingRef::Cid(0x00AB_CDEF)));
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let mut base = CodeTable::default();
        base.insert_cid_range(0, 9, 100);

        let mut child = CodeTable::default();
        child.insert(4, Mapping::Cid(1));
        child.merge_missing_from(&base);

        assert_eq!(child.get(3), Some(MappingRef::Cid(103)));
        assert_eq!(child.get(4), Some(MappingRef::Cid(1)));
        assert_eq!(child.get(5), Some(MappingRef::Cid(105)));
        assert_eq!(child.len(), 10);
    }

    #[test]
    fn merge_from_sparse_fills_gaps_only() {
        let mut base = CodeTable::default();
        base.insert_cid_range(0, 0x20000, 0);

        let mut child = CodeTable::default();
        child.insert(0x10, Mapping::Bytes(vec![0x41]));
        child.merge_missing_from(&base);

        assert_eq!(child.get(0x0F), Some(MappingRef::Cid(0x0F)));
        assert_eq!(child.get(0x10), Some(MappingRef::Bytes(&[0x41])));
        assert_eq!(child.get(0x11), Some(MappingRef::Cid(0x11)));
        assert_eq!(child.get(0x20000), Some(MappingRef::Cid(0x20000)));
        assert_eq!(child.len(), 0x20001);
    }

    #[test]
    fn identity_table() {
        let table = CodeTable::Identity;
        assert_eq!(table.get(0x1234), Some(MappingRef::Cid(0x1234)));
        assert_eq!(table.get(0x10000), None);
        assert_eq!(table.len(), 0x10000);
        let dense = table.to_dense();
        assert_eq!(dense.len(), 0x10000);
        assert_eq!(dense[0xFFFF], Some(Mapping::Cid(0xFFFF)));
    }
}
