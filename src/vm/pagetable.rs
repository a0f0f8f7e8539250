//! Permission-only page table (spec §3 "PageTable", §4.2).
//!
//! No address translation: guest virtual addresses are host offsets into
//! `GuestMemory` directly. This table exists purely to answer "is this
//! range mapped, and with what permissions" — the flat equivalent of the
//! teacher's hardware page tables in `kernel/src/pagetable.rs`, minus the
//! multi-level walk those need and this design doesn't.

use kernel::env::Permissions;
use kernel::error::ErrorKind;
use kernel::types::{MAX_PAGE_TABLE_ENTRIES, PAGE_SIZE};

#[derive(Debug, Clone, Copy)]
struct Entry {
    base: u64,
    size: u64,
    perms: Permissions,
}

impl Entry {
    fn end(&self) -> u64 {
        self.base + self.size
    }

    fn overlaps(&self, base: u64, size: u64) -> bool {
        base < self.end() && self.base < base + size
    }
}

pub struct PageTable {
    entries: Vec<Entry>,
}

fn round_up_to_page(value: u64) -> u64 {
    (value + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE
}

impl PageTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert `[base, base + size)`, page-rounded. A range identical in
    /// bounds and flags to an existing entry is a no-op (idempotent remap);
    /// any other overlap is an error. `base` must itself be page-aligned
    /// (spec §4.2: `map` "fails `invalid_argument` on unaligned/out-of-range
    /// or conflict").
    pub fn map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), ErrorKind> {
        if base % PAGE_SIZE != 0 {
            return Err(ErrorKind::InvalidArgument);
        }
        if self.entries.len() >= MAX_PAGE_TABLE_ENTRIES {
            return Err(ErrorKind::OutOfResources);
        }
        let size = round_up_to_page(size.max(1));

        for existing in &self.entries {
            if existing.base == base && existing.size == size && existing.perms == perms {
                return Ok(());
            }
            if existing.overlaps(base, size) {
                return Err(ErrorKind::InvalidArgument);
            }
        }

        self.entries.push(Entry { base, size, perms });
        Ok(())
    }

    /// Remove the entry covering exactly `[base, base + size)` (page
    /// rounded). Idempotent: unmapping a range with no matching entry is
    /// not an error.
    pub fn unmap(&mut self, base: u64, size: u64) {
        let size = round_up_to_page(size.max(1));
        self.entries.retain(|e| !(e.base == base && e.size == size));
    }

    /// The entry covering `addr`, if any (spec §4.2's `lookup`).
    pub fn lookup(&self, addr: u64) -> Option<(u64, u64, Permissions)> {
        self.entries
            .iter()
            .find(|e| e.base <= addr && addr < e.end())
            .map(|e| (e.base, e.size, e.perms))
    }

    /// The permission bits covering every byte of `[addr, addr + len)`, or
    /// `None` if any byte of the range is unmapped.
    pub fn permissions_for(&self, addr: u64, len: u64) -> Option<Permissions> {
        if len == 0 {
            return self
                .entries
                .iter()
                .find(|e| e.base <= addr && addr < e.end())
                .map(|e| e.perms);
        }
        let end = addr.checked_add(len)?;
        let mut cursor = addr;
        let mut perms: Option<Permissions> = None;
        while cursor < end {
            let entry = self
                .entries
                .iter()
                .find(|e| e.base <= cursor && cursor < e.end())?;
            perms = Some(match perms {
                Some(acc) => acc & entry.perms,
                None => entry.perms,
            });
            cursor = entry.end().min(end);
        }
        perms
    }

    pub fn is_permitted(&self, addr: u64, len: u64, required: Permissions) -> bool {
        self.permissions_for(addr, len)
            .is_some_and(|perms| perms.contains(required))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_range_reports_its_permissions() {
        let mut table = PageTable::new();
        table.map(0x1000, 0x1000, Permissions::READ | Permissions::WRITE).unwrap();
        assert!(table.is_permitted(0x1000, 16, Permissions::READ));
        assert!(!table.is_permitted(0x1000, 16, Permissions::EXECUTE));
    }

    #[test]
    fn unmapped_range_has_no_permissions() {
        let table = PageTable::new();
        assert!(!table.is_permitted(0x1000, 16, Permissions::READ));
    }

    #[test]
    fn overlapping_map_with_different_flags_is_an_error() {
        let mut table = PageTable::new();
        table.map(0x1000, 0x1000, Permissions::READ).unwrap();
        let result = table.map(0x1800, 0x1000, Permissions::WRITE);
        assert_eq!(result, Err(ErrorKind::InvalidArgument));
    }

    #[test]
    fn identical_remap_is_idempotent() {
        let mut table = PageTable::new();
        table.map(0x1000, 0x1000, Permissions::READ).unwrap();
        assert!(table.map(0x1000, 0x1000, Permissions::READ).is_ok());
        assert_eq!(table.entry_count(), 1);
    }

    #[test]
    fn unmap_then_remap_returns_table_to_prior_contents() {
        let mut table = PageTable::new();
        table.map(0x1000, 0x1000, Permissions::READ | Permissions::WRITE).unwrap();
        let before = table.entry_count();

        table.unmap(0x1000, 0x1000);
        assert_eq!(table.entry_count(), 0);
        assert!(!table.is_permitted(0x1000, 16, Permissions::READ));

        table.map(0x1000, 0x1000, Permissions::READ | Permissions::WRITE).unwrap();
        assert_eq!(table.entry_count(), before);
        assert!(table.is_permitted(0x1000, 16, Permissions::READ));
    }

    #[test]
    fn unmap_of_unmapped_range_is_a_no_op() {
        let mut table = PageTable::new();
        table.unmap(0x5000, 0x1000);
        assert_eq!(table.entry_count(), 0);
    }

    #[test]
    fn lookup_returns_the_covering_entry() {
        let mut table = PageTable::new();
        table.map(0x2000, 0x1000, Permissions::EXECUTE).unwrap();
        let (base, size, perms) = table.lookup(0x2010).unwrap();
        assert_eq!(base, 0x2000);
        assert_eq!(size, 0x1000);
        assert_eq!(perms, Permissions::EXECUTE);
        assert!(table.lookup(0x3100).is_none());
    }

    #[test]
    fn table_rejects_mappings_past_capacity() {
        let mut table = PageTable::new();
        for i in 0..MAX_PAGE_TABLE_ENTRIES {
            table.map((i as u64) * PAGE_SIZE * 2, 1, Permissions::READ).unwrap();
        }
        let result = table.map((MAX_PAGE_TABLE_ENTRIES as u64) * PAGE_SIZE * 2, 1, Permissions::READ);
        assert_eq!(result, Err(ErrorKind::OutOfResources));
    }

    #[test]
    fn unaligned_base_is_rejected() {
        let mut table = PageTable::new();
        let result = table.map(0x1001, 0x1000, Permissions::READ);
        assert_eq!(result, Err(ErrorKind::InvalidArgument));
    }

    proptest::proptest! {
        /// `map` followed by `unmap` of the same range returns the table to
        /// its prior contents (spec §8's quantified round-trip invariant).
        #[test]
        fn map_then_unmap_restores_prior_entry_count(
            base_page in 0u64..64,
            pages in 1u64..16,
        ) {
            let base = base_page * PAGE_SIZE;
            let size = pages * PAGE_SIZE;
            let mut table = PageTable::new();
            let before = table.entry_count();

            table.map(base, size, Permissions::READ).unwrap();
            table.unmap(base, size);

            prop_assert_eq!(table.entry_count(), before);
            prop_assert!(!table.is_permitted(base, 1, Permissions::READ));
        }
    }
}
