//! Flat guest memory (spec §3 "GuestMemory", §4.3).
//!
//! A single contiguous byte buffer addressed directly by guest virtual
//! address (no translation layer, per the page table's design). Every
//! accessor takes the `PageTable` explicitly rather than owning one, so the
//! two stay independently testable — mirroring how the teacher's `vm/mod.rs`
//! keeps its `GuestAddressSpace` and vCPU state as separate fields rather
//! than one embedding the other.

use kernel::env::Permissions;

use super::pagetable::PageTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault {
    OutOfBounds,
    Unaligned,
    PermissionDenied,
}

pub struct GuestMemory {
    bytes: Vec<u8>,
}

impl GuestMemory {
    pub fn new(size: usize) -> Self {
        Self { bytes: vec![0u8; size] }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn check_range(&self, addr: u64, len: usize, align: usize) -> Result<usize, MemoryFault> {
        if align > 1 && addr as usize % align != 0 {
            return Err(MemoryFault::Unaligned);
        }
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(MemoryFault::OutOfBounds)?;
        if end > self.bytes.len() {
            return Err(MemoryFault::OutOfBounds);
        }
        Ok(start)
    }

    fn check_permission(
        &self,
        table: &PageTable,
        addr: u64,
        len: usize,
        required: Permissions,
    ) -> Result<(), MemoryFault> {
        if table.is_permitted(addr, len as u64, required) {
            Ok(())
        } else {
            Err(MemoryFault::PermissionDenied)
        }
    }

    /// Fetch a 4-byte instruction word. Checked for execute permission and
    /// 4-byte alignment (spec: `instruction_address_misaligned` if `pc & 3
    /// != 0`).
    pub fn fetch_instruction(&self, table: &PageTable, addr: u64) -> Result<u32, MemoryFault> {
        let start = self.check_range(addr, 4, 4)?;
        self.check_permission(table, addr, 4, Permissions::EXECUTE)?;
        Ok(u32::from_le_bytes(self.bytes[start..start + 4].try_into().unwrap()))
    }

    pub fn load8(&self, table: &PageTable, addr: u64) -> Result<u8, MemoryFault> {
        let start = self.check_range(addr, 1, 1)?;
        self.check_permission(table, addr, 1, Permissions::READ)?;
        Ok(self.bytes[start])
    }

    pub fn load16(&self, table: &PageTable, addr: u64) -> Result<u16, MemoryFault> {
        let start = self.check_range(addr, 2, 2)?;
        self.check_permission(table, addr, 2, Permissions::READ)?;
        Ok(u16::from_le_bytes(self.bytes[start..start + 2].try_into().unwrap()))
    }

    pub fn load32(&self, table: &PageTable, addr: u64) -> Result<u32, MemoryFault> {
        let start = self.check_range(addr, 4, 4)?;
        self.check_permission(table, addr, 4, Permissions::READ)?;
        Ok(u32::from_le_bytes(self.bytes[start..start + 4].try_into().unwrap()))
    }

    pub fn load64(&self, table: &PageTable, addr: u64) -> Result<u64, MemoryFault> {
        let start = self.check_range(addr, 8, 8)?;
        self.check_permission(table, addr, 8, Permissions::READ)?;
        Ok(u64::from_le_bytes(self.bytes[start..start + 8].try_into().unwrap()))
    }

    pub fn store8(&mut self, table: &PageTable, addr: u64, value: u8) -> Result<(), MemoryFault> {
        let start = self.check_range(addr, 1, 1)?;
        self.check_permission(table, addr, 1, Permissions::WRITE)?;
        self.bytes[start] = value;
        Ok(())
    }

    pub fn store16(&mut self, table: &PageTable, addr: u64, value: u16) -> Result<(), MemoryFault> {
        let start = self.check_range(addr, 2, 2)?;
        self.check_permission(table, addr, 2, Permissions::WRITE)?;
        self.bytes[start..start + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn store32(&mut self, table: &PageTable, addr: u64, value: u32) -> Result<(), MemoryFault> {
        let start = self.check_range(addr, 4, 4)?;
        self.check_permission(table, addr, 4, Permissions::WRITE)?;
        self.bytes[start..start + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn store64(&mut self, table: &PageTable, addr: u64, value: u64) -> Result<(), MemoryFault> {
        let start = self.check_range(addr, 8, 8)?;
        self.check_permission(table, addr, 8, Permissions::WRITE)?;
        self.bytes[start..start + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Raw copy out, bypassing permission checks — used by the boot loader
    /// and snapshot machinery, which act on the whole image rather than a
    /// guest-initiated access.
    pub fn read_raw(&self, addr: u64, dst: &mut [u8]) -> bool {
        let start = addr as usize;
        match self.bytes.get(start..start + dst.len()) {
            Some(src) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    pub fn write_raw(&mut self, addr: u64, src: &[u8]) -> bool {
        let start = addr as usize;
        match self.bytes.get_mut(start..start + src.len()) {
            Some(dst) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn restore(&mut self, data: &[u8]) {
        self.bytes.copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_round_trips() {
        let mut mem = GuestMemory::new(0x10000);
        let mut table = PageTable::new();
        table.map(0, 0x10000, Permissions::READ | Permissions::WRITE).unwrap();
        mem.store32(&table, 0x100, 0xdead_beef).unwrap();
        assert_eq!(mem.load32(&table, 0x100).unwrap(), 0xdead_beef);
    }

    #[test]
    fn unmapped_access_is_permission_denied() {
        let mem = GuestMemory::new(0x10000);
        let table = PageTable::new();
        assert_eq!(mem.load8(&table, 0x100), Err(MemoryFault::PermissionDenied));
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let mem = GuestMemory::new(0x1000);
        let mut table = PageTable::new();
        table.map(0, 0x1000, Permissions::READ).unwrap();
        assert_eq!(mem.load8(&table, 0x1000), Err(MemoryFault::OutOfBounds));
    }

    #[test]
    fn misaligned_load_is_rejected() {
        let mem = GuestMemory::new(0x1000);
        let mut table = PageTable::new();
        table.map(0, 0x1000, Permissions::READ).unwrap();
        assert_eq!(mem.load32(&table, 0x1), Err(MemoryFault::Unaligned));
    }

    #[test]
    fn fetch_instruction_requires_execute_permission() {
        let mut mem = GuestMemory::new(0x1000);
        let mut table = PageTable::new();
        table.map(0, 0x1000, Permissions::READ).unwrap();
        mem.write_raw(0, &[0x93, 0x00, 0xa0, 0x02]);
        assert_eq!(mem.fetch_instruction(&table, 0), Err(MemoryFault::PermissionDenied));

        table.map(0x2000, 0x1000, Permissions::EXECUTE).unwrap();
        mem.write_raw(0x2000, &[0x93, 0x00, 0xa0, 0x02]);
        assert!(mem.fetch_instruction(&table, 0x2000).is_ok());
    }
}
