//! Flat in-memory file and directory storage (spec §3 "File", "Directory",
//! §4.8).
//!
//! The teacher has no filesystem of its own; this follows the same
//! fixed-slots-plus-linear-scan shape as `process.rs` and `channel.rs`,
//! applied to a two-level name hierarchy (directories contain files and
//! other directories by ID, not by nested structs, matching the "bounded
//! arrays with explicit live counts" redesign note in spec §9).

use crate::error::ErrorKind;
use crate::types::{
    FileId, MAX_DIRECTORIES, MAX_DIR_CHILDREN, MAX_FILES, MAX_FILE_SIZE, MAX_NAME_LEN,
};

pub type DirectoryId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Clone, Copy)]
struct Name {
    len: usize,
    bytes: [u8; MAX_NAME_LEN],
}

impl Name {
    fn new(name: &str) -> Result<Self, ErrorKind> {
        let bytes_in = name.as_bytes();
        if bytes_in.is_empty() || bytes_in.len() > MAX_NAME_LEN {
            return Err(ErrorKind::InvalidArgument);
        }
        let mut bytes = [0u8; MAX_NAME_LEN];
        bytes[..bytes_in.len()].copy_from_slice(bytes_in);
        Ok(Self { len: bytes_in.len(), bytes })
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

#[derive(Clone)]
struct FileSlot {
    allocated: bool,
    id: FileId,
    name: Name,
    parent: DirectoryId,
    data: [u8; MAX_FILE_SIZE],
    len: usize,
}

impl FileSlot {
    const fn empty() -> Self {
        Self {
            allocated: false,
            id: 0,
            name: Name { len: 0, bytes: [0; MAX_NAME_LEN] },
            parent: 0,
            data: [0; MAX_FILE_SIZE],
            len: 0,
        }
    }
}

#[derive(Clone)]
struct DirectorySlot {
    allocated: bool,
    id: DirectoryId,
    name: Name,
    parent: Option<DirectoryId>,
    children: [Option<(EntryKind, u32)>; MAX_DIR_CHILDREN],
    child_count: usize,
}

impl DirectorySlot {
    const fn empty() -> Self {
        const NONE: Option<(EntryKind, u32)> = None;
        Self {
            allocated: false,
            id: 0,
            name: Name { len: 0, bytes: [0; MAX_NAME_LEN] },
            parent: None,
            children: [NONE; MAX_DIR_CHILDREN],
            child_count: 0,
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    files: [FileSlot; MAX_FILES],
    directories: [DirectorySlot; MAX_DIRECTORIES],
    next_file_id: FileId,
    next_dir_id: DirectoryId,
}

impl Storage {
    pub fn new() -> Self {
        const FILE_EMPTY: FileSlot = FileSlot::empty();
        const DIR_EMPTY: DirectorySlot = DirectorySlot::empty();
        let mut storage = Self {
            files: [FILE_EMPTY; MAX_FILES],
            directories: [DIR_EMPTY; MAX_DIRECTORIES],
            next_file_id: 1,
            next_dir_id: 1,
        };
        // root directory, id 0, parent-less
        storage.directories[0] = DirectorySlot {
            allocated: true,
            id: 0,
            name: Name::new("/").unwrap(),
            parent: None,
            ..DirectorySlot::empty()
        };
        storage.next_dir_id = 1;
        storage
    }

    pub const ROOT: DirectoryId = 0;

    fn dir_index(&self, id: DirectoryId) -> Option<usize> {
        self.directories
            .iter()
            .position(|dir| dir.allocated && dir.id == id)
    }

    fn file_index(&self, id: FileId) -> Option<usize> {
        self.files.iter().position(|f| f.allocated && f.id == id)
    }

    pub fn create_directory(&mut self, parent: DirectoryId, name: &str) -> Result<DirectoryId, ErrorKind> {
        let parent_idx = self.dir_index(parent).ok_or(ErrorKind::NotFound)?;
        if self.directories[parent_idx].child_count >= MAX_DIR_CHILDREN {
            return Err(ErrorKind::OutOfResources);
        }
        let slot_idx = self
            .directories
            .iter()
            .position(|d| !d.allocated)
            .ok_or(ErrorKind::OutOfResources)?;

        let id = self.next_dir_id;
        self.next_dir_id = self.next_dir_id.checked_add(1).ok_or(ErrorKind::OutOfResources)?;

        self.directories[slot_idx] = DirectorySlot {
            allocated: true,
            id,
            name: Name::new(name)?,
            parent: Some(parent),
            ..DirectorySlot::empty()
        };

        let child_slot = self.directories[parent_idx].child_count;
        self.directories[parent_idx].children[child_slot] = Some((EntryKind::Directory, id));
        self.directories[parent_idx].child_count += 1;

        Ok(id)
    }

    pub fn create_file(&mut self, parent: DirectoryId, name: &str) -> Result<FileId, ErrorKind> {
        let parent_idx = self.dir_index(parent).ok_or(ErrorKind::NotFound)?;
        if self.directories[parent_idx].child_count >= MAX_DIR_CHILDREN {
            return Err(ErrorKind::OutOfResources);
        }
        let slot_idx = self.files.iter().position(|f| !f.allocated).ok_or(ErrorKind::OutOfResources)?;

        let id = self.next_file_id;
        self.next_file_id = self.next_file_id.checked_add(1).ok_or(ErrorKind::OutOfResources)?;

        self.files[slot_idx] = FileSlot {
            allocated: true,
            id,
            name: Name::new(name)?,
            parent,
            data: [0; MAX_FILE_SIZE],
            len: 0,
        };

        let child_slot = self.directories[parent_idx].child_count;
        self.directories[parent_idx].children[child_slot] = Some((EntryKind::File, id));
        self.directories[parent_idx].child_count += 1;

        Ok(id)
    }

    pub fn find_file(&self, parent: DirectoryId, name: &str) -> Option<FileId> {
        let parent_idx = self.dir_index(parent)?;
        self.directories[parent_idx]
            .children
            .iter()
            .flatten()
            .find_map(|&(kind, id)| {
                if kind != EntryKind::File {
                    return None;
                }
                let idx = self.file_index(id)?;
                (self.files[idx].name.as_str() == name).then_some(id)
            })
    }

    /// Replace the file's entire contents with `data`, silently truncating
    /// to `MAX_FILE_SIZE` if it overruns (spec §4.5: "`write(bytes)` replaces
    /// contents (truncating to `MAX_FILE_SIZE` if necessary) and updates
    /// size"). Returns the number of bytes actually stored.
    pub fn write(&mut self, id: FileId, data: &[u8]) -> Result<usize, ErrorKind> {
        let idx = self.file_index(id).ok_or(ErrorKind::NotFound)?;
        let len = data.len().min(MAX_FILE_SIZE);
        self.files[idx].data[..len].copy_from_slice(&data[..len]);
        self.files[idx].len = len;
        Ok(len)
    }

    /// Copy up to `dst.len()` bytes from the start of the file's contents.
    pub fn read(&self, id: FileId, dst: &mut [u8]) -> Result<usize, ErrorKind> {
        let idx = self.file_index(id).ok_or(ErrorKind::NotFound)?;
        let file = &self.files[idx];
        let n = file.len.min(dst.len());
        dst[..n].copy_from_slice(&file.data[..n]);
        Ok(n)
    }

    pub fn delete_file(&mut self, parent: DirectoryId, id: FileId) -> Result<(), ErrorKind> {
        let idx = self.file_index(id).ok_or(ErrorKind::NotFound)?;
        self.files[idx].allocated = false;
        if let Some(parent_idx) = self.dir_index(parent) {
            if let Some(slot) = self.directories[parent_idx]
                .children
                .iter_mut()
                .find(|c| matches!(c, Some((EntryKind::File, fid)) if *fid == id))
            {
                *slot = None;
            }
        }
        Ok(())
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
