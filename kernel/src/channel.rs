//! Bounded IPC channels (spec §3 "Channel", §4.7).
//!
//! No analog exists in the teacher repo (a single bare-metal kernel has no
//! IPC surface), so this is grounded on the pack's broader convention of
//! fixed-capacity ring buffers behind plain indices — the same shape as this
//! crate's own `process.rs` table, generalized to a bounded FIFO queue of
//! byte messages instead of process slots.

use crate::error::ErrorKind;
use crate::types::{CHANNEL_QUEUE_CAPACITY, ChannelId, MAX_CHANNELS, MAX_MESSAGE_SIZE};

#[derive(Debug, Clone)]
struct Message {
    len: usize,
    bytes: [u8; MAX_MESSAGE_SIZE],
}

#[derive(Clone)]
struct ChannelSlot {
    allocated: bool,
    id: ChannelId,
    queue: [Option<Message>; CHANNEL_QUEUE_CAPACITY],
    head: usize,
    len: usize,
}

impl ChannelSlot {
    const fn empty() -> Self {
        const NONE_MSG: Option<Message> = None;
        Self {
            allocated: false,
            id: 0,
            queue: [NONE_MSG; CHANNEL_QUEUE_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(ErrorKind::InvalidArgument);
        }
        if self.len == CHANNEL_QUEUE_CAPACITY {
            // spec §4.5: a full queue is `would_block`, not `out_of_resources`
            // — the channel itself isn't exhausted, the caller should retry.
            return Err(ErrorKind::WouldBlock);
        }
        let mut bytes = [0u8; MAX_MESSAGE_SIZE];
        bytes[..data.len()].copy_from_slice(data);
        let tail = (self.head + self.len) % CHANNEL_QUEUE_CAPACITY;
        self.queue[tail] = Some(Message { len: data.len(), bytes });
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<Message> {
        if self.len == 0 {
            return None;
        }
        let msg = self.queue[self.head].take();
        self.head = (self.head + 1) % CHANNEL_QUEUE_CAPACITY;
        self.len -= 1;
        msg
    }
}

#[derive(Clone)]
pub struct ChannelTable {
    slots: [ChannelSlot; MAX_CHANNELS],
    next_id: ChannelId,
}

impl ChannelTable {
    pub fn new() -> Self {
        const EMPTY: ChannelSlot = ChannelSlot::empty();
        Self {
            slots: [EMPTY; MAX_CHANNELS],
            next_id: 1,
        }
    }

    fn index_of(&self, id: ChannelId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.allocated && slot.id == id)
    }

    pub fn create(&mut self) -> Result<ChannelId, ErrorKind> {
        let idx = self
            .slots
            .iter()
            .position(|slot| !slot.allocated)
            .ok_or(ErrorKind::OutOfResources)?;
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).ok_or(ErrorKind::OutOfResources)?;
        self.slots[idx] = ChannelSlot::empty();
        self.slots[idx].allocated = true;
        self.slots[idx].id = id;
        Ok(id)
    }

    pub fn send(&mut self, id: ChannelId, data: &[u8]) -> Result<(), ErrorKind> {
        let idx = self.index_of(id).ok_or(ErrorKind::NotFound)?;
        self.slots[idx].push(data)
    }

    /// Copy the oldest queued message into `dst`, returning its length.
    /// `would_block` if the channel is empty; `invalid_argument` if `dst` is
    /// smaller than the message.
    pub fn receive(&mut self, id: ChannelId, dst: &mut [u8]) -> Result<usize, ErrorKind> {
        let idx = self.index_of(id).ok_or(ErrorKind::NotFound)?;
        let slot = &mut self.slots[idx];
        if slot.len == 0 {
            return Err(ErrorKind::WouldBlock);
        }
        let head_idx = slot.head;
        let msg = slot.queue[head_idx].as_ref().ok_or(ErrorKind::WouldBlock)?;
        if msg.len > dst.len() {
            return Err(ErrorKind::InvalidArgument);
        }
        let len = msg.len;
        dst[..len].copy_from_slice(&msg.bytes[..len]);
        slot.pop();
        Ok(len)
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}
