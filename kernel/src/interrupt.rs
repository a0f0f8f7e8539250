//! Interrupt controller: a pending-bit bitmap plus weak, overridable handler
//! slots (spec §3 "InterruptController", §4.10).
//!
//! The "weak function pointer, default no-op, optionally overridden"
//! pattern is the one the teacher's bare-metal `console.rs`/`boot.rs` use
//! for hardware IRQ vectors; here it is generalized into an owned table of
//! `Option<fn(u32)>` slots so the host kernel, not a linker, decides what is
//! wired up. `process_pending` dispatches every pending source unconditionally
//! (spec §4.10 has no separate enable/mask gate; a source with no registered
//! handler is just a silent no-op).

use crate::types::EXCEPTION_CODE_COUNT;

pub type InterruptHandler = fn(source: u32);

#[derive(Clone)]
pub struct InterruptController {
    pending: u32,
    handlers: [Option<InterruptHandler>; EXCEPTION_CODE_COUNT],
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            pending: 0,
            handlers: [None; EXCEPTION_CODE_COUNT],
        }
    }

    pub fn mark_pending(&mut self, source: u32) {
        if (source as usize) < EXCEPTION_CODE_COUNT {
            self.pending |= 1 << source;
        }
    }

    pub fn is_pending(&self, source: u32) -> bool {
        (source as usize) < EXCEPTION_CODE_COUNT && (self.pending & (1 << source)) != 0
    }

    pub fn set_handler(&mut self, source: u32, handler: InterruptHandler) {
        if let Some(slot) = self.handlers.get_mut(source as usize) {
            *slot = Some(handler);
        }
    }

    /// Invoke the handler for every pending source and clear its pending
    /// bit. A source with no registered handler is cleared silently (weak
    /// default: a no-op).
    pub fn process_pending(&mut self) {
        for source in 0..EXCEPTION_CODE_COUNT as u32 {
            let bit = 1 << source;
            if self.pending & bit == 0 {
                continue;
            }
            if let Some(handler) = self.handlers[source as usize] {
                handler(source);
            }
            self.pending &= !bit;
        }
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static LAST_SOURCE: AtomicU32 = AtomicU32::new(u32::MAX);

    fn record_handler(source: u32) {
        LAST_SOURCE.store(source, Ordering::SeqCst);
    }

    #[test]
    fn pending_bit_is_set_and_queryable() {
        let mut ctrl = InterruptController::new();
        assert!(!ctrl.is_pending(5));
        ctrl.mark_pending(5);
        assert!(ctrl.is_pending(5));
    }

    #[test]
    fn pending_source_with_handler_dispatches_and_clears() {
        let mut ctrl = InterruptController::new();
        ctrl.set_handler(9, record_handler);
        ctrl.mark_pending(9);
        ctrl.process_pending();
        assert_eq!(LAST_SOURCE.load(Ordering::SeqCst), 9);
        assert!(!ctrl.is_pending(9));
    }

    #[test]
    fn unhandled_pending_source_clears_silently() {
        let mut ctrl = InterruptController::new();
        ctrl.mark_pending(3);
        ctrl.process_pending();
        assert!(!ctrl.is_pending(3));
    }
}
