//! NDR pointer flavours and the deferred-referent queue
//!
//! Unique and full pointers are written as a 4-byte referent id in the
//! fixed part of their enclosing construct; the referent itself is
//! queued and emitted when the enclosing construct calls
//! `write_deferred`. A referent that contains further pointers gets its
//! own queue, flushed before the next queued sibling, which yields the
//! level-by-level layout NDR requires. The reader mirrors the writer.

use crate::{NdrError, Result};
use std::collections::VecDeque;

/// Referent id given to the first non-null pointer of a message
pub const FIRST_REFERENT_ID: u32 = 0x0002_0000;

/// Distance between successive referent ids
pub const REFERENT_ID_STEP: u32 = 4;

/// Pointer attribute of a field or parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// `[ref]` at parameter level: never null, referent inline, no id
    Ref,
    /// `[ref]` embedded in a struct or array: non-zero id, referent deferred
    EmbeddedRef,
    /// `[unique]`: nullable, referent deferred
    Unique,
    /// `[ptr]`: nullable, referent deferred
    Full,
}

impl PointerKind {
    /// Whether the pointer is represented by a referent id on the wire
    pub fn has_referent_id(self) -> bool {
        !matches!(self, PointerKind::Ref)
    }

    /// Whether a zero referent id is legal
    pub fn is_nullable(self) -> bool {
        matches!(self, PointerKind::Unique | PointerKind::Full)
    }
}

/// Stack of FIFO queues, one per nesting level of deferred referents
pub(crate) struct DeferredStack<A> {
    levels: Vec<VecDeque<A>>,
}

impl<A> DeferredStack<A> {
    pub(crate) fn new() -> Self {
        Self {
            levels: vec![VecDeque::new()],
        }
    }

    /// Queue an action on the innermost level
    pub(crate) fn push(&mut self, action: A) {
        if let Some(level) = self.levels.last_mut() {
            level.push_back(action);
        }
    }

    /// Take everything queued on the innermost level
    pub(crate) fn take_current(&mut self) -> VecDeque<A> {
        self.levels.last_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Open a level for a referent's own referents
    ///
    /// Fails once `limit` levels are open below the outermost one.
    pub(crate) fn enter(&mut self, limit: usize) -> Result<()> {
        if self.levels.len() > limit {
            return Err(NdrError::DepthExceeded { limit });
        }
        self.levels.push(VecDeque::new());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        if self.levels.len() > 1 {
            self.levels.pop();
        }
    }

    /// Actions queued on any level
    pub(crate) fn pending(&self) -> usize {
        self.levels.iter().map(VecDeque::len).sum()
    }
}

/// Monotonic referent id allocator
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReferentIds {
    next: u32,
}

impl ReferentIds {
    pub(crate) fn new() -> Self {
        Self {
            next: FIRST_REFERENT_ID,
        }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub(crate) fn peek(&self) -> u32 {
        self.next
    }

    pub(crate) fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(REFERENT_ID_STEP);
        if self.next == 0 {
            self.next = REFERENT_ID_STEP;
        }
        id
    }
}
