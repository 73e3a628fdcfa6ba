//! NDR input cursor
//!
//! Mirror image of [`NdrWriter`](crate::NdrWriter): the reader tracks the
//! stream position for alignment, queues pointer referents as consumers
//! that fill their output slot later, and bounds every count it sees
//! against the bytes left in the stream.

use crate::error::{MAX_NDR_ALLOCATION_SIZE, MAX_NDR_ARRAY_ELEMENTS, MAX_NDR_NESTING_DEPTH};
use crate::pointers::DeferredStack;
use crate::{NdrContext, NdrDecode, NdrError, NdrScalar, PointerKind, Result};
use bytes::Bytes;
use std::collections::HashSet;

type Consumer<'a> = Box<dyn FnOnce(&mut NdrReader<'a>) -> Result<()> + 'a>;

/// Deserializes one NDR stream
pub struct NdrReader<'a> {
    ctx: NdrContext,
    data: Bytes,
    pos: usize,
    deferred: DeferredStack<Consumer<'a>>,
    /// Full-pointer referent ids already seen in this stream
    full_ids: HashSet<u32>,
}

impl<'a> NdrReader<'a> {
    pub fn new(data: Bytes) -> Self {
        Self::with_context(data, NdrContext::default())
    }

    pub fn with_context(data: Bytes, ctx: NdrContext) -> Self {
        Self {
            ctx,
            data,
            pos: 0,
            deferred: DeferredStack::new(),
            full_ids: HashSet::new(),
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Referents queued and not yet read
    pub fn deferred_len(&self) -> usize {
        self.deferred.pending()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(NdrError::BufferUnderflow {
                needed: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }

    /// Skip padding up to a multiple of `alignment`
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.pos, alignment);
        self.need(padding)?;
        self.pos += padding;
        Ok(())
    }

    /// Read a primitive, aligned to its size
    pub fn read_data<T: NdrScalar>(&mut self) -> Result<T> {
        let padding = NdrContext::align_padding(self.pos, T::SIZE);
        self.need(padding + T::SIZE)?;
        self.pos += padding;
        let mut slice = &self.data[self.pos..self.pos + T::SIZE];
        let value = T::get(&self.ctx, &mut slice);
        self.pos += T::SIZE;
        Ok(value)
    }

    /// Read a conformance, offset or length field
    pub fn read_size(&mut self) -> Result<u32> {
        self.read_data()
    }

    /// Read a `[v1_enum]` value (32 bits)
    pub fn read_enum(&mut self) -> Result<u32> {
        self.read_data()
    }

    /// Read a plain enum value (16 bits on the wire)
    pub fn read_enum16(&mut self) -> Result<u16> {
        self.read_data()
    }

    /// Raw bytes with no alignment
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.need(n)?;
        let out = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(out)
    }

    /// Validate an element count read from the wire
    ///
    /// Rejects counts whose elements could not possibly fit in what is left
    /// of the stream, as well as counts over the decoder's hard limits.
    pub fn check_count(&self, count: u32, element_size: usize) -> Result<usize> {
        let count = count as usize;
        if count > MAX_NDR_ARRAY_ELEMENTS {
            return Err(NdrError::AllocationLimitExceeded {
                requested: count,
                limit: MAX_NDR_ARRAY_ELEMENTS,
            });
        }
        let bytes = count
            .checked_mul(element_size.max(1))
            .ok_or(NdrError::IntegerOverflow)?;
        if bytes > MAX_NDR_ALLOCATION_SIZE {
            return Err(NdrError::AllocationLimitExceeded {
                requested: bytes,
                limit: MAX_NDR_ALLOCATION_SIZE,
            });
        }
        self.need(bytes)?;
        Ok(count)
    }

    /// Decode a constructed value in place
    pub fn read_value<T: NdrDecode>(&mut self, slot: &'a mut T) -> Result<()> {
        slot.ndr_read(self)
    }

    /// Read a pointer of the given kind into `slot`
    ///
    /// `Ref` pointers decode the referent inline. For the other kinds the
    /// referent id is read now and, when non-null, the referent is queued
    /// and decoded into the slot by the next `read_deferred` on this level.
    pub fn read_pointer<T: NdrDecode>(
        &mut self,
        kind: PointerKind,
        slot: &'a mut Option<T>,
    ) -> Result<()> {
        if kind == PointerKind::Ref {
            return slot.insert(T::default()).ndr_read(self);
        }

        let id: u32 = self.read_data()?;
        if id == 0 {
            if !kind.is_nullable() {
                return Err(NdrError::NullRefPointer);
            }
            *slot = None;
            return Ok(());
        }
        if kind == PointerKind::Full && !self.full_ids.insert(id) {
            return Err(NdrError::AliasedPointer(id));
        }

        let target = slot.insert(T::default());
        self.deferred
            .push(Box::new(move |r: &mut NdrReader<'a>| target.ndr_read(r)));
        Ok(())
    }

    /// Read every referent queued on the current level, in queue order
    pub fn read_deferred(&mut self) -> Result<()> {
        let queue = self.deferred.take_current();
        for consumer in queue {
            self.deferred.enter(MAX_NDR_NESTING_DEPTH)?;
            let result = consumer(self).and_then(|()| self.read_deferred());
            self.deferred.leave();
            result?;
        }
        Ok(())
    }

    /// Read what is still queued; returns the number of unread bytes
    pub fn finish(mut self) -> Result<usize> {
        self.read_deferred()?;
        Ok(self.remaining())
    }
}
