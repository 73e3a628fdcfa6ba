//! NDR output cursor
//!
//! The writer owns the output buffer, the alignment state, the referent id
//! counter and the deferred-referent queues for a single message body.

use crate::error::MAX_NDR_NESTING_DEPTH;
use crate::pointers::{DeferredStack, ReferentIds};
use crate::{NdrContext, NdrEncode, NdrError, NdrScalar, PointerKind, Result};
use bytes::{BufMut, Bytes, BytesMut};

type Deferred<'a> = Box<dyn FnOnce(&mut NdrWriter<'a>) -> Result<()> + 'a>;

/// Serializes one NDR stream
pub struct NdrWriter<'a> {
    ctx: NdrContext,
    buf: BytesMut,
    /// Stream offset of `buf[0]`
    base: usize,
    ids: ReferentIds,
    deferred: DeferredStack<Deferred<'a>>,
}

impl<'a> NdrWriter<'a> {
    pub fn new() -> Self {
        Self::with_context(NdrContext::default())
    }

    pub fn with_context(ctx: NdrContext) -> Self {
        Self::scratch(ctx, 0, ReferentIds::new())
    }

    fn scratch(ctx: NdrContext, base: usize, ids: ReferentIds) -> Self {
        Self {
            ctx,
            buf: BytesMut::with_capacity(256),
            base,
            ids,
            deferred: DeferredStack::new(),
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Offset from the start of the stream
    pub fn position(&self) -> usize {
        self.base + self.buf.len()
    }

    /// Referent id the next non-null pointer will receive
    pub fn next_referent_id(&self) -> u32 {
        self.ids.peek()
    }

    /// Referents queued and not yet written
    pub fn deferred_len(&self) -> usize {
        self.deferred.pending()
    }

    /// Zero-pad to a multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let padding = NdrContext::align_padding(self.position(), alignment);
        self.buf.put_bytes(0, padding);
    }

    /// Write a primitive, aligned to its size
    pub fn write_data<T: NdrScalar>(&mut self, value: T) {
        self.align(T::SIZE);
        value.put(&self.ctx, &mut self.buf);
    }

    /// Write a conformance, offset or length field
    pub fn write_size(&mut self, count: usize) -> Result<()> {
        let count = u32::try_from(count).map_err(|_| NdrError::IntegerOverflow)?;
        self.write_data(count);
        Ok(())
    }

    /// Write a `[v1_enum]` value (32 bits)
    pub fn write_enum(&mut self, value: u32) {
        self.write_data(value);
    }

    /// Write a plain enum value (16 bits on the wire)
    pub fn write_enum16(&mut self, value: u16) {
        self.write_data(value);
    }

    /// Raw bytes with no alignment
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Encode a constructed value in place
    pub fn write_value<T: NdrEncode + ?Sized>(&mut self, value: &'a T) -> Result<()> {
        value.ndr_write(self)
    }

    /// Write a pointer of the given kind
    ///
    /// `Ref` pointers encode the referent inline. The other kinds write a
    /// referent id (zero for null) and queue the referent on the current
    /// deferral level.
    pub fn write_pointer<T: NdrEncode + ?Sized>(
        &mut self,
        kind: PointerKind,
        value: Option<&'a T>,
    ) -> Result<()> {
        match (kind, value) {
            (PointerKind::Ref, Some(v)) => v.ndr_write(self),
            (PointerKind::Ref | PointerKind::EmbeddedRef, None) => Err(NdrError::NullRefPointer),
            (_, None) => {
                self.write_data(0u32);
                Ok(())
            }
            (_, Some(v)) => {
                let id = self.ids.allocate();
                self.write_data(id);
                self.deferred.push(Box::new(move |w: &mut NdrWriter<'a>| v.ndr_write(w)));
                Ok(())
            }
        }
    }

    /// Emit every referent queued on the current level, in queue order.
    ///
    /// Each referent gets a fresh level, flushed before its next sibling,
    /// so referents of referents land after their parent and before the
    /// parent's siblings.
    pub fn write_deferred(&mut self) -> Result<()> {
        let queue = self.deferred.take_current();
        for action in queue {
            self.deferred.enter(MAX_NDR_NESTING_DEPTH)?;
            let result = action(self).and_then(|()| self.write_deferred());
            self.deferred.leave();
            result?;
        }
        Ok(())
    }

    /// Write `count` default values of `T`
    ///
    /// Used to fill array slots the caller asked for but did not supply.
    pub(crate) fn write_defaults<T: NdrEncode + Default>(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let filler = T::default();
        let mut scratch = NdrWriter::scratch(self.ctx, self.position(), self.ids);
        for _ in 0..count {
            filler.ndr_write(&mut scratch)?;
        }
        scratch.write_deferred()?;
        self.ids = scratch.ids;
        self.buf.extend_from_slice(&scratch.buf);
        Ok(())
    }

    /// Flush what is still queued and return the stream
    pub fn finish(mut self) -> Result<Bytes> {
        self.write_deferred()?;
        Ok(self.buf.freeze())
    }
}

impl Default for NdrWriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}
