//! The operation contract shared by generated stubs
//!
//! One `Operation` value is one in-flight call: it holds the request
//! fields, receives the response fields and exposes the response status
//! word. Clients marshal the request and unmarshal the response; servers
//! do the opposite with the same value.

use crate::error::Result;
use bytes::Bytes;
use midl_ndr::{NdrContext, NdrReader, NdrWriter};
use tracing::trace;

/// A remote method's request/response pair
pub trait Operation: Send {
    /// Method index within its interface
    fn opnum(&self) -> u16;

    /// Display name, `/Interface/vMajor/Method`
    fn name(&self) -> &'static str;

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()>;

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()>;

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()>;

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()>;

    /// Status word terminating the response
    fn status(&self) -> u32 {
        0
    }
}

pub fn encode_request<O: Operation + ?Sized>(op: &O, ctx: NdrContext) -> Result<Bytes> {
    let mut w = NdrWriter::with_context(ctx);
    op.marshal_request(&mut w)?;
    Ok(w.finish()?)
}

pub fn decode_request<O: Operation + ?Sized>(
    op: &mut O,
    stub: Bytes,
    ctx: NdrContext,
) -> Result<()> {
    let name = op.name();
    let mut r = NdrReader::with_context(stub, ctx);
    op.unmarshal_request(&mut r)?;
    let unread = r.finish()?;
    if unread > 0 {
        trace!(op = name, unread, "request stub has trailing bytes");
    }
    Ok(())
}

pub fn encode_response<O: Operation + ?Sized>(op: &O, ctx: NdrContext) -> Result<Bytes> {
    let mut w = NdrWriter::with_context(ctx);
    op.marshal_response(&mut w)?;
    Ok(w.finish()?)
}

pub fn decode_response<O: Operation + ?Sized>(
    op: &mut O,
    stub: Bytes,
    ctx: NdrContext,
) -> Result<()> {
    let name = op.name();
    let mut r = NdrReader::with_context(stub, ctx);
    op.unmarshal_response(&mut r)?;
    let unread = r.finish()?;
    if unread > 0 {
        trace!(op = name, unread, "response stub has trailing bytes");
    }
    Ok(())
}
