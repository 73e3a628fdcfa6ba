//! NDR encoding trait

use crate::{NdrWriter, Result};

/// Trait for types that can be encoded to NDR format
///
/// Implementations write their fixed part through the writer and hand
/// pointer referents to [`NdrWriter::write_pointer`], which defers them.
/// The `'a` borrow lets the writer hold on to referents until the
/// enclosing construct flushes its deferred queue.
pub trait NdrEncode {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;
}

impl<T: NdrEncode + ?Sized> NdrEncode for Box<T> {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        (**self).ndr_write(w)
    }
}
