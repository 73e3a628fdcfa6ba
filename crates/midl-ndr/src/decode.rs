//! NDR decoding trait

use crate::{NdrReader, Result};

/// Trait for types that can be decoded from NDR format
///
/// Decoding fills `self` in place. A value starts out as `Default` and
/// the reader may finish populating its pointer fields later, when the
/// enclosing construct reads its deferred referents.
pub trait NdrDecode: Default {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()>;

    /// Fewest bytes one value can occupy on the wire, used to bound
    /// element counts against the bytes actually available
    fn ndr_min_size() -> usize {
        1
    }
}

impl<T: NdrDecode> NdrDecode for Box<T> {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        (**self).ndr_read(r)
    }

    fn ndr_min_size() -> usize {
        T::ndr_min_size()
    }
}
