//! NDR array types
//!
//! NDR supports several array types:
//!
//! - Fixed arrays (`[T; N]`): size known at compile time, elements only
//! - Conformant arrays (`Vec<T>`): max count prefix, then elements
//! - Varying arrays: offset and actual count, then the transmitted subset
//! - Conformant varying arrays: max count, offset, actual count, elements
//!
//! Element pointers are deferred to the end of the array, so an array of
//! structs with embedded pointers is followed by the referents in element
//! order.

use crate::error::MAX_NDR_ARRAY_ELEMENTS;
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

impl<T: NdrEncode, const N: usize> NdrEncode for [T; N] {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        for elem in self {
            elem.ndr_write(w)?;
        }
        Ok(())
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for [T; N]
where
    [T; N]: Default,
{
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        for elem in self.iter_mut() {
            elem.ndr_read(r)?;
        }
        Ok(())
    }

    fn ndr_min_size() -> usize {
        N * T::ndr_min_size()
    }
}

/// Conformant array
///
/// Wire format:
/// ```text
/// max_count: u32
/// elements[max_count]
/// ```
impl<T: NdrEncode> NdrEncode for Vec<T> {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_size(self.len())?;
        for elem in self {
            elem.ndr_write(w)?;
        }
        Ok(())
    }
}

impl<T: NdrDecode> NdrDecode for Vec<T> {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let count = r.read_size()?;
        let count = r.check_count(count, T::ndr_min_size())?;
        read_elements(self, count, r)
    }

    fn ndr_min_size() -> usize {
        4
    }
}

fn read_elements<'a, T: NdrDecode>(
    out: &'a mut Vec<T>,
    count: usize,
    r: &mut NdrReader<'a>,
) -> Result<()> {
    out.clear();
    out.resize_with(count, T::default);
    for elem in out.iter_mut() {
        elem.ndr_read(r)?;
    }
    Ok(())
}

/// Varying array - subset of a fixed-size array
///
/// Wire format:
/// ```text
/// offset: u32
/// actual_count: u32
/// elements[actual_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaryingArray<T> {
    pub offset: u32,
    pub elements: Vec<T>,
}

impl<T> VaryingArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            offset: 0,
            elements,
        }
    }
}

impl<T: NdrEncode> NdrEncode for VaryingArray<T> {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_data(self.offset);
        w.write_size(self.elements.len())?;
        for elem in &self.elements {
            elem.ndr_write(w)?;
        }
        Ok(())
    }
}

impl<T: NdrDecode> NdrDecode for VaryingArray<T> {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        self.offset = r.read_data()?;
        let actual = r.read_size()?;
        let count = r.check_count(actual, T::ndr_min_size())?;
        read_elements(&mut self.elements, count, r)
    }

    fn ndr_min_size() -> usize {
        8
    }
}

/// Conformant varying array - size and subset determined at runtime
///
/// Wire format:
/// ```text
/// max_count: u32    # Maximum elements (conformance)
/// offset: u32       # First transmitted element
/// actual_count: u32 # Number of transmitted elements
/// elements[actual_count]
/// ```
///
/// When fewer elements are supplied than `actual_count`, the missing
/// slots are written as default values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConformantVaryingArray<T> {
    pub max_count: u32,
    pub offset: u32,
    pub actual_count: u32,
    pub elements: Vec<T>,
}

impl<T> ConformantVaryingArray<T> {
    pub fn new(elements: Vec<T>) -> Result<Self> {
        let len = u32::try_from(elements.len()).map_err(|_| NdrError::IntegerOverflow)?;
        Ok(Self {
            max_count: len,
            offset: 0,
            actual_count: len,
            elements,
        })
    }

    /// Explicit bounds; `actual_count` is clamped to `max_count`
    pub fn with_bounds(max_count: u32, actual_count: u32, elements: Vec<T>) -> Self {
        Self {
            max_count,
            offset: 0,
            actual_count: actual_count.min(max_count),
            elements,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T: NdrEncode + Default> NdrEncode for ConformantVaryingArray<T> {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let actual = self.actual_count.min(self.max_count) as usize;
        w.write_data(self.max_count);
        w.write_data(self.offset);
        w.write_size(actual)?;
        for elem in self.elements.iter().take(actual) {
            elem.ndr_write(w)?;
        }
        w.write_defaults::<T>(actual.saturating_sub(self.elements.len()))
    }
}

impl<T: NdrDecode> NdrDecode for ConformantVaryingArray<T> {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        self.max_count = r.read_size()?;
        self.offset = r.read_data()?;
        self.actual_count = r.read_size()?;

        if self.max_count as usize > MAX_NDR_ARRAY_ELEMENTS {
            return Err(NdrError::AllocationLimitExceeded {
                requested: self.max_count as usize,
                limit: MAX_NDR_ARRAY_ELEMENTS,
            });
        }
        match self.offset.checked_add(self.actual_count) {
            Some(end) if end <= self.max_count => {}
            _ => {
                return Err(NdrError::ConformanceMismatch {
                    max_count: self.max_count,
                    actual_count: self.actual_count,
                })
            }
        }

        let count = r.check_count(self.actual_count, T::ndr_min_size())?;
        read_elements(&mut self.elements, count, r)
    }

    fn ndr_min_size() -> usize {
        12
    }
}
