//! NDR encoding/decoding context
//!
//! The context carries the byte order negotiated in the PDU data
//! representation label and the alignment rule shared by the writer and
//! reader.

use bytes::{Buf, BufMut};

/// NDR encoding/decoding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdrContext {
    /// Whether to use little-endian byte order
    pub little_endian: bool,
}

macro_rules! ordered_io {
    ($($put:ident, $get:ident, $ty:ty, $put_le:ident, $put_be:ident, $get_le:ident, $get_be:ident;)*) => {
        $(
            #[inline]
            pub fn $put<B: BufMut>(&self, buf: &mut B, value: $ty) {
                if self.little_endian {
                    buf.$put_le(value);
                } else {
                    buf.$put_be(value);
                }
            }

            /// Callers check `remaining()` first.
            #[inline]
            pub fn $get<B: Buf>(&self, buf: &mut B) -> $ty {
                if self.little_endian {
                    buf.$get_le()
                } else {
                    buf.$get_be()
                }
            }
        )*
    };
}

impl NdrContext {
    /// NDR20 little-endian context
    pub fn new() -> Self {
        Self { little_endian: true }
    }

    /// Create a context with big-endian byte order
    pub fn big_endian() -> Self {
        Self { little_endian: false }
    }

    /// Create a context from a data representation label's integer rep
    pub fn with_byte_order(little_endian: bool) -> Self {
        Self { little_endian }
    }

    /// Padding needed to bring `position` up to a multiple of `alignment`
    #[inline]
    pub fn align_padding(position: usize, alignment: usize) -> usize {
        if alignment <= 1 {
            return 0;
        }
        match position % alignment {
            0 => 0,
            rem => alignment - rem,
        }
    }

    ordered_io! {
        put_u16, get_u16, u16, put_u16_le, put_u16, get_u16_le, get_u16;
        put_i16, get_i16, i16, put_i16_le, put_i16, get_i16_le, get_i16;
        put_u32, get_u32, u32, put_u32_le, put_u32, get_u32_le, get_u32;
        put_i32, get_i32, i32, put_i32_le, put_i32, get_i32_le, get_i32;
        put_u64, get_u64, u64, put_u64_le, put_u64, get_u64_le, get_u64;
        put_i64, get_i64, i64, put_i64_le, put_i64, get_i64_le, get_i64;
        put_f32, get_f32, f32, put_f32_le, put_f32, get_f32_le, get_f32;
        put_f64, get_f64, f64, put_f64_le, put_f64, get_f64_le, get_f64;
    }
}

impl Default for NdrContext {
    fn default() -> Self {
        Self::new()
    }
}
