//! NDR primitive type implementations
//!
//! NDR primitive types and their encodings:
//!
//! | MIDL Type     | Rust Type | Size | Alignment |
//! |---------------|-----------|------|-----------|
//! | boolean       | bool      | 1    | 1         |
//! | byte/char     | u8        | 1    | 1         |
//! | small         | i8        | 1    | 1         |
//! | short         | i16       | 2    | 2         |
//! | long/int      | i32       | 4    | 4         |
//! | hyper         | i64       | 8    | 8         |
//! | unsigned short| u16       | 2    | 2         |
//! | unsigned long | u32       | 4    | 4         |
//! | unsigned hyper| u64       | 8    | 8         |
//! | float         | f32       | 4    | 4         |
//! | double        | f64       | 8    | 8         |
//! | wchar_t       | u16       | 2    | 2         |
//! | error_status_t| u32       | 4    | 4         |
//!
//! Every primitive is aligned to its own size.

use crate::{NdrContext, NdrDecode, NdrEncode, NdrReader, NdrWriter, Result};
use bytes::{Buf, BufMut};

/// A fixed-size primitive aligned to its own size
pub trait NdrScalar: Copy + Default {
    const SIZE: usize;

    fn put<B: BufMut>(self, ctx: &NdrContext, buf: &mut B);

    /// The caller guarantees `SIZE` bytes are available.
    fn get<B: Buf>(ctx: &NdrContext, buf: &mut B) -> Self;
}

macro_rules! impl_ndr_scalar {
    ($ty:ty, $size:expr, $put:ident, $get:ident) => {
        impl NdrScalar for $ty {
            const SIZE: usize = $size;

            #[inline]
            fn put<B: BufMut>(self, ctx: &NdrContext, buf: &mut B) {
                ctx.$put(buf, self);
            }

            #[inline]
            fn get<B: Buf>(ctx: &NdrContext, buf: &mut B) -> Self {
                ctx.$get(buf)
            }
        }

        impl NdrEncode for $ty {
            fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                w.write_data(*self);
                Ok(())
            }
        }

        impl NdrDecode for $ty {
            fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
                *self = r.read_data()?;
                Ok(())
            }

            fn ndr_min_size() -> usize {
                $size
            }
        }
    };
}

impl_ndr_scalar!(u16, 2, put_u16, get_u16);
impl_ndr_scalar!(i16, 2, put_i16, get_i16);
impl_ndr_scalar!(u32, 4, put_u32, get_u32);
impl_ndr_scalar!(i32, 4, put_i32, get_i32);
impl_ndr_scalar!(u64, 8, put_u64, get_u64);
impl_ndr_scalar!(i64, 8, put_i64, get_i64);
impl_ndr_scalar!(f32, 4, put_f32, get_f32);
impl_ndr_scalar!(f64, 8, put_f64, get_f64);

impl NdrScalar for u8 {
    const SIZE: usize = 1;

    fn put<B: BufMut>(self, _ctx: &NdrContext, buf: &mut B) {
        buf.put_u8(self);
    }

    fn get<B: Buf>(_ctx: &NdrContext, buf: &mut B) -> Self {
        buf.get_u8()
    }
}

impl NdrScalar for i8 {
    const SIZE: usize = 1;

    fn put<B: BufMut>(self, _ctx: &NdrContext, buf: &mut B) {
        buf.put_i8(self);
    }

    fn get<B: Buf>(_ctx: &NdrContext, buf: &mut B) -> Self {
        buf.get_i8()
    }
}

/// NDR boolean - encoded as a single byte (0x00 = false, 0x01 = true)
impl NdrScalar for bool {
    const SIZE: usize = 1;

    fn put<B: BufMut>(self, _ctx: &NdrContext, buf: &mut B) {
        buf.put_u8(u8::from(self));
    }

    fn get<B: Buf>(_ctx: &NdrContext, buf: &mut B) -> Self {
        buf.get_u8() != 0
    }
}

macro_rules! impl_ndr_byte {
    ($($ty:ty),*) => {
        $(
            impl NdrEncode for $ty {
                fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                    w.write_data(*self);
                    Ok(())
                }
            }

            impl NdrDecode for $ty {
                fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
                    *self = r.read_data()?;
                    Ok(())
                }
            }
        )*
    };
}

impl_ndr_byte!(u8, i8, bool);
