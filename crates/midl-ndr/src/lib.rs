//! NDR (Network Data Representation) runtime library
//!
//! This crate implements the NDR20 transfer syntax used by DCE RPC and
//! MS-RPCE stubs: a cursor-style writer and reader that track alignment,
//! hand out pointer referent ids and defer pointer referents to the end
//! of the enclosing construct.
//!
//! # NDR Wire Format
//!
//! NDR is the standard encoding for DCE RPC data. Key characteristics:
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes)
//! - Unique and full pointers are a 4-byte referent id; the referent
//!   follows the construct that embeds the pointer
//! - Referents of referents come after their parent and before the
//!   parent's later siblings
//! - Strings are conformant varying arrays with a null terminator
//!
//! # Example
//!
//! ```
//! use midl_ndr::{NdrReader, NdrWriter, NdrWString, PointerKind};
//!
//! let name = Some(NdrWString::from("Count"));
//! let mut w = NdrWriter::new();
//! w.write_data(7u32);
//! w.write_pointer(PointerKind::Unique, name.as_ref()).unwrap();
//! let bytes = w.finish().unwrap();
//!
//! let mut decoded: Option<NdrWString> = None;
//! let mut r = NdrReader::new(bytes);
//! let index: u32 = r.read_data().unwrap();
//! r.read_pointer(PointerKind::Unique, &mut decoded).unwrap();
//! r.finish().unwrap();
//! assert_eq!(index, 7);
//! assert_eq!(decoded, name);
//! ```

mod arrays;
mod context;
mod decode;
mod encode;
mod error;
mod pointers;
mod primitives;
mod reader;
mod strings;
mod writer;

pub use arrays::{ConformantVaryingArray, VaryingArray};
pub use context::NdrContext;
pub use decode::NdrDecode;
pub use encode::NdrEncode;
pub use error::{
    NdrError, Result, MAX_NDR_ALLOCATION_SIZE, MAX_NDR_ARRAY_ELEMENTS, MAX_NDR_NESTING_DEPTH,
};
pub use pointers::{PointerKind, FIRST_REFERENT_ID, REFERENT_ID_STEP};
pub use primitives::NdrScalar;
pub use reader::NdrReader;
pub use strings::{BString, NdrString, NdrWString};
pub use writer::NdrWriter;

/// Re-export bytes for convenience
pub use bytes::{Buf, BufMut, Bytes, BytesMut};
