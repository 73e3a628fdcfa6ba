//! ITypeInfo2 (MS-OAUT 3.13)
//!
//! Extends ITypeInfo from opnum 22. Only GetTypeKind and GetTypeFlags
//! have stubs here; the rest of the range answers `E_NOTIMPL`.

mod client;
mod protocol;
mod server;

pub use client::*;
pub use protocol::*;
pub use server::*;
