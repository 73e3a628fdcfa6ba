//! Core DCOM types (MS-DCOM 2.2)
//!
//! - Identifiers: IPID, IID, CID
//! - ORPC headers: ORPCTHIS, ORPCTHAT and their extensions
//! - Errors, including the partial-response carrying `CallError`

mod error;
mod identifiers;
mod orpc;

pub use error::{hresult, CallError, CallResult, DcomError, Result};
pub use identifiers::{generate_uuid, Cid, Iid, Ipid};
pub use orpc::*;
pub(crate) use orpc::{read_orpc_header, write_orpc_header};

/// Well-known interface UUIDs
pub mod iid {
    /// IUnknown interface UUID
    pub const IUNKNOWN: &str = "00000000-0000-0000-c000-000000000046";
    /// ITypeInfo interface UUID (MS-OAUT)
    pub const ITYPEINFO: &str = "00020401-0000-0000-c000-000000000046";
    /// ITypeInfo2 interface UUID (MS-OAUT)
    pub const ITYPEINFO2: &str = "00020412-0000-0000-c000-000000000046";
}
