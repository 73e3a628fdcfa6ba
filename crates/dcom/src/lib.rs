//! DCOM identity overlay on DCE RPC (MS-DCOM)
//!
//! Every call carries an ORPCTHIS header and is addressed to an interface
//! pointer identifier (IPID) in the request's object UUID; every response
//! starts with ORPCTHAT.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  TypeInfo2Client ─embeds─▶ TypeInfoClient ─embeds─▶ Unknown │
//! │        (all layers share one bound Arc<dyn Conn>)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  client::invoke: IPID selection, status check, partials     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  DCE RPC Layer (dcerpc crate)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the server, each interface's opnum table delegates the range it
//! inherits to its base: ITypeInfo2 → ITypeInfo → IUnknown.
//!
//! # Modules
//!
//! - [`types`]: ORPC headers, identifiers, errors
//! - [`client`]: invocation shared by all interface clients
//! - [`iunknown`]: the root interface
//! - [`oaut`]: ITypeInfo and ITypeInfo2 (MS-OAUT)

pub mod client;
pub mod iunknown;
pub mod oaut;
pub mod types;

pub use client::{invoke, ClientOptions};
pub use iunknown::{unknown_server_handle, UnknownClient, UNKNOWN_SYNTAX};
pub use oaut::itypeinfo::{type_info_interface, type_info_server_handle, TYPE_INFO_SYNTAX};
pub use oaut::itypeinfo2::{type_info2_interface, type_info2_server_handle, TYPE_INFO2_SYNTAX};
pub use oaut::{
    TypeInfo2Client, TypeInfo2Server, TypeInfoClient, TypeInfoServer,
    UnimplementedTypeInfoServer,
};
pub use types::{
    CallError, CallResult, Cid, ComVersion, DcomError, Iid, Ipid, OrpcThat, OrpcThis, Result,
};

/// DCOM version stamped into ORPCTHIS
pub const DCOM_VERSION: ComVersion = ComVersion::DCOM_5_7;
