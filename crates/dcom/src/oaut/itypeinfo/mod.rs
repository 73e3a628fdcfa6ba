//! ITypeInfo (MS-OAUT 3.7)
//!
//! Describes one type: its functions, their names and documentation, and
//! the interfaces it implements.
//! - GetFuncDesc - FUNCDESC of one function by index
//! - GetNames - names of a member and its parameters
//! - GetRefTypeOfImplType / GetImplTypeFlags - implemented interfaces
//! - GetDocumentation - name, doc string and help file of a member
//! - GetMops - marshaling opcodes

mod client;
mod protocol;
mod server;

pub use client::*;
pub use protocol::*;
pub use server::*;
