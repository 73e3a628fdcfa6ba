//! ITypeInfo2 server

use super::protocol::*;
use crate::oaut::itypeinfo::{type_info_server_handle, TypeInfoServer};
use async_trait::async_trait;
use dcerpc::{CallContext, Interface, InterfaceBuilder, OperationTable, RpcError};
use std::sync::Arc;

/// Server side of ITypeInfo2. Opnums below 22 reach the
/// [`TypeInfoServer`] half of the same object.
#[async_trait]
pub trait TypeInfo2Server: TypeInfoServer {
    async fn get_type_kind(
        &self,
        _ctx: &CallContext,
        _request: GetTypeKindRequest,
    ) -> dcerpc::Result<GetTypeKindResponse> {
        Err(RpcError::NotImplemented(opnum::GET_TYPE_KIND))
    }

    async fn get_type_flags(
        &self,
        _ctx: &CallContext,
        _request: GetTypeFlagsRequest,
    ) -> dcerpc::Result<GetTypeFlagsResponse> {
        Err(RpcError::NotImplemented(opnum::GET_TYPE_FLAGS))
    }
}

impl TypeInfo2Server for crate::oaut::UnimplementedTypeInfoServer {}

pub fn type_info2_server_handle<S: TypeInfo2Server + 'static>(server: Arc<S>) -> OperationTable {
    let base = Arc::new(type_info_server_handle(Arc::clone(&server)));
    let builder = InterfaceBuilder::from_syntax(TYPE_INFO2_SYNTAX).base(opnum::BASE, base);
    let builder = route!(builder, server, opnum::GET_TYPE_KIND, GetTypeKindOperation, get_type_kind);
    let builder = route!(builder, server, opnum::GET_TYPE_FLAGS, GetTypeFlagsOperation, get_type_flags);
    builder.opnum_count(opnum::COUNT).build_table()
}

pub fn type_info2_interface<S: TypeInfo2Server + 'static>(server: Arc<S>) -> Interface {
    Interface::new(TYPE_INFO2_SYNTAX, Arc::new(type_info2_server_handle(server)))
}
