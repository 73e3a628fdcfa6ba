//! ITypeInfo server
//!
//! Implement [`TypeInfoServer`] and register the table from
//! [`type_info_server_handle`]. Methods left at their default answer
//! `E_NOTIMPL`; opnums 0..=2 go to IUnknown.

use super::protocol::*;
use crate::iunknown::{unknown_server_handle, UNKNOWN_OPNUM_COUNT};
use async_trait::async_trait;
use dcerpc::{CallContext, Interface, InterfaceBuilder, OperationTable, RpcError};
use std::sync::Arc;

/// Server side of ITypeInfo
#[async_trait]
pub trait TypeInfoServer: Send + Sync {
    async fn get_func_desc(
        &self,
        _ctx: &CallContext,
        _request: GetFuncDescRequest,
    ) -> dcerpc::Result<GetFuncDescResponse> {
        Err(RpcError::NotImplemented(opnum::GET_FUNC_DESC))
    }

    async fn get_names(
        &self,
        _ctx: &CallContext,
        _request: GetNamesRequest,
    ) -> dcerpc::Result<GetNamesResponse> {
        Err(RpcError::NotImplemented(opnum::GET_NAMES))
    }

    async fn get_ref_type_of_impl_type(
        &self,
        _ctx: &CallContext,
        _request: GetRefTypeOfImplTypeRequest,
    ) -> dcerpc::Result<GetRefTypeOfImplTypeResponse> {
        Err(RpcError::NotImplemented(opnum::GET_REF_TYPE_OF_IMPL_TYPE))
    }

    async fn get_impl_type_flags(
        &self,
        _ctx: &CallContext,
        _request: GetImplTypeFlagsRequest,
    ) -> dcerpc::Result<GetImplTypeFlagsResponse> {
        Err(RpcError::NotImplemented(opnum::GET_IMPL_TYPE_FLAGS))
    }

    async fn get_documentation(
        &self,
        _ctx: &CallContext,
        _request: GetDocumentationRequest,
    ) -> dcerpc::Result<GetDocumentationResponse> {
        Err(RpcError::NotImplemented(opnum::GET_DOCUMENTATION))
    }

    async fn get_mops(
        &self,
        _ctx: &CallContext,
        _request: GetMopsRequest,
    ) -> dcerpc::Result<GetMopsResponse> {
        Err(RpcError::NotImplemented(opnum::GET_MOPS))
    }
}

/// Server with every method left unimplemented
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedTypeInfoServer;

impl TypeInfoServer for UnimplementedTypeInfoServer {}

/// Opnum table for ITypeInfo served by `server`
pub fn type_info_server_handle<S: TypeInfoServer + 'static>(server: Arc<S>) -> OperationTable {
    let builder = InterfaceBuilder::from_syntax(TYPE_INFO_SYNTAX)
        .base(UNKNOWN_OPNUM_COUNT, Arc::new(unknown_server_handle()));
    let builder = route!(builder, server, opnum::GET_FUNC_DESC, GetFuncDescOperation, get_func_desc);
    let builder = route!(builder, server, opnum::GET_NAMES, GetNamesOperation, get_names);
    let builder = route!(
        builder,
        server,
        opnum::GET_REF_TYPE_OF_IMPL_TYPE,
        GetRefTypeOfImplTypeOperation,
        get_ref_type_of_impl_type
    );
    let builder = route!(
        builder,
        server,
        opnum::GET_IMPL_TYPE_FLAGS,
        GetImplTypeFlagsOperation,
        get_impl_type_flags
    );
    let builder = route!(
        builder,
        server,
        opnum::GET_DOCUMENTATION,
        GetDocumentationOperation,
        get_documentation
    );
    let builder = route!(builder, server, opnum::GET_MOPS, GetMopsOperation, get_mops);

    opnum::NOT_USED_ON_WIRE
        .iter()
        .fold(builder, |b, &op| b.reserved(op))
        .opnum_count(opnum::COUNT)
        .build_table()
}

/// ITypeInfo ready to register with a [`dcerpc::DceRpcServer`]
pub fn type_info_interface<S: TypeInfoServer + 'static>(server: Arc<S>) -> Interface {
    Interface::new(TYPE_INFO_SYNTAX, Arc::new(type_info_server_handle(server)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use crate::oaut::itypeinfo::TypeInfoClient;
    use crate::types::{hresult, CallError, DcomError, Ipid, OrpcThat};
    use bytes::Bytes;
    use dcerpc::{
        encode_request, CallOptions, ClientConfig, Conn, Connection, DceRpcServer, ServerHandle,
    };
    use midl_ndr::{BString, NdrContext};
    use parking_lot::Mutex;

    fn ctx() -> CallContext {
        CallContext {
            call_id: 1,
            context_id: 0,
            syntax: TYPE_INFO_SYNTAX,
            object: None,
            ndr: NdrContext::new(),
            assoc_group_id: 0,
        }
    }

    /// Knows no functions; records what it was asked
    #[derive(Default)]
    struct EmptyTypeInfo {
        seen: Mutex<Vec<(u32, Option<dcerpc::Uuid>)>>,
    }

    #[async_trait]
    impl TypeInfoServer for EmptyTypeInfo {
        async fn get_func_desc(
            &self,
            ctx: &CallContext,
            request: GetFuncDescRequest,
        ) -> dcerpc::Result<GetFuncDescResponse> {
            self.seen.lock().push((request.index, ctx.object));
            Ok(GetFuncDescResponse {
                that: OrpcThat::new(),
                func_desc: None,
                ret: hresult::TYPE_E_ELEMENTNOTFOUND as i32,
            })
        }

        async fn get_documentation(
            &self,
            _ctx: &CallContext,
            request: GetDocumentationRequest,
        ) -> dcerpc::Result<GetDocumentationResponse> {
            Ok(GetDocumentationResponse {
                name: Some(BString::new(format!("member{}", request.member_id))),
                help_context: request.flags,
                ..Default::default()
            })
        }

        async fn get_names(
            &self,
            _ctx: &CallContext,
            request: GetNamesRequest,
        ) -> dcerpc::Result<GetNamesResponse> {
            let names = ["Draw", "x", "y"]
                .iter()
                .map(|n| Some(BString::new(format!("{}{}", n, request.member_id))))
                .collect();
            Ok(GetNamesResponse {
                names,
                ..Default::default()
            })
        }
    }

    async fn connected(server: Arc<EmptyTypeInfo>) -> Arc<dyn Conn> {
        let rpc = DceRpcServer::new();
        rpc.register_interface(type_info_interface(server)).await;
        let (client, service) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move { rpc.serve_stream(service).await });
        Arc::new(Connection::from_stream(client, ClientConfig::default()))
    }

    #[tokio::test]
    async fn test_routing() {
        let table = type_info_server_handle(Arc::new(UnimplementedTypeInfoServer));
        assert_eq!(table.opnum_count(), 22);

        // IUnknown slots and ITypeInfo's own unused slots
        for opnum in [0, 1, 2, 10, 11, 15, 19, 20, 21] {
            assert!(table.handle(ctx(), opnum, Bytes::new()).await.unwrap().is_none());
        }
        // in range, no stub in this repository
        assert!(matches!(
            table.handle(ctx(), opnum::GET_TYPE_ATTR, Bytes::new()).await,
            Err(RpcError::NotImplemented(3))
        ));
        assert!(matches!(
            table.handle(ctx(), 22, Bytes::new()).await,
            Err(RpcError::OperationUnavailable(22))
        ));

        let stub = encode_request(&GetFuncDescOperation::default(), NdrContext::new()).unwrap();
        assert!(matches!(
            table.handle(ctx(), opnum::GET_FUNC_DESC, stub).await,
            Err(RpcError::NotImplemented(5))
        ));
    }

    #[tokio::test]
    async fn test_element_not_found_keeps_response() {
        let server = Arc::new(EmptyTypeInfo::default());
        let cc = connected(Arc::clone(&server)).await;
        let ipid = Ipid::generate();
        let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(ipid))
            .await
            .unwrap();

        let err = client
            .get_func_desc(
                GetFuncDescRequest {
                    index: 3,
                    ..Default::default()
                },
                &CallOptions::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(hresult::TYPE_E_ELEMENTNOTFOUND));
        assert!(err.to_string().contains("/ITypeInfo/v0/GetFuncDesc"));
        let partial = err.into_partial().unwrap();
        assert!(partial.func_desc.is_none());
        assert_eq!(*server.seen.lock(), vec![(3, Some(*ipid.as_uuid()))]);
    }

    #[tokio::test]
    async fn test_call_options_object_wins() {
        let server = Arc::new(EmptyTypeInfo::default());
        let cc = connected(Arc::clone(&server)).await;
        let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(Ipid::generate()))
            .await
            .unwrap();

        let other = Ipid::generate();
        let resp = client
            .get_documentation(
                GetDocumentationRequest {
                    member_id: 7,
                    flags: doc_flags::ALL,
                    ..Default::default()
                },
                &CallOptions::new().with_object(other),
            )
            .await
            .unwrap();
        assert_eq!(resp.name, Some(BString::new("member7")));
        assert_eq!(resp.help_context, doc_flags::ALL);

        let err = client
            .get_mops(GetMopsRequest::default(), &CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallError::Dcom(DcomError::Rpc(RpcError::Fault(hresult::E_NOTIMPL)))
        ));
    }

    #[tokio::test]
    async fn test_get_names_limited_by_request() {
        let cc = connected(Arc::new(EmptyTypeInfo::default())).await;
        let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(Ipid::generate()))
            .await
            .unwrap();

        let names = |max_names| GetNamesRequest {
            member_id: 9,
            max_names,
            ..Default::default()
        };
        let resp = client.get_names(names(8), &CallOptions::new()).await.unwrap();
        assert_eq!(
            resp.names,
            vec![
                Some(BString::new("Draw9")),
                Some(BString::new("x9")),
                Some(BString::new("y9")),
            ]
        );

        let resp = client.get_names(names(2), &CallOptions::new()).await.unwrap();
        assert_eq!(resp.names.len(), 2);
        assert_eq!(resp.names[1], Some(BString::new("x9")));

        let resp = client.get_names(names(0), &CallOptions::new()).await.unwrap();
        assert!(resp.names.is_empty());
    }
}
