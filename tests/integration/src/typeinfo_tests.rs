//! ITypeInfo Tests - DCOM calls end to end over TCP
//!
//! These tests drive the composed type info clients against a live server:
//! - Walking a type's functions, names and documentation
//! - Failure statuses that still carry the decoded response
//! - Addressing different objects by IPID over one association
//! - Sub-connections and unimplemented opnums

mod common;

use common::*;
use dcerpc::status::hresult;
use dcerpc::{CallOptions, ClientConfig, RpcError};
use dcom::oaut::itypeinfo::{
    doc_flags, GetDocumentationRequest, GetFuncDescRequest, GetImplTypeFlagsRequest,
    GetNamesRequest, GetRefTypeOfImplTypeRequest, TYPE_INFO_SYNTAX,
};
use dcom::oaut::itypeinfo2::{GetTypeFlagsRequest, GetTypeKindRequest};
use dcom::oaut::types::{InvokeKind, TypeKind, MEMBER_ID_NIL};
use dcom::{
    CallError, ClientOptions, DcomError, Ipid, OrpcThis, TypeInfo2Client, TypeInfoClient,
};
use midl_ndr::{BString, NdrReader, NdrWriter};

fn names(list: &[Option<BString>]) -> Vec<&str> {
    list.iter()
        .map(|n| n.as_ref().map_or("", |n| n.as_str()))
        .collect()
}

/// Test: enumerate every function of a type the way a type browser does
#[tokio::test]
async fn test_walk_functions() {
    init_logging();

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfo2Client::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();
    let opts = CallOptions::new();

    let kind = client
        .get_type_kind(GetTypeKindRequest::default(), &opts)
        .await
        .unwrap();
    assert_eq!(kind.type_kind, TypeKind::Dispatch);
    let flags = client
        .get_type_flags(GetTypeFlagsRequest::default(), &opts)
        .await
        .unwrap();
    assert_eq!(flags.type_flags, 0x1000);

    let type_info = client.type_info();
    let mut found = Vec::new();
    for index in 0.. {
        let desc = match type_info
            .get_func_desc(
                GetFuncDescRequest {
                    index,
                    ..Default::default()
                },
                &opts,
            )
            .await
        {
            Ok(resp) => resp.func_desc.unwrap(),
            Err(e) => {
                assert_eq!(e.status(), Some(hresult::TYPE_E_ELEMENTNOTFOUND));
                break;
            }
        };

        let params = desc.params.as_ref().map_or(0, Vec::len);
        let resp = type_info
            .get_names(
                GetNamesRequest {
                    member_id: desc.member_id,
                    max_names: 16,
                    ..Default::default()
                },
                &opts,
            )
            .await
            .unwrap();
        assert_eq!(resp.names.len(), params + 1);
        found.push(names(&resp.names).join(","));
    }

    assert_eq!(found, vec!["AddCircle,x,y,radius", "Clear"]);
    println!("Functions of IShapes: {:?}", found);
}

/// Test: cMaxNames bounds the returned array
#[tokio::test]
async fn test_names_limited_by_max() {
    init_logging();

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();

    let resp = client
        .get_names(
            GetNamesRequest {
                member_id: 0x6002_0000,
                max_names: 2,
                ..Default::default()
            },
            &CallOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(names(&resp.names), vec!["AddCircle", "x"]);
}

/// Test: a failure status keeps the decoded response
#[tokio::test]
async fn test_missing_function_keeps_response() {
    init_logging();

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(shapes))
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

    let message = err.to_string();
    assert!(message.contains("/ITypeInfo/v0/GetFuncDesc"), "{}", message);
    assert!(message.contains("TYPE_E_ELEMENTNOTFOUND"), "{}", message);
    let partial = err.into_partial().unwrap();
    assert!(partial.func_desc.is_none());
    assert_eq!(partial.ret as u32, hresult::TYPE_E_ELEMENTNOTFOUND);
}

/// Test: documentation honours the requested fields
#[tokio::test]
async fn test_documentation_fields() {
    init_logging();

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();
    let opts = CallOptions::new();

    let all = client
        .get_documentation(
            GetDocumentationRequest {
                member_id: MEMBER_ID_NIL,
                flags: doc_flags::ALL,
                ..Default::default()
            },
            &opts,
        )
        .await
        .unwrap();
    assert_eq!(all.name, Some(BString::new("IShapes")));
    assert_eq!(all.doc_string, Some(BString::new("Shape factory")));
    assert_eq!(all.help_context, 100);
    assert_eq!(all.help_file, Some(BString::new("shapes.chm")));

    let name_only = client
        .get_documentation(
            GetDocumentationRequest {
                member_id: 0x6002_0001,
                flags: doc_flags::NAME,
                ..Default::default()
            },
            &opts,
        )
        .await
        .unwrap();
    assert_eq!(name_only.name, Some(BString::new("Clear")));
    assert_eq!(name_only.doc_string, None);
    assert_eq!(name_only.help_file, None);
}

/// Test: implemented interfaces of a type
#[tokio::test]
async fn test_impl_types() {
    init_logging();

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();
    let opts = CallOptions::new();

    let href = client
        .get_ref_type_of_impl_type(GetRefTypeOfImplTypeRequest::default(), &opts)
        .await
        .unwrap();
    assert_eq!(href.ref_type, 4);
    let flags = client
        .get_impl_type_flags(GetImplTypeFlagsRequest::default(), &opts)
        .await
        .unwrap();
    assert_eq!(flags.impl_type_flags, 1);

    let err = client
        .get_impl_type_flags(
            GetImplTypeFlagsRequest {
                index: 1,
                ..Default::default()
            },
            &opts,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(hresult::TYPE_E_ELEMENTNOTFOUND));
}

/// Test: one association reaches different objects through their IPIDs
#[tokio::test]
async fn test_objects_addressed_by_ipid() {
    init_logging();

    let (server, shapes, colors) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let shapes_client = TypeInfo2Client::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();
    let colors_client = shapes_client.with_ipid(Some(colors));
    assert!(colors_client.conn().same_session(&**shapes_client.conn()));
    assert_eq!(colors_client.type_info().unknown().ipid(), Some(colors));

    let opts = CallOptions::new();
    let kind = colors_client
        .get_type_kind(GetTypeKindRequest::default(), &opts)
        .await
        .unwrap();
    assert_eq!(kind.type_kind, TypeKind::Interface);

    let desc = colors_client
        .type_info()
        .get_func_desc(GetFuncDescRequest::default(), &opts)
        .await
        .unwrap()
        .func_desc
        .unwrap();
    assert_eq!(desc.invoke_kind, InvokeKind::PropertyGet);

    // the per-call object overrides the client's IPID
    let kind = colors_client
        .get_type_kind(
            GetTypeKindRequest::default(),
            &CallOptions::new().with_object(shapes),
        )
        .await
        .unwrap();
    assert_eq!(kind.type_kind, TypeKind::Dispatch);
}

/// Test: an IPID the server does not export faults the call
#[tokio::test]
async fn test_unknown_ipid_faults() {
    init_logging();

    let (server, _, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(Ipid::generate()))
        .await
        .unwrap();

    let err = client
        .get_func_desc(GetFuncDescRequest::default(), &CallOptions::new())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            CallError::Dcom(DcomError::Rpc(RpcError::Fault(hresult::CO_E_OBJNOTCONNECTED)))
        ),
        "{:?}",
        err
    );
}

/// Test: a client without an IPID never reaches the wire
#[tokio::test]
async fn test_missing_ipid() {
    init_logging();

    let (server, _, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new()).await.unwrap();

    let err = client
        .get_func_desc(GetFuncDescRequest::default(), &CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "/ITypeInfo/v0/GetFuncDesc: ipid is missing");
    assert_eq!(server.server.stats().snapshot().requests_received, 0);
}

/// Test: a dedicated session per syntax serves the same objects
#[tokio::test]
async fn test_sub_connection() {
    init_logging();

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let primary = TypeInfo2Client::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();

    let sub = cc.sub_conn(TYPE_INFO_SYNTAX).await.unwrap();
    assert!(!sub.same_session(&**primary.conn()));
    assert_eq!(sub.syntax(), Some(TYPE_INFO_SYNTAX));

    let client = TypeInfoClient::superclass(sub).with_ipid(Some(shapes));
    let resp = client
        .get_func_desc(GetFuncDescRequest::default(), &CallOptions::new())
        .await
        .unwrap();
    assert_eq!(resp.func_desc.unwrap().member_id, 0x6002_0000);
}

/// `GetTypeAttr`: legal opnum, no stub behind it
#[derive(Debug, Default)]
struct GetTypeAttr {
    this: OrpcThis,
}

impl dcerpc::Operation for GetTypeAttr {
    fn opnum(&self) -> u16 {
        3
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo/v0/GetTypeAttr"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_value(&self.this)?;
        w.write_deferred()
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        r.read_value(&mut self.this)?;
        r.read_deferred()
    }

    fn marshal_response<'a>(&'a self, _w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, _r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        Ok(())
    }
}

/// Test: opnums without a server stub answer E_NOTIMPL
#[tokio::test]
async fn test_unimplemented_opnum() {
    init_logging();

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();

    let err = dcom::invoke(
        &**client.conn(),
        client.ipid(),
        GetTypeAttr::default(),
        &CallOptions::new(),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(
            err,
            CallError::Dcom(DcomError::Rpc(RpcError::Fault(hresult::E_NOTIMPL)))
        ),
        "{:?}",
        err
    );
}
