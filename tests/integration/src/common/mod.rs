//! Common test utilities for integration tests
//!
//! A TCP server hosting a small in-memory type library behind ITypeInfo
//! and ITypeInfo2, plus connection helpers and load statistics.

#![allow(dead_code)]

use async_trait::async_trait;
use dcerpc::status::hresult;
use dcerpc::{
    CallContext, ClientConfig, Conn, ConnectionBuilder, DceRpcServer, DceRpcServerConfig,
    Interface, RpcError,
};
use dcom::oaut::itypeinfo::*;
use dcom::oaut::itypeinfo2::*;
use dcom::oaut::types::{
    vt, CallConv, ElemDesc, FuncDesc, FuncKind, InvokeKind, TypeDesc, TypeKind, MEMBER_ID_NIL,
};
use dcom::{type_info2_interface, type_info_interface, Ipid, OrpcThat};
use midl_ndr::BString;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Initialize logging for tests
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// One function of a described type
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub desc: FuncDesc,
    /// Function name followed by its parameter names
    pub names: Vec<String>,
    pub doc: Option<String>,
}

impl FunctionEntry {
    /// A dispatch method returning HRESULT with `I4` parameters
    pub fn method(member_id: i32, name: &str, params: &[&str]) -> Self {
        let desc = FuncDesc {
            member_id,
            params: Some(
                params
                    .iter()
                    .map(|_| ElemDesc::new(TypeDesc::base(vt::I4), 1))
                    .collect(),
            ),
            func_kind: FuncKind::Dispatch,
            invoke_kind: InvokeKind::Func,
            call_conv: CallConv::Stdcall,
            return_desc: ElemDesc::new(TypeDesc::base(vt::HRESULT), 0),
            ..Default::default()
        };
        let mut names = vec![name.to_string()];
        names.extend(params.iter().map(|p| p.to_string()));
        Self {
            desc,
            names,
            doc: Some(format!("Calls {}", name)),
        }
    }
}

/// Everything one ITypeInfo object describes
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub name: String,
    pub doc: Option<String>,
    pub help_file: Option<String>,
    pub help_context: u32,
    pub kind: TypeKind,
    pub flags: u32,
    pub functions: Vec<FunctionEntry>,
    /// `(href, IMPLTYPEFLAGS)` per implemented interface
    pub impl_types: Vec<(u32, i32)>,
}

impl TypeEntry {
    fn function(&self, member_id: i32) -> Option<&FunctionEntry> {
        self.functions.iter().find(|f| f.desc.member_id == member_id)
    }
}

/// `IShapes`: two methods, one implemented interface
pub fn shapes_type() -> TypeEntry {
    TypeEntry {
        name: "IShapes".to_string(),
        doc: Some("Shape factory".to_string()),
        help_file: Some("shapes.chm".to_string()),
        help_context: 100,
        kind: TypeKind::Dispatch,
        flags: 0x1000,
        functions: vec![
            FunctionEntry::method(0x6002_0000, "AddCircle", &["x", "y", "radius"]),
            FunctionEntry::method(0x6002_0001, "Clear", &[]),
        ],
        impl_types: vec![(0x0000_0004, 0x1)],
    }
}

/// `IColors`: one property getter, no implemented interfaces
pub fn colors_type() -> TypeEntry {
    let mut get = FunctionEntry::method(0x0000_0001, "Count", &[]);
    get.desc.invoke_kind = InvokeKind::PropertyGet;
    TypeEntry {
        name: "IColors".to_string(),
        doc: None,
        help_file: None,
        help_context: 0,
        kind: TypeKind::Interface,
        flags: 0,
        functions: vec![get],
        impl_types: Vec::new(),
    }
}

/// Type information objects keyed by IPID
#[derive(Debug, Default)]
pub struct TypeLibrary {
    objects: HashMap<Ipid, TypeEntry>,
}

impl TypeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, ipid: Ipid, entry: TypeEntry) -> Self {
        self.objects.insert(ipid, entry);
        self
    }

    fn object(&self, ctx: &CallContext) -> dcerpc::Result<&TypeEntry> {
        ctx.object
            .map(Ipid::from)
            .and_then(|ipid| self.objects.get(&ipid))
            .ok_or(RpcError::Fault(hresult::CO_E_OBJNOTCONNECTED))
    }
}

const NOT_FOUND: i32 = hresult::TYPE_E_ELEMENTNOTFOUND as i32;

#[async_trait]
impl TypeInfoServer for TypeLibrary {
    async fn get_func_desc(
        &self,
        ctx: &CallContext,
        request: GetFuncDescRequest,
    ) -> dcerpc::Result<GetFuncDescResponse> {
        let entry = self.object(ctx)?;
        let func_desc = entry
            .functions
            .get(request.index as usize)
            .map(|f| f.desc.clone());
        Ok(GetFuncDescResponse {
            that: OrpcThat::new(),
            ret: if func_desc.is_some() { 0 } else { NOT_FOUND },
            func_desc,
        })
    }

    async fn get_names(
        &self,
        ctx: &CallContext,
        request: GetNamesRequest,
    ) -> dcerpc::Result<GetNamesResponse> {
        let entry = self.object(ctx)?;
        Ok(match entry.function(request.member_id) {
            Some(function) => GetNamesResponse {
                names: function
                    .names
                    .iter()
                    .take(request.max_names as usize)
                    .map(|n| Some(BString::new(n.as_str())))
                    .collect(),
                ..Default::default()
            },
            None => GetNamesResponse {
                ret: NOT_FOUND,
                ..Default::default()
            },
        })
    }

    async fn get_ref_type_of_impl_type(
        &self,
        ctx: &CallContext,
        request: GetRefTypeOfImplTypeRequest,
    ) -> dcerpc::Result<GetRefTypeOfImplTypeResponse> {
        let entry = self.object(ctx)?;
        Ok(match entry.impl_types.get(request.index as usize) {
            Some(&(href, _)) => GetRefTypeOfImplTypeResponse {
                ref_type: href,
                ..Default::default()
            },
            None => GetRefTypeOfImplTypeResponse {
                ret: NOT_FOUND,
                ..Default::default()
            },
        })
    }

    async fn get_impl_type_flags(
        &self,
        ctx: &CallContext,
        request: GetImplTypeFlagsRequest,
    ) -> dcerpc::Result<GetImplTypeFlagsResponse> {
        let entry = self.object(ctx)?;
        Ok(match entry.impl_types.get(request.index as usize) {
            Some(&(_, flags)) => GetImplTypeFlagsResponse {
                impl_type_flags: flags,
                ..Default::default()
            },
            None => GetImplTypeFlagsResponse {
                ret: NOT_FOUND,
                ..Default::default()
            },
        })
    }

    async fn get_documentation(
        &self,
        ctx: &CallContext,
        request: GetDocumentationRequest,
    ) -> dcerpc::Result<GetDocumentationResponse> {
        let entry = self.object(ctx)?;
        let (name, doc) = if request.member_id == MEMBER_ID_NIL {
            (entry.name.clone(), entry.doc.clone())
        } else {
            match entry.function(request.member_id) {
                Some(f) => (f.names[0].clone(), f.doc.clone()),
                None => {
                    return Ok(GetDocumentationResponse {
                        ret: NOT_FOUND,
                        ..Default::default()
                    })
                }
            }
        };

        let wanted = |bit: u32| request.flags & bit != 0;
        Ok(GetDocumentationResponse {
            name: Some(BString::new(name)).filter(|_| wanted(doc_flags::NAME)),
            doc_string: doc.map(BString::new).filter(|_| wanted(doc_flags::DOC_STRING)),
            help_context: if wanted(doc_flags::HELP_CONTEXT) {
                entry.help_context
            } else {
                0
            },
            help_file: entry
                .help_file
                .clone()
                .map(BString::new)
                .filter(|_| wanted(doc_flags::HELP_FILE)),
            ..Default::default()
        })
    }

    async fn get_mops(
        &self,
        ctx: &CallContext,
        _request: GetMopsRequest,
    ) -> dcerpc::Result<GetMopsResponse> {
        self.object(ctx)?;
        Ok(GetMopsResponse::default())
    }
}

#[async_trait]
impl TypeInfo2Server for TypeLibrary {
    async fn get_type_kind(
        &self,
        ctx: &CallContext,
        _request: GetTypeKindRequest,
    ) -> dcerpc::Result<GetTypeKindResponse> {
        Ok(GetTypeKindResponse {
            type_kind: self.object(ctx)?.kind,
            ..Default::default()
        })
    }

    async fn get_type_flags(
        &self,
        ctx: &CallContext,
        _request: GetTypeFlagsRequest,
    ) -> dcerpc::Result<GetTypeFlagsResponse> {
        Ok(GetTypeFlagsResponse {
            type_flags: self.object(ctx)?.flags,
            ..Default::default()
        })
    }
}

/// Both type info interfaces over one library
pub fn type_library_interfaces(library: TypeLibrary) -> Vec<Interface> {
    let library = Arc::new(library);
    vec![
        type_info_interface(Arc::clone(&library)),
        type_info2_interface(library),
    ]
}

/// Server listening on an ephemeral local port, stopped on drop
pub struct TestServer {
    pub addr: SocketAddr,
    pub server: DceRpcServer,
    handle: JoinHandle<dcerpc::Result<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start a test server with the given interfaces
pub async fn start_test_server(
    config: DceRpcServerConfig,
    interfaces: Vec<Interface>,
) -> dcerpc::Result<TestServer> {
    let server = DceRpcServer::with_config(config);
    for interface in interfaces {
        server.register_interface(interface).await;
    }

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let srv = server.clone();
    let handle =
        tokio::spawn(async move { srv.serve_listener(listener, std::future::pending()).await });

    Ok(TestServer {
        addr,
        server,
        handle,
    })
}

/// Start a server hosting `IShapes` and `IColors`, returning their IPIDs
pub async fn start_type_library_server() -> dcerpc::Result<(TestServer, Ipid, Ipid)> {
    let shapes = Ipid::generate();
    let colors = Ipid::generate();
    let library = TypeLibrary::new()
        .with_object(shapes, shapes_type())
        .with_object(colors, colors_type());
    let server =
        start_test_server(DceRpcServerConfig::default(), type_library_interfaces(library)).await?;
    Ok((server, shapes, colors))
}

/// Connect an unbound client session
pub async fn connect(addr: SocketAddr, config: ClientConfig) -> dcerpc::Result<Arc<dyn Conn>> {
    let conn = ConnectionBuilder::from_config(config)
        .call_timeout(Duration::from_secs(10))
        .connect(addr)
        .await?;
    Ok(Arc::new(conn))
}

/// Statistics tracker for concurrent tests
#[derive(Debug)]
pub struct ConcurrentStats {
    success: AtomicU64,
    failure: AtomicU64,
    total_latency_us: AtomicU64,
    min_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl ConcurrentStats {
    pub fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            min_latency_us: AtomicU64::new(u64::MAX),
            max_latency_us: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self, latency: Duration) {
        let us = latency.as_micros() as u64;
        self.success.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(us, Ordering::Relaxed);
        self.min_latency_us.fetch_min(us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }

    pub fn avg_latency(&self) -> Duration {
        let count = self.success_count();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_latency_us.load(Ordering::Relaxed) / count)
    }

    pub fn min_latency(&self) -> Duration {
        match self.min_latency_us.load(Ordering::Relaxed) {
            u64::MAX => Duration::ZERO,
            us => Duration::from_micros(us),
        }
    }

    pub fn max_latency(&self) -> Duration {
        Duration::from_micros(self.max_latency_us.load(Ordering::Relaxed))
    }
}

impl Default for ConcurrentStats {
    fn default() -> Self {
        Self::new()
    }
}
