//! DCE RPC Server
//!
//! Each association runs in its own Tokio task. Requests are reassembled,
//! routed by presentation context to an interface's [`ServerHandle`] and
//! executed concurrently; responses go out through the association's
//! writer task, one whole fragment sequence at a time.
//!
//! # Opnum routing
//!
//! An [`OperationTable`] resolves an opnum in this order:
//!
//! 1. outside the declared range: `OperationUnavailable`
//! 2. below the base interface's method count: delegated to the base
//! 3. reserved ("not used on wire"): no-op, empty response
//! 4. registered: the handler's response
//! 5. otherwise: `NotImplemented`

use crate::connection::Stream;
use crate::dcerpc::{
    AlterContextRespPdu, BindAckPdu, BindBody, BindNakPdu, ContextElement,
    DataRepresentation, FaultPdu, Pdu, PresentationResult, ProviderReason,
    RejectReason, RequestPdu, ResponsePdu, SyntaxId, Uuid, NDR_TRANSFER_SYNTAX,
};
use crate::dcerpc_transport::{PduReader, PduWriter};
use crate::error::{Result, RpcError};
use crate::fragmentation::FragmentAssembler;
use crate::operation::{decode_request, encode_response, Operation};
use crate::status::nca;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use midl_ndr::NdrContext;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::ReadHalf;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, trace, warn};

/// What a handler knows about the call it serves
#[derive(Debug, Clone)]
pub struct CallContext {
    pub call_id: u32,
    pub context_id: u16,
    pub syntax: SyntaxId,
    /// Object UUID from the request (the IPID for DCOM calls)
    pub object: Option<Uuid>,
    /// Byte order of the request; responses are encoded the same way
    pub ndr: NdrContext,
    pub assoc_group_id: u32,
}

/// Server side of one interface
#[async_trait]
pub trait ServerHandle: Send + Sync {
    /// `Ok(None)` is a reserved no-op: neither a value nor an error
    async fn handle(&self, ctx: CallContext, opnum: u16, stub: Bytes) -> Result<Option<Bytes>>;
}

/// Operation handler function type
pub type OperationHandler =
    Arc<dyn Fn(CallContext, Bytes) -> BoxFuture<'static, Result<Bytes>> + Send + Sync>;

/// Decode a request into `O`, run `handler` on it and encode the response
pub async fn dispatch<O, F, Fut>(ctx: &CallContext, stub: Bytes, handler: F) -> Result<Bytes>
where
    O: Operation + Default,
    F: FnOnce(O) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    let mut op = O::default();
    decode_request(&mut op, stub, ctx.ndr)?;
    trace!("Dispatching {}: call_id={}", op.name(), ctx.call_id);
    let op = handler(op).await?;
    encode_response(&op, ctx.ndr)
}

/// Opnum-indexed dispatch for one interface
pub struct OperationTable {
    base: Option<(u16, Arc<dyn ServerHandle>)>,
    operations: HashMap<u16, OperationHandler>,
    reserved: HashSet<u16>,
    opnum_count: u16,
}

impl OperationTable {
    pub fn opnum_count(&self) -> u16 {
        self.opnum_count
    }

    pub fn get_operation(&self, opnum: u16) -> Option<&OperationHandler> {
        self.operations.get(&opnum)
    }

    pub fn is_reserved(&self, opnum: u16) -> bool {
        self.reserved.contains(&opnum)
    }
}

#[async_trait]
impl ServerHandle for OperationTable {
    async fn handle(&self, ctx: CallContext, opnum: u16, stub: Bytes) -> Result<Option<Bytes>> {
        if opnum >= self.opnum_count {
            return Err(RpcError::OperationUnavailable(opnum));
        }
        if let Some((count, base)) = &self.base {
            if opnum < *count {
                return base.handle(ctx, opnum, stub).await;
            }
        }
        if self.reserved.contains(&opnum) {
            return Ok(None);
        }
        match self.operations.get(&opnum) {
            Some(handler) => handler(ctx, stub).await.map(Some),
            None => Err(RpcError::NotImplemented(opnum)),
        }
    }
}

/// Interface definition: a syntax and the handle serving it
pub struct Interface {
    pub syntax: SyntaxId,
    handle: Arc<dyn ServerHandle>,
}

impl Interface {
    pub fn new(syntax: SyntaxId, handle: Arc<dyn ServerHandle>) -> Self {
        Self { syntax, handle }
    }

    pub fn handle(&self) -> &Arc<dyn ServerHandle> {
        &self.handle
    }
}

/// Builder for creating DCE RPC interfaces with a fluent API
pub struct InterfaceBuilder {
    syntax: SyntaxId,
    base: Option<(u16, Arc<dyn ServerHandle>)>,
    operations: HashMap<u16, OperationHandler>,
    reserved: HashSet<u16>,
    opnum_count: Option<u16>,
}

impl InterfaceBuilder {
    pub fn new(uuid: &str, major_version: u16, minor_version: u16) -> Option<Self> {
        let uuid = Uuid::parse(uuid)?;
        Some(Self::from_syntax(SyntaxId::new(
            uuid,
            major_version,
            minor_version,
        )))
    }

    pub fn from_syntax(syntax: SyntaxId) -> Self {
        Self {
            syntax,
            base: None,
            operations: HashMap::new(),
            reserved: HashSet::new(),
            opnum_count: None,
        }
    }

    /// Delegate opnums `[0, count)` to a base interface
    pub fn base(mut self, count: u16, handle: Arc<dyn ServerHandle>) -> Self {
        self.base = Some((count, handle));
        self
    }

    pub fn operation<F, Fut>(mut self, opnum: u16, handler: F) -> Self
    where
        F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes>> + Send + 'static,
    {
        self.operations
            .insert(opnum, Arc::new(move |ctx, args| Box::pin(handler(ctx, args))));
        self
    }

    /// Mark an opnum as not used on the wire
    pub fn reserved(mut self, opnum: u16) -> Self {
        self.reserved.insert(opnum);
        self
    }

    /// Number of opnums the interface defines, base methods included.
    ///
    /// Defaults to one past the highest opnum mentioned.
    pub fn opnum_count(mut self, count: u16) -> Self {
        self.opnum_count = Some(count);
        self
    }

    pub fn build_table(self) -> OperationTable {
        let opnum_count = self.opnum_count.unwrap_or_else(|| {
            let highest = self
                .operations
                .keys()
                .chain(self.reserved.iter())
                .map(|op| op.saturating_add(1))
                .max()
                .unwrap_or(0);
            highest.max(self.base.as_ref().map_or(0, |(count, _)| *count))
        });
        OperationTable {
            base: self.base,
            operations: self.operations,
            reserved: self.reserved,
            opnum_count,
        }
    }

    pub fn build(self) -> Interface {
        let syntax = self.syntax;
        Interface::new(syntax, Arc::new(self.build_table()))
    }
}

/// DCE RPC Server configuration
#[derive(Debug, Clone)]
pub struct DceRpcServerConfig {
    pub max_pdu_size: usize,
    pub max_connections: usize,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    /// Fragmented requests one association may have in reassembly at once
    pub max_partial_requests: usize,
}

impl Default for DceRpcServerConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: 65536,
            max_connections: 10000,
            max_xmit_frag: 4280,
            max_recv_frag: 4280,
            max_partial_requests: 64,
        }
    }
}

/// Server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_accepted: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub requests_received: AtomicU64,
    pub requests_processed: AtomicU64,
    pub requests_failed: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
}

impl ServerStats {
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of server statistics
#[derive(Debug, Clone)]
pub struct ServerStatsSnapshot {
    pub connections_accepted: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub requests_received: u64,
    pub requests_processed: u64,
    pub requests_failed: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

struct ServerInner {
    interfaces: RwLock<HashMap<SyntaxId, Interface>>,
    config: DceRpcServerConfig,
    next_assoc_group: AtomicU32,
    /// Live associations per association group
    groups: parking_lot::Mutex<HashMap<u32, usize>>,
    stats: Arc<ServerStats>,
}

/// DCE RPC Server
///
/// Cheap to clone; clones serve the same interfaces and share statistics.
///
/// - Each association runs in its own Tokio task
/// - A semaphore limits maximum concurrent connections
/// - Handlers run outside the interface lock
#[derive(Clone)]
pub struct DceRpcServer {
    inner: Arc<ServerInner>,
}

impl DceRpcServer {
    pub fn new() -> Self {
        Self::with_config(DceRpcServerConfig::default())
    }

    pub fn with_config(config: DceRpcServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                interfaces: RwLock::new(HashMap::new()),
                config,
                next_assoc_group: AtomicU32::new(0x1000),
                groups: parking_lot::Mutex::new(HashMap::new()),
                stats: Arc::new(ServerStats::default()),
            }),
        }
    }

    pub fn config(&self) -> &DceRpcServerConfig {
        &self.inner.config
    }

    /// Get server statistics
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.inner.stats
    }

    /// Register an interface with the server
    ///
    /// Versions of one interface UUID coexist; registering the same
    /// version again replaces it.
    pub async fn register_interface(&self, interface: Interface) {
        let mut interfaces = self.inner.interfaces.write().await;
        let syntax = interface.syntax;
        if interfaces.insert(syntax, interface).is_some() {
            info!("Replaced interface {}", syntax);
        } else {
            info!("Registered interface {}", syntax);
        }
    }

    /// Run the server on the given address
    pub async fn run(&self, addr: SocketAddr) -> Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F: Future<Output = ()>>(
        &self,
        addr: SocketAddr,
        shutdown: F,
    ) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Accept associations from an already-bound listener
    pub async fn serve_listener<F: Future<Output = ()>>(
        &self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<()> {
        let max_connections = self.inner.config.max_connections;
        info!(
            "DCE RPC server listening on {} (max_connections: {})",
            listener.local_addr()?,
            max_connections
        );

        let semaphore = Arc::new(Semaphore::new(max_connections));
        let stats = &self.inner.stats;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Server shutting down gracefully");
                    // Wait for all connections to complete
                    let _ = semaphore.acquire_many(max_connections as u32).await;
                    info!("All connections closed");
                    return Ok(());
                }

                result = listener.accept() => {
                    let (stream, peer_addr) = result?;

                    let permit = match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                            warn!("Connection limit reached, rejecting connection from {}", peer_addr);
                            drop(stream);
                            continue;
                        }
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("set_nodelay failed for {}: {}", peer_addr, e);
                    }
                    stats.connections_accepted.fetch_add(1, Ordering::Relaxed);
                    debug!("Accepted connection from {}", peer_addr);

                    let server = self.clone();
                    tokio::spawn(async move {
                        // Permit is held until this task completes
                        let _permit = permit;
                        match server.serve_stream(stream).await {
                            Ok(()) => debug!("Connection closed normally from {}", peer_addr),
                            Err(RpcError::ConnectionClosed) => {
                                debug!("Connection closed from {}", peer_addr);
                            }
                            Err(e) => warn!("Connection error from {}: {}", peer_addr, e),
                        }
                    });
                }
            }
        }
    }

    /// Serve one association over `stream` until it closes
    pub async fn serve_stream<S: Stream>(&self, stream: S) -> Result<()> {
        let stats = Arc::clone(&self.inner.stats);
        stats.connections_active.fetch_add(1, Ordering::Relaxed);

        let (reader, writer) = tokio::io::split(stream);
        let (writer, _) = PduWriter::spawn(writer);
        let mut association = ServerAssociation {
            server: self.clone(),
            reader: PduReader::new(reader, self.inner.config.max_pdu_size),
            writer,
            assoc_group_id: None,
            max_xmit_frag: self.inner.config.max_xmit_frag,
            contexts: HashMap::new(),
            partial: HashMap::new(),
        };
        let result = association.run().await;

        if let Some(group) = association.assoc_group_id {
            self.leave_group(group);
        }
        stats.connections_active.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn join_group(&self, requested: u32) -> Option<u32> {
        let mut groups = self.inner.groups.lock();
        if requested == 0 {
            let id = self.inner.next_assoc_group.fetch_add(1, Ordering::Relaxed);
            groups.insert(id, 1);
            return Some(id);
        }
        let members = groups.get_mut(&requested)?;
        *members += 1;
        Some(requested)
    }

    fn leave_group(&self, id: u32) {
        let mut groups = self.inner.groups.lock();
        if let Some(members) = groups.get_mut(&id) {
            *members -= 1;
            if *members == 0 {
                groups.remove(&id);
            }
        }
    }

    async fn negotiate(
        &self,
        elements: &[ContextElement],
        contexts: &mut HashMap<u16, BoundContext>,
    ) -> Vec<PresentationResult> {
        let interfaces = self.inner.interfaces.read().await;
        elements
            .iter()
            .map(|elem| {
                let Some(interface) = resolve(&interfaces, &elem.abstract_syntax) else {
                    debug!("Rejecting unknown abstract syntax {}", elem.abstract_syntax);
                    return PresentationResult::rejected(
                        ProviderReason::AbstractSyntaxNotSupported,
                    );
                };
                if !elem.transfer_syntaxes.contains(&NDR_TRANSFER_SYNTAX) {
                    return PresentationResult::rejected(
                        ProviderReason::ProposedTransferSyntaxesNotSupported,
                    );
                }
                contexts.insert(
                    elem.context_id,
                    BoundContext {
                        syntax: elem.abstract_syntax,
                        handle: Arc::clone(interface.handle()),
                    },
                );
                PresentationResult::accepted(NDR_TRANSFER_SYNTAX)
            })
            .collect()
    }
}

/// The registered interface serving `wanted`
///
/// An exact version wins. Otherwise the lowest registered minor version
/// at or above the requested one with the same major version is used.
fn resolve<'a>(
    interfaces: &'a HashMap<SyntaxId, Interface>,
    wanted: &SyntaxId,
) -> Option<&'a Interface> {
    interfaces.get(wanted).or_else(|| {
        interfaces
            .values()
            .filter(|i| {
                i.syntax.uuid == wanted.uuid
                    && i.syntax.major_version() == wanted.major_version()
                    && i.syntax.minor_version() >= wanted.minor_version()
            })
            .min_by_key(|i| i.syntax.minor_version())
    })
}

impl Default for DceRpcServer {
    fn default() -> Self {
        Self::new()
    }
}

struct BoundContext {
    syntax: SyntaxId,
    handle: Arc<dyn ServerHandle>,
}

/// Request metadata kept while its fragments arrive
struct PartialRequest {
    assembler: FragmentAssembler,
    first: RequestPdu,
}

struct ServerAssociation<S: Stream> {
    server: DceRpcServer,
    reader: PduReader<ReadHalf<S>>,
    writer: PduWriter,
    assoc_group_id: Option<u32>,
    max_xmit_frag: u16,
    contexts: HashMap<u16, BoundContext>,
    partial: HashMap<u32, PartialRequest>,
}

impl<S: Stream> ServerAssociation<S> {
    async fn run(&mut self) -> Result<()> {
        let stats = Arc::clone(&self.server.inner.stats);
        loop {
            let data = self.reader.read_pdu().await?;
            stats
                .bytes_received
                .fetch_add(data.len() as u64, Ordering::Relaxed);

            match Pdu::decode(&data)? {
                Pdu::Bind(bind) => self.on_bind(bind.header.call_id, bind.header.data_rep, bind.body).await?,
                Pdu::AlterContext(alter) => {
                    self.on_alter_context(alter.header.call_id, alter.header.data_rep, alter.body)
                        .await?
                }
                Pdu::Request(request) => {
                    stats.requests_received.fetch_add(1, Ordering::Relaxed);
                    self.on_request(request).await?;
                }
                Pdu::Orphaned(pdu) | Pdu::CoCancel(pdu) => {
                    debug!(
                        "Client abandoned call_id={} ({:?})",
                        pdu.header.call_id, pdu.header.packet_type
                    );
                    self.partial.remove(&pdu.header.call_id);
                }
                Pdu::Shutdown(_) => {
                    debug!("Client requested shutdown");
                    return Ok(());
                }
                other => warn!(
                    "Received unexpected {:?} PDU from client",
                    other.header().packet_type
                ),
            }
        }
    }

    async fn send(&self, pdu: &Pdu) -> Result<()> {
        let encoded = pdu.encode()?;
        self.server
            .inner
            .stats
            .bytes_sent
            .fetch_add(encoded.len() as u64, Ordering::Relaxed);
        self.writer.send(vec![encoded]).await
    }

    async fn on_bind(&mut self, call_id: u32, data_rep: DataRepresentation, body: BindBody) -> Result<()> {
        debug!(
            "Received bind: call_id={}, contexts={}, assoc_group={:#x}",
            call_id,
            body.context_list.len(),
            body.assoc_group_id
        );

        let reject = |reason| {
            let mut nak = BindNakPdu::new(call_id, reason);
            nak.header.data_rep = data_rep;
            Pdu::BindNak(nak)
        };

        if self.assoc_group_id.is_some() {
            warn!("Rejecting second bind on an established association");
            return self.send(&reject(RejectReason::ProtocolVersionNotSupported)).await;
        }
        let Some(group) = self.server.join_group(body.assoc_group_id) else {
            warn!("Rejecting bind to unknown association group {:#x}", body.assoc_group_id);
            return self.send(&reject(RejectReason::NotSpecified)).await;
        };
        self.assoc_group_id = Some(group);

        let config = &self.server.inner.config;
        self.max_xmit_frag = config.max_xmit_frag.min(body.max_recv_frag);
        let results = self.server.negotiate(&body.context_list, &mut self.contexts).await;

        let mut pdu = BindAckPdu::new(call_id, group, results);
        pdu.header.data_rep = data_rep;
        pdu.body.max_xmit_frag = self.max_xmit_frag;
        pdu.body.max_recv_frag = config.max_recv_frag.min(body.max_xmit_frag);
        self.send(&Pdu::BindAck(pdu)).await
    }

    async fn on_alter_context(
        &mut self,
        call_id: u32,
        data_rep: DataRepresentation,
        body: BindBody,
    ) -> Result<()> {
        let Some(group) = self.assoc_group_id else {
            warn!("Alter context before bind, call_id={}", call_id);
            let mut fault = FaultPdu::new(call_id, nca::PROTO_ERROR).did_not_execute();
            fault.header.data_rep = data_rep;
            return self.send(&Pdu::Fault(fault)).await;
        };
        debug!(
            "Received alter context: call_id={}, contexts={}",
            call_id,
            body.context_list.len()
        );

        let results = self.server.negotiate(&body.context_list, &mut self.contexts).await;
        let mut resp = AlterContextRespPdu::new(call_id, group, results);
        resp.header.data_rep = data_rep;
        resp.body.max_xmit_frag = self.max_xmit_frag;
        resp.body.max_recv_frag = self.server.inner.config.max_recv_frag;
        self.send(&Pdu::AlterContextResp(resp)).await
    }

    async fn on_request(&mut self, request: RequestPdu) -> Result<()> {
        let call_id = request.header.call_id;
        let flags = request.header.packet_flags;

        let (request, stub) = if flags.is_first_frag() && flags.is_last_frag() {
            let stub = request.stub_data.clone();
            (request, stub)
        } else {
            let added = match self.partial.remove(&call_id) {
                Some(mut partial) => partial
                    .assembler
                    .add_fragment(&request.header, request.context_id, request.alloc_hint, &request.stub_data)
                    .map(|done| (partial, done)),
                None if self.partial.len() >= self.server.inner.config.max_partial_requests => {
                    warn!(
                        "Refusing call_id={}: {} fragmented requests already in reassembly",
                        call_id,
                        self.partial.len()
                    );
                    return self
                        .fault(call_id, request.context_id, nca::SERVER_TOO_BUSY, true)
                        .await;
                }
                None => {
                    let mut assembler = FragmentAssembler::new(call_id);
                    assembler
                        .add_fragment(&request.header, request.context_id, request.alloc_hint, &request.stub_data)
                        .map(|done| {
                            let first = RequestPdu {
                                stub_data: Bytes::new(),
                                ..request
                            };
                            (PartialRequest { assembler, first }, done)
                        })
                }
            };
            match added {
                Ok((partial, None)) => {
                    trace!("Request fragment for call_id={}", call_id);
                    self.partial.insert(call_id, partial);
                    return Ok(());
                }
                Ok((partial, Some(stub))) => (partial.first, stub),
                Err(e) => {
                    warn!("Dropping fragmented call_id={}: {}", call_id, e);
                    return self.fault(call_id, 0, nca::PROTO_ERROR, true).await;
                }
            }
        };

        debug!(
            "Received request: call_id={}, context={}, opnum={}, stub_len={}",
            call_id,
            request.context_id,
            request.opnum,
            stub.len()
        );

        let Some(bound) = self.contexts.get(&request.context_id) else {
            warn!("Request on unknown context {}", request.context_id);
            return self
                .fault(call_id, request.context_id, nca::UNK_IF, true)
                .await;
        };

        let ctx = CallContext {
            call_id,
            context_id: request.context_id,
            syntax: bound.syntax,
            object: request.object_uuid,
            ndr: request.header.data_rep.ndr_context(),
            assoc_group_id: self.assoc_group_id.unwrap_or(0),
        };
        let handle = Arc::clone(&bound.handle);
        let writer = self.writer.clone();
        let stats = Arc::clone(&self.server.inner.stats);
        let max_xmit_frag = self.max_xmit_frag as usize;
        let data_rep = request.header.data_rep;
        let opnum = request.opnum;

        tokio::spawn(async move {
            let context_id = ctx.context_id;
            let fragments = match handle.handle(ctx, opnum, stub).await {
                Ok(stub) => {
                    stats.requests_processed.fetch_add(1, Ordering::Relaxed);
                    let mut response = ResponsePdu::new(call_id, stub.unwrap_or_default());
                    response.header.data_rep = data_rep;
                    response.context_id = context_id;
                    response.fragments(max_xmit_frag)
                }
                Err(e) => {
                    stats.requests_failed.fetch_add(1, Ordering::Relaxed);
                    let status = e.fault_status();
                    match &e {
                        RpcError::NotImplemented(_) | RpcError::OperationUnavailable(_) => {
                            debug!("call_id={} opnum={}: {}", call_id, opnum, e)
                        }
                        _ => error!("Operation error: call_id={} opnum={}: {}", call_id, opnum, e),
                    }
                    let mut fault = FaultPdu::new(call_id, status);
                    fault.header.data_rep = data_rep;
                    fault.context_id = context_id;
                    fault.encode().map(|f| vec![f])
                }
            };

            let sent = match fragments {
                Ok(fragments) => {
                    let len: usize = fragments.iter().map(Bytes::len).sum();
                    stats.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
                    writer.send(fragments).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                warn!("Failed to send reply for call_id={}: {}", call_id, e);
            }
        });
        Ok(())
    }

    async fn fault(&self, call_id: u32, context_id: u16, status: u32, not_executed: bool) -> Result<()> {
        self.server
            .inner
            .stats
            .requests_failed
            .fetch_add(1, Ordering::Relaxed);
        let mut fault = FaultPdu::new(call_id, status);
        fault.context_id = context_id;
        if not_executed {
            fault = fault.did_not_execute();
        }
        self.send(&Pdu::Fault(fault)).await
    }
}
