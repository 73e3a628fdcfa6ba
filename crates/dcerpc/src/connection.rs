//! Client connections, presentation contexts and call dispatch
//!
//! An association is one transport session. It owns the negotiated
//! presentation contexts, a writer task and a reader task that routes
//! replies to waiting calls by call id. A [`Connection`] is a
//! cheap handle onto an association, optionally scoped to one negotiated
//! abstract syntax; clones share the association.

use crate::dcerpc::{
    AlterContextPdu, BindAckBody, BindBody, BindPdu, ContextElement, ControlPdu, PacketType,
    Pdu, PduHeader, RequestPdu, SyntaxId,
};
use crate::dcerpc_transport::{PduReader, PduWriter};
use crate::error::{Result, RpcError};
use crate::fragmentation::FragmentAssembler;
use crate::operation::{decode_response, encode_request, Operation};
use crate::options::{CallOptions, CancellationToken, ClientConfig};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use midl_ndr::NdrContext;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Byte streams a connection can run over
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// Opens a new transport session to the same peer
pub type Dialer = Arc<dyn Fn() -> BoxFuture<'static, Result<BoxedStream>> + Send + Sync>;

/// Dialer for a TCP endpoint
pub fn tcp_dialer(addr: SocketAddr, connect_timeout: Option<Duration>) -> Dialer {
    Arc::new(move || -> BoxFuture<'static, Result<BoxedStream>> {
        async move {
            let stream = match connect_timeout {
                Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
                    .await
                    .map_err(|_| RpcError::Timeout)??,
                None => TcpStream::connect(addr).await?,
            };
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedStream)
        }
        .boxed()
    })
}

/// A negotiated presentation context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationContext {
    pub id: u16,
    pub syntax: SyntaxId,
}

/// The connection contract consumed by generated clients
#[async_trait]
pub trait Conn: Send + Sync {
    /// Negotiate `syntaxes` on this session and scope a handle to the first
    async fn bind(&self, syntaxes: &[SyntaxId]) -> Result<Arc<dyn Conn>>;

    /// Add presentation contexts without re-establishing the session
    async fn alter_context(&self, syntaxes: &[SyntaxId]) -> Result<()>;

    /// A connection dedicated to `syntax`, or this session when none can be had
    async fn sub_conn(&self, syntax: SyntaxId) -> Result<Arc<dyn Conn>>;

    async fn invoke(&self, op: &mut dyn Operation, opts: &CallOptions) -> Result<()>;

    /// Syntax this handle is scoped to
    fn syntax(&self) -> Option<SyntaxId>;

    /// Identifies the underlying transport session
    fn session_id(&self) -> u64;

    fn same_session(&self, other: &dyn Conn) -> bool {
        self.session_id() == other.session_id()
    }

    async fn close(&self) -> Result<()>;
}

#[derive(Debug)]
enum Reply {
    Response { stub: Bytes, ndr: NdrContext },
    Fault(u32),
    Control(Pdu),
}

struct AssocState {
    bound: bool,
    assoc_group_id: u32,
    max_xmit_frag: u16,
    contexts: Vec<PresentationContext>,
    next_context_id: u16,
}

impl AssocState {
    fn find(&self, syntax: &SyntaxId) -> Option<PresentationContext> {
        self.contexts.iter().find(|c| c.syntax == *syntax).copied()
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

struct Association {
    id: u64,
    config: ClientConfig,
    writer: PduWriter,
    pending: Mutex<HashMap<u32, oneshot::Sender<Result<Reply>>>>,
    state: Mutex<AssocState>,
    negotiation: AsyncMutex<()>,
    next_call_id: AtomicU32,
    closed: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Association {
    fn start(stream: BoxedStream, config: ClientConfig, assoc_group_id: u32) -> Arc<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = PduReader::new(read_half, config.max_pdu_size);
        // the writer task ends once the association drops its handle
        let (writer, _) = PduWriter::spawn(write_half);
        let assoc = Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            writer,
            pending: Mutex::new(HashMap::new()),
            state: Mutex::new(AssocState {
                bound: false,
                assoc_group_id,
                max_xmit_frag: config.max_xmit_frag,
                contexts: Vec::new(),
                next_context_id: 0,
            }),
            negotiation: AsyncMutex::new(()),
            next_call_id: AtomicU32::new(1),
            closed: AtomicBool::new(false),
            reader: Mutex::new(None),
            config,
        });
        let handle = tokio::spawn(read_loop(reader, Arc::downgrade(&assoc)));
        *assoc.reader.lock() = Some(handle);
        assoc
    }

    fn next_call_id(&self) -> u32 {
        self.next_call_id.fetch_add(1, Ordering::Relaxed)
    }

    fn deliver(&self, call_id: u32, reply: Result<Reply>) {
        match self.pending.lock().remove(&call_id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!("Discarding reply for abandoned call_id={}", call_id),
        }
    }

    fn fail_all(&self, reason: &RpcError) {
        self.closed.store(true, Ordering::Release);
        let pending: Vec<_> = self.pending.lock().drain().collect();
        if !pending.is_empty() {
            debug!(
                "Association {} lost ({}), failing {} pending calls",
                self.id,
                reason,
                pending.len()
            );
        }
        for (_, tx) in pending {
            let _ = tx.send(Err(RpcError::ConnectionClosed));
        }
    }

    /// Send one call's fragments and wait for its reply
    ///
    /// Dropping the future before the reply arrives unregisters the call
    /// and orphans it on the server, as timeout and cancellation do.
    async fn call(
        &self,
        call_id: u32,
        fragments: Vec<Bytes>,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Reply> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::ConnectionClosed);
        }
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(RpcError::Cancelled);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(call_id, tx);
        let _pending = PendingCall {
            assoc: self,
            call_id,
        };

        self.writer.send(fragments).await?;

        let expired = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            reply = rx => reply.unwrap_or(Err(RpcError::ConnectionClosed)),
            _ = expired => Err(RpcError::Timeout),
            _ = cancelled => Err(RpcError::Cancelled),
        }
    }

    /// Tell the server nobody is waiting for `call_id` any more
    fn orphan(&self, call_id: u32) {
        let mut pdu = ControlPdu::new(PacketType::Orphaned, call_id);
        pdu.header.data_rep = self.config.data_rep;
        match pdu.encode().and_then(|bytes| self.writer.post(vec![bytes])) {
            Ok(()) => debug!("Queued orphaned for call_id={}", call_id),
            Err(e) => debug!("Could not orphan call_id={}: {}", call_id, e),
        }
    }

    /// Make sure every syntax has an accepted presentation context
    async fn negotiate(
        &self,
        syntaxes: &[SyntaxId],
        timeout: Option<Duration>,
    ) -> Result<Vec<PresentationContext>> {
        let _guard = self.negotiation.lock().await;

        let (elements, bound, assoc_group_id) = {
            let mut state = self.state.lock();
            let mut elements: Vec<ContextElement> = Vec::new();
            for syntax in syntaxes {
                if state.find(syntax).is_some()
                    || elements.iter().any(|e| e.abstract_syntax == *syntax)
                {
                    continue;
                }
                let id = state.next_context_id;
                state.next_context_id = state.next_context_id.wrapping_add(1);
                elements.push(ContextElement::ndr(id, *syntax));
            }
            (elements, state.bound, state.assoc_group_id)
        };

        if !elements.is_empty() {
            self.propose(elements, bound, assoc_group_id, timeout).await?;
        }

        let state = self.state.lock();
        let negotiated = syntaxes
            .iter()
            .map(|syntax| {
                state.find(syntax).ok_or_else(|| {
                    RpcError::BindFailed(format!("presentation context for {syntax} was rejected"))
                })
            })
            .collect();
        negotiated
    }

    async fn propose(
        &self,
        elements: Vec<ContextElement>,
        bound: bool,
        assoc_group_id: u32,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let call_id = self.next_call_id();
        let mut body = BindBody::new(elements.clone());
        body.max_xmit_frag = self.config.max_xmit_frag;
        body.max_recv_frag = self.config.max_recv_frag;
        body.assoc_group_id = assoc_group_id;

        let packet_type = if bound {
            PacketType::AlterContext
        } else {
            PacketType::Bind
        };
        let mut header = PduHeader::new(packet_type, call_id);
        header.data_rep = self.config.data_rep;
        let encoded = if bound {
            AlterContextPdu { header, body }.encode()?
        } else {
            BindPdu { header, body }.encode()?
        };

        debug!(
            "Sending {:?}: call_id={}, contexts={}, assoc_group={:#x}",
            packet_type,
            call_id,
            elements.len(),
            assoc_group_id
        );

        let ack: BindAckBody = match self.call(call_id, vec![encoded], timeout, None).await? {
            Reply::Control(Pdu::BindAck(ack)) if !bound => ack.body,
            Reply::Control(Pdu::AlterContextResp(resp)) if bound => resp.body,
            Reply::Control(Pdu::BindNak(nak)) => return Err(RpcError::BindRejected(nak.reason)),
            Reply::Fault(status) => return Err(RpcError::Fault(status)),
            other => {
                return Err(RpcError::InvalidPduData(format!(
                    "unexpected reply to {packet_type:?}: {other:?}"
                )))
            }
        };

        if ack.results.len() != elements.len() {
            return Err(RpcError::InvalidPduData(format!(
                "{} presentation results for {} contexts",
                ack.results.len(),
                elements.len()
            )));
        }

        let mut state = self.state.lock();
        if !bound {
            state.bound = true;
            state.assoc_group_id = ack.assoc_group_id;
            if ack.max_recv_frag > 0 {
                state.max_xmit_frag = self.config.max_xmit_frag.min(ack.max_recv_frag);
            }
            debug!(
                "Bound association {}: assoc_group={:#x}, max_xmit_frag={}",
                self.id, ack.assoc_group_id, state.max_xmit_frag
            );
        }

        let mut accepted = 0;
        let mut rejection = None;
        for (elem, result) in elements.iter().zip(&ack.results) {
            if result.is_accepted() {
                accepted += 1;
                state.contexts.push(PresentationContext {
                    id: elem.context_id,
                    syntax: elem.abstract_syntax,
                });
            } else {
                warn!(
                    "Presentation context {} for {} rejected: {}",
                    elem.context_id, elem.abstract_syntax, result.reason
                );
                rejection = Some(result.reason);
            }
        }

        match rejection {
            Some(reason) if accepted == 0 => Err(RpcError::BindFailed(reason.to_string())),
            _ => Ok(()),
        }
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown of association {}: {}", self.id, e);
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.fail_all(&RpcError::ConnectionClosed);
    }
}

impl Drop for Association {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

/// Registration of an in-flight call
///
/// Removed again on drop. A call still registered at that point never
/// got its reply, so the server is told to abandon it.
struct PendingCall<'a> {
    assoc: &'a Association,
    call_id: u32,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        let abandoned = self.assoc.pending.lock().remove(&self.call_id).is_some();
        if abandoned && !self.assoc.closed.load(Ordering::Acquire) {
            self.assoc.orphan(self.call_id);
        }
    }
}

async fn read_loop(
    mut transport: PduReader<ReadHalf<BoxedStream>>,
    assoc: Weak<Association>,
) {
    let mut partial: HashMap<u32, FragmentAssembler> = HashMap::new();

    let reason = loop {
        let data = match transport.read_pdu().await {
            Ok(data) => data,
            Err(e) => break e,
        };
        let Some(assoc) = assoc.upgrade() else {
            return;
        };

        let pdu = match Pdu::decode(&data) {
            Ok(pdu) => pdu,
            Err(e) => {
                match PduHeader::decode(&data) {
                    Ok(header) => {
                        partial.remove(&header.call_id);
                        assoc.deliver(header.call_id, Err(e));
                    }
                    Err(_) => warn!("Dropping undecodable PDU: {}", e),
                }
                continue;
            }
        };

        match pdu {
            Pdu::Response(resp) => {
                let call_id = resp.header.call_id;
                let ndr = resp.header.data_rep.ndr_context();
                let flags = resp.header.packet_flags;
                let complete = if flags.is_first_frag() && flags.is_last_frag() {
                    Ok(Some(resp.stub_data))
                } else {
                    partial
                        .entry(call_id)
                        .or_insert_with(|| FragmentAssembler::new(call_id))
                        .add_fragment(
                            &resp.header,
                            resp.context_id,
                            resp.alloc_hint,
                            &resp.stub_data,
                        )
                };
                match complete {
                    Ok(Some(stub)) => {
                        partial.remove(&call_id);
                        trace!("Response for call_id={}: {} bytes", call_id, stub.len());
                        assoc.deliver(call_id, Ok(Reply::Response { stub, ndr }));
                    }
                    Ok(None) => trace!("Response fragment for call_id={}", call_id),
                    Err(e) => {
                        partial.remove(&call_id);
                        assoc.deliver(call_id, Err(e));
                    }
                }
            }
            Pdu::Fault(fault) => {
                let call_id = fault.header.call_id;
                partial.remove(&call_id);
                debug!("Fault for call_id={}: 0x{:08x}", call_id, fault.status);
                assoc.deliver(call_id, Ok(Reply::Fault(fault.status)));
            }
            pdu @ (Pdu::BindAck(_) | Pdu::BindNak(_) | Pdu::AlterContextResp(_)) => {
                assoc.deliver(pdu.call_id(), Ok(Reply::Control(pdu)));
            }
            Pdu::Shutdown(_) => {
                debug!("Server requested shutdown of association {}", assoc.id);
                break RpcError::ConnectionClosed;
            }
            other => warn!(
                "Unexpected {:?} PDU from server, call_id={}",
                other.header().packet_type,
                other.call_id()
            ),
        }
    };

    if let Some(assoc) = assoc.upgrade() {
        assoc.fail_all(&reason);
    }
}

/// Handle onto an association
#[derive(Clone)]
pub struct Connection {
    assoc: Arc<Association>,
    context: Option<PresentationContext>,
    dialer: Option<Dialer>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.assoc.id)
            .field("context", &self.context)
            .finish()
    }
}

impl Connection {
    /// Connect over TCP. The connection is unbound until `bind`.
    pub async fn connect(addr: SocketAddr, config: ClientConfig) -> Result<Self> {
        ConnectionBuilder::from_config(config).connect(addr).await
    }

    /// Run over an already-open stream. Sub-connections fall back to it.
    pub fn from_stream<S: Stream>(stream: S, config: ClientConfig) -> Self {
        ConnectionBuilder::from_config(config).from_stream(stream)
    }

    fn from_parts(stream: BoxedStream, config: ClientConfig, dialer: Option<Dialer>) -> Self {
        Self {
            assoc: Association::start(stream, config, 0),
            context: None,
            dialer,
        }
    }

    fn scoped(&self, context: PresentationContext) -> Self {
        Self {
            assoc: Arc::clone(&self.assoc),
            context: Some(context),
            dialer: self.dialer.clone(),
        }
    }

    /// Negotiate `syntaxes`, reusing contexts the session already has.
    ///
    /// The first bind on a session sends Bind; later ones send
    /// AlterContext. The result is scoped to `syntaxes[0]`.
    pub async fn bind(&self, syntaxes: &[SyntaxId]) -> Result<Connection> {
        let contexts = self
            .assoc
            .negotiate(syntaxes, self.assoc.config.call_timeout)
            .await?;
        let first = contexts
            .first()
            .copied()
            .ok_or_else(|| RpcError::BindFailed("no abstract syntax requested".to_string()))?;
        Ok(self.scoped(first))
    }

    pub async fn alter_context(&self, syntaxes: &[SyntaxId]) -> Result<()> {
        self.assoc
            .negotiate(syntaxes, self.assoc.config.call_timeout)
            .await
            .map(|_| ())
    }

    /// A connection scoped to `syntax` on its own transport session.
    ///
    /// Without a dialer, or when dialing or binding fails, the primary
    /// session is bound to `syntax` and returned instead.
    pub async fn sub_conn(&self, syntax: SyntaxId) -> Result<Connection> {
        match &self.dialer {
            Some(dialer) if self.assoc.config.dial_sub_connections => {
                match self.dial_sub(dialer, syntax).await {
                    Ok(conn) => return Ok(conn),
                    Err(e) => warn!(
                        "Sub-connection for {} unavailable, reusing primary: {}",
                        syntax, e
                    ),
                }
            }
            _ => debug!("No sub-connection dialer, binding {} on primary", syntax),
        }
        self.bind(&[syntax]).await
    }

    async fn dial_sub(&self, dialer: &Dialer, syntax: SyntaxId) -> Result<Connection> {
        let assoc_group_id = self.assoc.state.lock().assoc_group_id;
        let stream = dialer().await?;
        let conn = Self {
            assoc: Association::start(stream, self.assoc.config.clone(), assoc_group_id),
            context: None,
            dialer: Some(Arc::clone(dialer)),
        };
        match conn.bind(&[syntax]).await {
            Ok(bound) => Ok(bound),
            Err(e) => {
                conn.assoc.shutdown().await;
                Err(e)
            }
        }
    }

    /// Marshal `op`, send it on this handle's context and unmarshal the reply
    pub async fn invoke(&self, op: &mut dyn Operation, opts: &CallOptions) -> Result<()> {
        let context = self.context.ok_or_else(|| {
            RpcError::ContextMismatch(format!("{}: connection is not bound", op.name()))
        })?;

        let call_id = self.assoc.next_call_id();
        let data_rep = self.assoc.config.data_rep;
        let stub = encode_request(op, data_rep.ndr_context())?;

        let mut request = RequestPdu::new(call_id, op.opnum(), stub);
        request.header.data_rep = data_rep;
        request.context_id = context.id;
        request.object_uuid = opts.object;
        let max_xmit_frag = self.assoc.state.lock().max_xmit_frag;
        let fragments = request.fragments(max_xmit_frag as usize)?;

        debug!(
            "Invoking {}: call_id={}, opnum={}, context={}, fragments={}",
            op.name(),
            call_id,
            op.opnum(),
            context.id,
            fragments.len()
        );

        let timeout = opts.timeout.or(self.assoc.config.call_timeout);
        match self
            .assoc
            .call(call_id, fragments, timeout, opts.cancel.as_ref())
            .await?
        {
            Reply::Response { stub, ndr } => decode_response(op, stub, ndr),
            Reply::Fault(status) => Err(RpcError::Fault(status)),
            Reply::Control(pdu) => Err(RpcError::InvalidMessageType(
                pdu.header().packet_type as i32,
            )),
        }
    }

    pub fn context(&self) -> Option<PresentationContext> {
        self.context
    }

    /// Presentation contexts negotiated so far on this session
    pub fn negotiated(&self) -> Vec<PresentationContext> {
        self.assoc.state.lock().contexts.clone()
    }

    pub fn assoc_group_id(&self) -> u32 {
        self.assoc.state.lock().assoc_group_id
    }

    pub fn is_closed(&self) -> bool {
        self.assoc.closed.load(Ordering::Acquire)
    }

    /// Shut the association down; pending calls fail with `ConnectionClosed`
    pub async fn close(&self) -> Result<()> {
        self.assoc.shutdown().await;
        Ok(())
    }
}

#[async_trait]
impl Conn for Connection {
    async fn bind(&self, syntaxes: &[SyntaxId]) -> Result<Arc<dyn Conn>> {
        Ok(Arc::new(Connection::bind(self, syntaxes).await?))
    }

    async fn alter_context(&self, syntaxes: &[SyntaxId]) -> Result<()> {
        Connection::alter_context(self, syntaxes).await
    }

    async fn sub_conn(&self, syntax: SyntaxId) -> Result<Arc<dyn Conn>> {
        Ok(Arc::new(Connection::sub_conn(self, syntax).await?))
    }

    async fn invoke(&self, op: &mut dyn Operation, opts: &CallOptions) -> Result<()> {
        Connection::invoke(self, op, opts).await
    }

    fn syntax(&self) -> Option<SyntaxId> {
        self.context.map(|c| c.syntax)
    }

    fn session_id(&self) -> u64 {
        self.assoc.id
    }

    async fn close(&self) -> Result<()> {
        Connection::close(self).await
    }
}

/// Builder for client connections
pub struct ConnectionBuilder {
    config: ClientConfig,
    dialer: Option<Dialer>,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            dialer: None,
        }
    }

    pub fn max_frag(mut self, max_xmit_frag: u16, max_recv_frag: u16) -> Self {
        self.config.max_xmit_frag = max_xmit_frag;
        self.config.max_recv_frag = max_recv_frag;
        self
    }

    pub fn max_pdu_size(mut self, size: usize) -> Self {
        self.config.max_pdu_size = size;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.config.data_rep = crate::dcerpc::DataRepresentation::big_endian();
        self
    }

    pub fn dial_sub_connections(mut self, enabled: bool) -> Self {
        self.config.dial_sub_connections = enabled;
        self
    }

    /// How sub-connections reach the peer
    pub fn dialer(mut self, dialer: Dialer) -> Self {
        self.dialer = Some(dialer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn connect(self, addr: SocketAddr) -> Result<Connection> {
        let dialer = self
            .dialer
            .unwrap_or_else(|| tcp_dialer(addr, self.config.connect_timeout));
        let stream = dialer().await?;
        debug!("Connected to {}", addr);
        Ok(Connection::from_parts(stream, self.config, Some(dialer)))
    }

    pub fn from_stream<S: Stream>(self, stream: S) -> Connection {
        Connection::from_parts(Box::new(stream), self.config, self.dialer)
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
