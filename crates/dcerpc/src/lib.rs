//! Connection-oriented DCE RPC (MS-RPCE) client and server
//!
//! This crate carries NDR-encoded operations over a negotiated
//! association: presentation-context binding, call dispatch, fragment
//! reassembly and opnum routing on the server side.
//!
//! # Features
//!
//! - Layered bind: later binds extend the association with AlterContext
//! - Sub-connections per abstract syntax, falling back to the primary session
//! - Concurrent calls multiplexed on one association, matched by call id
//! - Per-call timeout and cancellation (sends Orphaned for abandoned calls)
//! - Opnum tables with base-interface delegation and reserved slots
//! - Async server and client using Tokio
//!
//! # Example
//!
//! ## Server
//!
//! ```no_run
//! use dcerpc::{DceRpcServer, InterfaceBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let interface = InterfaceBuilder::new(
//!         "12345678-1234-1234-1234-123456789012",
//!         1,
//!         0,
//!     )
//!     .unwrap()
//!     // Operation 0: echo the stub back
//!     .operation(0, |_ctx, args| async move { Ok(args) })
//!     // Operation 1: not used on the wire
//!     .reserved(1)
//!     .opnum_count(3)
//!     .build();
//!
//!     let server = DceRpcServer::new();
//!     server.register_interface(interface).await;
//!     server.run("127.0.0.1:12345".parse().unwrap()).await.unwrap();
//! }
//! ```
//!
//! ## Client
//!
//! ```no_run
//! use dcerpc::{CallOptions, ClientConfig, Connection, Operation, SyntaxId, Uuid};
//!
//! # async fn call(op: &mut dyn Operation) -> dcerpc::Result<()> {
//! let syntax = SyntaxId::new(
//!     Uuid::parse("12345678-1234-1234-1234-123456789012").unwrap(),
//!     1,
//!     0,
//! );
//! let conn = Connection::connect("127.0.0.1:12345".parse().unwrap(), ClientConfig::default())
//!     .await?
//!     .bind(&[syntax])
//!     .await?;
//! conn.invoke(op, &CallOptions::new()).await?;
//! dcerpc::status::check(op.name(), op.status()).map_err(|e| dcerpc::RpcError::Fault(e.status))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod status;

// DCE RPC modules (connection-oriented)
pub mod connection;
pub mod dcerpc;
pub mod dcerpc_server;
pub mod dcerpc_transport;
pub mod fragmentation;
pub mod operation;
pub mod options;

// Re-export error types
pub use error::{Result, RpcError};
pub use status::{StatusCode, StatusError};

// DCE RPC exports
pub use dcerpc::{
    // PDU structures
    AlterContextPdu,
    AlterContextRespPdu,
    BindAckBody,
    BindAckPdu,
    BindBody,
    BindNakPdu,
    BindPdu,
    CharRep,
    ContextElement,
    ContextResult,
    ControlPdu,
    DataRepresentation,
    FaultPdu,
    FloatRep,
    // Data representation
    IntRep,
    PacketFlags,
    PacketType,
    // PDU types
    Pdu,
    PduHeader,
    PresentationResult,
    ProviderReason,
    RejectReason,
    RequestPdu,
    ResponsePdu,
    SyntaxId,
    // Supporting types
    Uuid,
    // Constants
    DCE_RPC_VERSION,
    DCE_RPC_VERSION_MINOR,
    DEFAULT_MAX_FRAG,
    NDR_SYNTAX_UUID,
    NDR_SYNTAX_VERSION,
    NDR_TRANSFER_SYNTAX,
};
pub use connection::{
    tcp_dialer, BoxedStream, Conn, Connection, ConnectionBuilder, Dialer, PresentationContext,
    Stream,
};
pub use dcerpc_server::{
    dispatch, CallContext, DceRpcServer, DceRpcServerConfig, Interface, InterfaceBuilder,
    OperationHandler, OperationTable, ServerHandle, ServerStats, ServerStatsSnapshot,
};
pub use dcerpc_transport::{PduReader, PduWriter, DEFAULT_MAX_PDU_SIZE};
pub use fragmentation::{FragmentAssembler, DEFAULT_MAX_STUB_SIZE};
pub use operation::{decode_request, decode_response, encode_request, encode_response, Operation};
pub use options::{CallOptions, CancellationToken, ClientConfig};
