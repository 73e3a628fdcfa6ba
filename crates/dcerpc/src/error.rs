//! Error types for DCE RPC

use crate::dcerpc::RejectReason;
use midl_ndr::NdrError;
use thiserror::Error;

/// RPC error types
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NDR error: {0}")]
    Ndr(#[from] NdrError),

    #[error("RPC version mismatch: {0}")]
    RpcVersionMismatch(u32),

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    /// Opnum outside the interface's defined range
    #[error("operation unavailable: {0}")]
    OperationUnavailable(u16),

    /// Opnum inside the range but without a handler
    #[error("operation {0} not implemented")]
    NotImplemented(u16),

    #[error("invalid PDU: {0}")]
    InvalidPduData(String),

    #[error("invalid message type: {0}")]
    InvalidMessageType(i32),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,

    #[error("call cancelled")]
    Cancelled,

    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("bind rejected: {0}")]
    BindRejected(RejectReason),

    #[error("fault: {}", crate::status::StatusCode(*.0))]
    Fault(u32),

    #[error("no presentation context negotiated for {0}")]
    ContextMismatch(String),

    #[error("PDU too large: {size} bytes exceeds maximum {max}")]
    PduTooLarge { size: usize, max: usize },

    #[error("record too large: {size} bytes exceeds maximum {max}")]
    RecordTooLarge { size: usize, max: usize },

    #[error("task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl RpcError {
    /// Fault status a server reports for this error
    pub fn fault_status(&self) -> u32 {
        use crate::status::{hresult, nca};
        match self {
            RpcError::OperationUnavailable(_) => nca::OP_RNG_ERROR,
            RpcError::NotImplemented(_) => hresult::E_NOTIMPL,
            RpcError::InterfaceNotFound(_) | RpcError::ContextMismatch(_) => nca::UNK_IF,
            RpcError::Ndr(_) => nca::FAULT_NDR,
            RpcError::Cancelled => nca::FAULT_CANCEL,
            RpcError::Fault(status) => *status,
            _ => nca::FAULT_UNSPEC,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
