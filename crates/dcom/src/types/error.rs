//! DCOM error types

use dcerpc::StatusError;
use midl_ndr::NdrError;
use thiserror::Error;

/// Result type for DCOM operations
pub type Result<T> = std::result::Result<T, DcomError>;

/// DCOM-specific errors
#[derive(Error, Debug)]
pub enum DcomError {
    /// Underlying DCE RPC error
    #[error("DCE RPC error: {0}")]
    Rpc(#[from] dcerpc::RpcError),

    #[error("NDR error: {0}")]
    Ndr(#[from] NdrError),

    /// A call was attempted with no IPID on the client or in the call options
    #[error("{op}: ipid is missing")]
    MissingIpid { op: &'static str },

    /// The remote method returned a failure status
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Outcome of a client call, keeping the response on status failures
pub type CallResult<T> = std::result::Result<T, CallError<T>>;

/// Failure of a client call.
///
/// A non-zero status still comes with the decoded response, so callers
/// that need the partial output (counts, enumeration cursors) get it.
#[derive(Error, Debug)]
pub enum CallError<T> {
    #[error("{status}")]
    Status { status: StatusError, partial: T },

    #[error(transparent)]
    Dcom(#[from] DcomError),
}

impl<T> CallError<T> {
    /// Status word, when the call got far enough to have one
    pub fn status(&self) -> Option<u32> {
        match self {
            CallError::Status { status, .. } => Some(status.status),
            CallError::Dcom(DcomError::Status(status)) => Some(status.status),
            CallError::Dcom(_) => None,
        }
    }

    /// The decoded response of a call that returned a failure status
    pub fn partial(&self) -> Option<&T> {
        match self {
            CallError::Status { partial, .. } => Some(partial),
            CallError::Dcom(_) => None,
        }
    }

    pub fn into_partial(self) -> Option<T> {
        match self {
            CallError::Status { partial, .. } => Some(partial),
            CallError::Dcom(_) => None,
        }
    }

    pub fn map_partial<U>(self, f: impl FnOnce(T) -> U) -> CallError<U> {
        match self {
            CallError::Status { status, partial } => CallError::Status {
                status,
                partial: f(partial),
            },
            CallError::Dcom(e) => CallError::Dcom(e),
        }
    }

    /// Drop the partial response
    pub fn into_dcom(self) -> DcomError {
        match self {
            CallError::Status { status, .. } => DcomError::Status(status),
            CallError::Dcom(e) => e,
        }
    }
}

impl<T> From<dcerpc::RpcError> for CallError<T> {
    fn from(e: dcerpc::RpcError) -> Self {
        CallError::Dcom(DcomError::Rpc(e))
    }
}

/// HRESULT codes commonly used in DCOM
pub use dcerpc::status::hresult;
