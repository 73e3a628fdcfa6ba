//! Status words and their names
//!
//! Every response ends in a 32-bit status. Zero is success; anything
//! else is a failure reported by the remote operation. The name table
//! below only improves messages and never drives control flow.

use std::fmt;

/// HRESULT values
pub mod hresult {
    pub const S_OK: u32 = 0x0000_0000;
    pub const S_FALSE: u32 = 0x0000_0001;
    pub const E_NOTIMPL: u32 = 0x8000_4001;
    pub const E_NOINTERFACE: u32 = 0x8000_4002;
    pub const E_POINTER: u32 = 0x8000_4003;
    pub const E_ABORT: u32 = 0x8000_4004;
    pub const E_FAIL: u32 = 0x8000_4005;
    pub const E_UNEXPECTED: u32 = 0x8000_FFFF;
    pub const E_ACCESSDENIED: u32 = 0x8007_0005;
    pub const E_OUTOFMEMORY: u32 = 0x8007_000E;
    pub const E_INVALIDARG: u32 = 0x8007_0057;
    pub const DISP_E_MEMBERNOTFOUND: u32 = 0x8002_0003;
    pub const DISP_E_UNKNOWNNAME: u32 = 0x8002_0006;
    pub const DISP_E_BADINDEX: u32 = 0x8002_000B;
    pub const TYPE_E_LIBNOTREGISTERED: u32 = 0x8002_801D;
    pub const TYPE_E_WRONGTYPEKIND: u32 = 0x8002_802A;
    pub const TYPE_E_ELEMENTNOTFOUND: u32 = 0x8002_802B;
    pub const RPC_E_SERVERFAULT: u32 = 0x8001_0105;
    pub const RPC_E_DISCONNECTED: u32 = 0x8001_0108;
    pub const CO_E_OBJNOTCONNECTED: u32 = 0x8004_01FD;
}

/// NCA fault codes carried in Fault PDUs
pub mod nca {
    pub const COMM_FAILURE: u32 = 0x1C01_0001;
    pub const OP_RNG_ERROR: u32 = 0x1C01_0002;
    pub const UNK_IF: u32 = 0x1C01_0003;
    pub const WRONG_BOOT_TIME: u32 = 0x1C01_0006;
    pub const YOU_CRASHED: u32 = 0x1C01_0009;
    pub const PROTO_ERROR: u32 = 0x1C01_000B;
    pub const OUT_ARGS_TOO_BIG: u32 = 0x1C01_0013;
    pub const SERVER_TOO_BUSY: u32 = 0x1C01_0014;
    pub const UNSUPPORTED_TYPE: u32 = 0x1C01_0017;
    pub const FAULT_INT_DIV_BY_ZERO: u32 = 0x1C00_0001;
    pub const FAULT_ADDR_ERROR: u32 = 0x1C00_0002;
    pub const FAULT_CANCEL: u32 = 0x1C00_000D;
    pub const FAULT_UNSPEC: u32 = 0x1C00_0012;
    pub const FAULT_CONTEXT_MISMATCH: u32 = 0x1C00_001A;
    pub const FAULT_NDR: u32 = 0x0000_06F7;
}

/// Win32 error codes
pub mod win32 {
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_NOT_SUPPORTED: u32 = 50;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_MORE_DATA: u32 = 234;
    pub const ERROR_NO_MORE_ITEMS: u32 = 259;
    pub const RPC_S_UNKNOWN_IF: u32 = 1717;
    pub const RPC_S_SERVER_UNAVAILABLE: u32 = 1722;
    pub const RPC_S_PROCNUM_OUT_OF_RANGE: u32 = 1745;
}

const NAMES: &[(u32, &str)] = &[
    (hresult::S_FALSE, "S_FALSE"),
    (hresult::E_NOTIMPL, "E_NOTIMPL"),
    (hresult::E_NOINTERFACE, "E_NOINTERFACE"),
    (hresult::E_POINTER, "E_POINTER"),
    (hresult::E_ABORT, "E_ABORT"),
    (hresult::E_FAIL, "E_FAIL"),
    (hresult::E_UNEXPECTED, "E_UNEXPECTED"),
    (hresult::E_ACCESSDENIED, "E_ACCESSDENIED"),
    (hresult::E_OUTOFMEMORY, "E_OUTOFMEMORY"),
    (hresult::E_INVALIDARG, "E_INVALIDARG"),
    (hresult::DISP_E_MEMBERNOTFOUND, "DISP_E_MEMBERNOTFOUND"),
    (hresult::DISP_E_UNKNOWNNAME, "DISP_E_UNKNOWNNAME"),
    (hresult::DISP_E_BADINDEX, "DISP_E_BADINDEX"),
    (hresult::TYPE_E_LIBNOTREGISTERED, "TYPE_E_LIBNOTREGISTERED"),
    (hresult::TYPE_E_WRONGTYPEKIND, "TYPE_E_WRONGTYPEKIND"),
    (hresult::TYPE_E_ELEMENTNOTFOUND, "TYPE_E_ELEMENTNOTFOUND"),
    (hresult::RPC_E_SERVERFAULT, "RPC_E_SERVERFAULT"),
    (hresult::RPC_E_DISCONNECTED, "RPC_E_DISCONNECTED"),
    (hresult::CO_E_OBJNOTCONNECTED, "CO_E_OBJNOTCONNECTED"),
    (nca::COMM_FAILURE, "nca_s_comm_failure"),
    (nca::OP_RNG_ERROR, "nca_s_op_rng_error"),
    (nca::UNK_IF, "nca_s_unk_if"),
    (nca::WRONG_BOOT_TIME, "nca_s_wrong_boot_time"),
    (nca::YOU_CRASHED, "nca_s_you_crashed"),
    (nca::PROTO_ERROR, "nca_s_proto_error"),
    (nca::OUT_ARGS_TOO_BIG, "nca_s_out_args_too_big"),
    (nca::SERVER_TOO_BUSY, "nca_s_server_too_busy"),
    (nca::UNSUPPORTED_TYPE, "nca_s_unsupported_type"),
    (nca::FAULT_INT_DIV_BY_ZERO, "nca_s_fault_int_div_by_zero"),
    (nca::FAULT_ADDR_ERROR, "nca_s_fault_addr_error"),
    (nca::FAULT_CANCEL, "nca_s_fault_cancel"),
    (nca::FAULT_UNSPEC, "nca_s_fault_unspec"),
    (nca::FAULT_CONTEXT_MISMATCH, "nca_s_fault_context_mismatch"),
    (nca::FAULT_NDR, "nca_s_fault_ndr"),
    (win32::ERROR_FILE_NOT_FOUND, "ERROR_FILE_NOT_FOUND"),
    (win32::ERROR_ACCESS_DENIED, "ERROR_ACCESS_DENIED"),
    (win32::ERROR_NOT_SUPPORTED, "ERROR_NOT_SUPPORTED"),
    (win32::ERROR_INVALID_PARAMETER, "ERROR_INVALID_PARAMETER"),
    (win32::ERROR_INSUFFICIENT_BUFFER, "ERROR_INSUFFICIENT_BUFFER"),
    (win32::ERROR_MORE_DATA, "ERROR_MORE_DATA"),
    (win32::ERROR_NO_MORE_ITEMS, "ERROR_NO_MORE_ITEMS"),
    (win32::RPC_S_UNKNOWN_IF, "RPC_S_UNKNOWN_IF"),
    (win32::RPC_S_SERVER_UNAVAILABLE, "RPC_S_SERVER_UNAVAILABLE"),
    (win32::RPC_S_PROCNUM_OUT_OF_RANGE, "RPC_S_PROCNUM_OUT_OF_RANGE"),
];

/// Name of a well-known status value
pub fn describe(status: u32) -> Option<&'static str> {
    NAMES
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, name)| *name)
}

/// Whether the severity bit of an HRESULT-style status is set
pub fn is_failure(status: u32) -> bool {
    status & 0x8000_0000 != 0
}

/// Displays a status as `NAME (0x........)`, or just the hex value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u32);

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match describe(self.0) {
            Some(name) => write!(f, "{name} (0x{:08x})", self.0),
            None => write!(f, "0x{:08x}", self.0),
        }
    }
}

/// A remote operation completed with a non-zero status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op}: {}", StatusCode(*.status))]
pub struct StatusError {
    pub op: String,
    pub status: u32,
}

/// Turn an operation's status word into a result
pub fn check(op: &str, status: u32) -> Result<(), StatusError> {
    if status == 0 {
        return Ok(());
    }
    Err(StatusError {
        op: op.to_string(),
        status,
    })
}
