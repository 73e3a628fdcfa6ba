//! Invocation shared by every DCOM interface client

use crate::types::{CallError, DcomError, Ipid};
use dcerpc::{status, CallOptions, Conn, Operation, Uuid};
use tracing::debug;

/// Options for constructing an interface client
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Object the client addresses when a call does not name one
    pub ipid: Option<Ipid>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ipid(mut self, ipid: Ipid) -> Self {
        self.ipid = Some(ipid);
        self
    }
}

/// Invoke `op` on `cc`, addressed to an IPID.
///
/// The IPID in `opts` wins over the client's own. With neither, the call
/// fails before any I/O. A non-zero status comes back as
/// [`CallError::Status`] carrying the decoded operation.
pub async fn invoke<O: Operation>(
    cc: &dyn Conn,
    ipid: Option<Ipid>,
    mut op: O,
    opts: &CallOptions,
) -> Result<O, CallError<O>> {
    let object = match opts.object.or(ipid.map(Uuid::from)) {
        Some(object) => object,
        None => return Err(DcomError::MissingIpid { op: op.name() }.into()),
    };
    let mut opts = opts.clone();
    opts.object = Some(object);

    debug!("ORPC {} on {}", op.name(), object);
    cc.invoke(&mut op, &opts).await?;

    match status::check(op.name(), op.status()) {
        Ok(()) => Ok(op),
        Err(status) => Err(CallError::Status {
            status,
            partial: op,
        }),
    }
}
