//! Client configuration and per-call options

use crate::dcerpc::{DataRepresentation, Uuid, DEFAULT_MAX_FRAG};
use crate::dcerpc_transport::DEFAULT_MAX_PDU_SIZE;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cooperative cancellation shared between a caller and its calls.
///
/// Clones observe the same state; cancelling any clone cancels all.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow_and_update() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for one `invoke`
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the connection's call timeout
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
    /// Object UUID sent with the request (the IPID for DCOM calls)
    pub object: Option<Uuid>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_object(mut self, object: impl Into<Uuid>) -> Self {
        self.object = Some(object.into());
        self
    }
}

/// Connection-wide settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    /// Largest inbound PDU accepted from the peer
    pub max_pdu_size: usize,
    pub data_rep: DataRepresentation,
    pub connect_timeout: Option<Duration>,
    /// Default timeout for bind, alter-context and invoke
    pub call_timeout: Option<Duration>,
    /// Open a separate transport session per `sub_conn` syntax
    pub dial_sub_connections: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            data_rep: DataRepresentation::ndr(),
            connect_timeout: Some(Duration::from_secs(30)),
            call_timeout: None,
            dial_sub_connections: true,
        }
    }
}
