//! Stream framing for connection-oriented PDUs
//!
//! Every fragment opens with the 16-byte common header and its
//! `frag_length` covers the whole fragment, so a byte stream splits into
//! PDUs without any outer record marking. [`PduReader`] does the
//! splitting and enforces the receive limit of the association.
//! [`PduWriter`] hands outbound fragments to one task per stream: the
//! fragments of a call are written back to back even when the caller
//! stops waiting halfway.

use crate::dcerpc::{Pdu, PduHeader};
use crate::error::{Result, RpcError};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Largest fragment accepted unless configured otherwise
pub const DEFAULT_MAX_PDU_SIZE: usize = 65536;

/// Splits a byte stream into whole fragments
pub struct PduReader<R> {
    inner: R,
    buf: BytesMut,
    max_frag: usize,
}

impl<R: AsyncRead + Unpin> PduReader<R> {
    pub fn new(inner: R, max_frag: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8192),
            max_frag,
        }
    }

    pub fn max_frag(&self) -> usize {
        self.max_frag
    }

    /// Bytes received but not yet returned as a fragment
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next fragment, header included
    ///
    /// A clean end of stream between fragments is `ConnectionClosed`;
    /// one inside a fragment is an I/O error.
    pub async fn read_pdu(&mut self) -> Result<Bytes> {
        let frag_length = loop {
            if self.buf.len() >= PduHeader::SIZE {
                // decode validates the version, packet type and minimum length
                let header = PduHeader::decode(&self.buf[..PduHeader::SIZE])?;
                break header.frag_length as usize;
            }
            self.fill(PduHeader::SIZE).await?;
        };
        if frag_length > self.max_frag {
            return Err(RpcError::RecordTooLarge {
                size: frag_length,
                max: self.max_frag,
            });
        }
        while self.buf.len() < frag_length {
            self.fill(frag_length).await?;
        }
        trace!("Framed {} byte fragment", frag_length);
        Ok(self.buf.split_to(frag_length).freeze())
    }

    pub async fn read_pdu_decoded(&mut self) -> Result<Pdu> {
        let data = self.read_pdu().await?;
        Pdu::decode(&data)
    }

    async fn fill(&mut self, want: usize) -> Result<()> {
        self.buf.reserve(want.saturating_sub(self.buf.len()).max(4096));
        if self.inner.read_buf(&mut self.buf).await? > 0 {
            return Ok(());
        }
        if self.buf.is_empty() {
            Err(RpcError::ConnectionClosed)
        } else {
            Err(RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream ended {} bytes into a {} byte PDU", self.buf.len(), want),
            )))
        }
    }
}

enum Outbound {
    Frames {
        frames: Vec<Bytes>,
        done: Option<oneshot::Sender<Result<()>>>,
    },
    Shutdown(oneshot::Sender<Result<()>>),
}

/// Handle onto the task that owns the write half of a stream
///
/// Clones share the task. The task exits after the first write error,
/// after `shutdown`, or when every handle is gone.
#[derive(Clone)]
pub struct PduWriter {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl PduWriter {
    pub fn spawn<W>(inner: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(inner, rx));
        (Self { tx }, task)
    }

    /// Write the fragments of one PDU sequence and wait until they are flushed
    pub async fn send(&self, frames: Vec<Bytes>) -> Result<()> {
        let (done, written) = oneshot::channel();
        self.tx
            .send(Outbound::Frames {
                frames,
                done: Some(done),
            })
            .map_err(|_| RpcError::ConnectionClosed)?;
        written.await.unwrap_or(Err(RpcError::ConnectionClosed))
    }

    /// Queue fragments without waiting; usable where no await is possible
    pub fn post(&self, frames: Vec<Bytes>) -> Result<()> {
        self.tx
            .send(Outbound::Frames { frames, done: None })
            .map_err(|_| RpcError::ConnectionClosed)
    }

    /// Flush what is queued ahead, then shut the write half down
    pub async fn shutdown(&self) -> Result<()> {
        let (done, closed) = oneshot::channel();
        self.tx
            .send(Outbound::Shutdown(done))
            .map_err(|_| RpcError::ConnectionClosed)?;
        closed.await.unwrap_or(Err(RpcError::ConnectionClosed))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(mut inner: W, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Frames { frames, done } => {
                let result = write_frames(&mut inner, &frames).await;
                let failed = result.is_err();
                match done {
                    Some(done) => {
                        let _ = done.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            debug!("Queued write failed: {}", e);
                        }
                    }
                }
                if failed {
                    return;
                }
            }
            Outbound::Shutdown(done) => {
                let result = inner.shutdown().await.map_err(RpcError::from);
                let _ = done.send(result);
                return;
            }
        }
    }
}

async fn write_frames<W: AsyncWrite + Unpin>(inner: &mut W, frames: &[Bytes]) -> Result<()> {
    for frame in frames {
        inner.write_all(frame).await?;
    }
    inner.flush().await?;
    Ok(())
}

/// Both directions of an in-memory stream, for driving one side of a
/// conversation by hand
#[cfg(test)]
pub(crate) struct Peer {
    reader: PduReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
    writer: PduWriter,
}

#[cfg(test)]
impl Peer {
    pub(crate) fn new(stream: tokio::io::DuplexStream) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: PduReader::new(read_half, DEFAULT_MAX_PDU_SIZE),
            writer: PduWriter::spawn(write_half).0,
        }
    }

    pub(crate) async fn read_pdu(&mut self) -> Result<Bytes> {
        self.reader.read_pdu().await
    }

    pub(crate) async fn read_pdu_decoded(&mut self) -> Result<Pdu> {
        self.reader.read_pdu_decoded().await
    }

    pub(crate) async fn write_pdu(&mut self, data: &[u8]) -> Result<()> {
        self.writer.send(vec![Bytes::copy_from_slice(data)]).await
    }

    pub(crate) async fn write_pdu_encoded(&mut self, pdu: &Pdu) -> Result<()> {
        self.writer.send(vec![pdu.encode()?]).await
    }

    pub(crate) async fn write_fragments(&mut self, fragments: &[Bytes]) -> Result<()> {
        self.writer.send(fragments.to_vec()).await
    }
}
