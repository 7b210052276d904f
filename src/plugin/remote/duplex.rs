//! Send and receive loops over a byte stream pair, plus a shared close signal.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::codec::{encode, FrameDecoder};
use crate::types::{BuildgenError, CloseReason};
use crate::Result;

const READ_CHUNK: usize = 8 * 1024;

/// Records the first reason the transport closed and wakes everyone waiting on it.
#[derive(Debug, Clone)]
pub struct CloseSignal {
    tx: Arc<watch::Sender<Option<CloseReason>>>,
}

impl CloseSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Close with `reason`. Returns false if already closed; the first reason sticks.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<CloseReason> {
        self.tx.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until closed.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            if rx.changed().await.is_err() {
                return CloseReason::Shutdown;
            }
        }
    }

    pub fn error(&self) -> BuildgenError {
        BuildgenError::TransportClosed(self.reason().unwrap_or(CloseReason::EndOfStream))
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A message channel over a reader/writer pair, driven by two background loops.
///
/// Both handoffs hold a single message.
pub struct Duplex<Out, In> {
    outgoing: mpsc::Sender<Out>,
    incoming: mpsc::Receiver<In>,
    close: CloseSignal,
    loops: Vec<JoinHandle<()>>,
}

impl<Out, In> Duplex<Out, In>
where
    Out: Serialize + Send + 'static,
    In: DeserializeOwned + Send + 'static,
{
    pub fn start<R, W>(reader: R, writer: W, peer: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (in_tx, in_rx) = mpsc::channel(1);
        let close = CloseSignal::new();

        let loops = vec![
            tokio::spawn(receive_loop(reader, in_tx, close.clone(), peer.to_string())),
            tokio::spawn(send_loop(writer, out_rx, close.clone(), peer.to_string())),
        ];

        Self {
            outgoing: out_tx,
            incoming: in_rx,
            close,
            loops,
        }
    }

    pub async fn send(&self, msg: Out) -> Result<()> {
        if self.close.is_closed() {
            return Err(self.close.error());
        }
        tokio::select! {
            res = self.outgoing.send(msg) => res.map_err(|_| self.close.error()),
            reason = self.close.closed() => Err(BuildgenError::TransportClosed(reason)),
        }
    }

    pub async fn recv(&mut self) -> Result<In> {
        match self.incoming.recv().await {
            Some(msg) => Ok(msg),
            None => Err(self.close.error()),
        }
    }

    pub fn close_signal(&self) -> &CloseSignal {
        &self.close
    }

    /// True while either loop is still running.
    pub fn is_running(&self) -> bool {
        self.loops.iter().any(|h| !h.is_finished())
    }
}

impl<Out, In> Drop for Duplex<Out, In> {
    fn drop(&mut self) {
        // Both loops watch the signal and exit on their own.
        self.close.close(CloseReason::Shutdown);
    }
}

async fn receive_loop<R, In>(mut reader: R, tx: mpsc::Sender<In>, close: CloseSignal, peer: String)
where
    R: AsyncRead + Unpin,
    In: DeserializeOwned,
{
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        loop {
            match decoder.decode::<In>() {
                Ok(Some(msg)) => {
                    tokio::select! {
                        res = tx.send(msg) => {
                            if res.is_err() {
                                return;
                            }
                        }
                        _ = close.closed() => return,
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(peer = %peer, error = %e, "Unable to decode message");
                    close.close(CloseReason::Malformed(e.to_string()));
                    return;
                }
            }
        }

        let read = tokio::select! {
            res = reader.read(&mut chunk) => res,
            _ = close.closed() => return,
        };

        match read {
            Ok(0) => {
                if decoder.has_partial() {
                    tracing::error!(peer = %peer, "Stream ended inside a message");
                    close.close(CloseReason::Malformed(
                        "stream ended inside a message".to_string(),
                    ));
                } else {
                    tracing::info!(peer = %peer, "Got EOF, closing transport");
                    close.close(CloseReason::EndOfStream);
                }
                return;
            }
            Ok(n) => decoder.extend(&chunk[..n]),
            Err(e) => {
                tracing::error!(peer = %peer, error = %e, "Read failed");
                close.close(CloseReason::Io(e.to_string()));
                return;
            }
        }
    }
}

async fn send_loop<W, Out>(
    mut writer: W,
    mut rx: mpsc::Receiver<Out>,
    close: CloseSignal,
    peer: String,
) where
    W: AsyncWrite + Unpin,
    Out: Serialize,
{
    loop {
        let next = tokio::select! {
            msg = rx.recv() => msg,
            _ = close.closed() => None,
        };
        let Some(msg) = next else {
            let _ = writer.shutdown().await;
            return;
        };

        let bytes = match encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(peer = %peer, error = %e, "Unable to encode message");
                close.close(CloseReason::Malformed(e.to_string()));
                let _ = writer.shutdown().await;
                return;
            }
        };

        let written = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            tracing::error!(peer = %peer, error = %e, "Write failed");
            close.close(CloseReason::Io(e.to_string()));
            return;
        }
    }
}
