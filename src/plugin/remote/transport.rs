//! Client side of the plugin protocol: one outstanding call at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use super::duplex::{CloseSignal, Duplex};
use super::protocol::{Envelope, Request, Response, PROTOCOL_VERSION};
use crate::types::{BuildgenError, CloseReason};
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Name used in logs.
    pub peer: String,
    /// Give up on a call after this long and close the transport. `None` waits forever.
    pub call_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    AwaitingResponse,
    Closed,
}

pub struct RemoteTransport {
    /// Held for the whole send/receive exchange, so calls never interleave.
    duplex: Mutex<Duplex<Envelope<Request>, Envelope<Response>>>,
    close: CloseSignal,
    next_id: AtomicU64,
    config: TransportConfig,
}

impl RemoteTransport {
    pub fn new<R, W>(reader: R, writer: W, config: TransportConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let duplex = Duplex::start(reader, writer, &config.peer);
        let close = duplex.close_signal().clone();
        Self {
            duplex: Mutex::new(duplex),
            close,
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Send `request` and wait for its response.
    ///
    /// Concurrent callers are queued behind the one in flight.
    pub async fn call(&self, request: Request) -> Result<Response> {
        let mut duplex = self.duplex.lock().await;
        if let Some(reason) = self.close.reason() {
            return Err(BuildgenError::TransportClosed(reason));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op = request.op();
        tracing::debug!(peer = %self.config.peer, id, op, "Sending request");

        duplex.send(Envelope::new(id, request)).await?;

        let envelope = match self.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, duplex.recv()).await {
                Ok(received) => received?,
                Err(_) => {
                    let reason = CloseReason::TimedOut {
                        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    };
                    tracing::warn!(peer = %self.config.peer, id, op, "Plugin call timed out");
                    self.close.close(reason);
                    return Err(self.close.error());
                }
            },
            None => duplex.recv().await?,
        };

        if envelope.version != PROTOCOL_VERSION {
            return Err(self.poison(format!(
                "unsupported protocol version {} (expected {})",
                envelope.version, PROTOCOL_VERSION
            )));
        }
        if envelope.id != id {
            return Err(self.poison(format!(
                "response id {} does not match request id {}",
                envelope.id, id
            )));
        }

        tracing::debug!(peer = %self.config.peer, id, op = envelope.body.op(), "Got response");
        Ok(envelope.body)
    }

    pub fn state(&self) -> TransportState {
        if self.close.is_closed() {
            TransportState::Closed
        } else if self.duplex.try_lock().is_err() {
            TransportState::AwaitingResponse
        } else {
            TransportState::Idle
        }
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close.reason()
    }

    /// Wait until the transport closes.
    pub async fn closed(&self) -> CloseReason {
        self.close.closed().await
    }

    /// Close the transport. The peer sees end of stream on its input.
    pub fn close(&self) {
        self.close.close(CloseReason::Shutdown);
    }

    fn poison(&self, message: String) -> BuildgenError {
        tracing::error!(peer = %self.config.peer, "{}", message);
        self.close.close(CloseReason::Malformed(message.clone()));
        BuildgenError::MalformedMessage(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::remote::codec::{encode, FrameDecoder};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Raw peer for driving the transport byte by byte.
    struct Peer {
        stream: DuplexStream,
        decoder: FrameDecoder,
    }

    impl Peer {
        async fn next_request(&mut self) -> Envelope<Request> {
            let mut chunk = [0u8; 1024];
            loop {
                if let Some(msg) = self.decoder.decode().unwrap() {
                    return msg;
                }
                let n = self.stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "transport closed its output");
                self.decoder.extend(&chunk[..n]);
            }
        }

        async fn reply(&mut self, id: u64, body: Response) {
            let bytes = encode(&Envelope::new(id, body)).unwrap();
            self.stream.write_all(&bytes).await.unwrap();
        }

        async fn write_raw(&mut self, bytes: &[u8]) {
            self.stream.write_all(bytes).await.unwrap();
        }
    }

    fn connect(call_timeout: Option<Duration>) -> (RemoteTransport, Peer) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (r, w) = tokio::io::split(near);
        let transport = RemoteTransport::new(
            r,
            w,
            TransportConfig {
                peer: "test".into(),
                call_timeout,
            },
        );
        (
            transport,
            Peer {
                stream: far,
                decoder: FrameDecoder::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_one_response_per_request() {
        let (transport, mut peer) = connect(None);
        assert_eq!(transport.state(), TransportState::Idle);

        let server = tokio::spawn(async move {
            for _ in 0..2 {
                let req = peer.next_request().await;
                assert_eq!(req.body, Request::Kinds);
                peer.reply(req.id, Response::Kinds(Default::default())).await;
            }
            peer
        });

        assert_eq!(
            transport.call(Request::Kinds).await.unwrap(),
            Response::Kinds(Default::default())
        );
        assert_eq!(
            transport.call(Request::Kinds).await.unwrap(),
            Response::Kinds(Default::default())
        );
        assert_eq!(transport.state(), TransportState::Idle);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_fails_pending_and_future_calls() {
        let (transport, mut peer) = connect(None);

        let server = tokio::spawn(async move {
            let _ = peer.next_request().await;
            drop(peer);
        });

        let err = transport.call(Request::Kinds).await.unwrap_err();
        assert!(matches!(
            err,
            BuildgenError::TransportClosed(CloseReason::EndOfStream)
        ));
        server.await.unwrap();

        assert_eq!(transport.state(), TransportState::Closed);
        let again = transport.call(Request::Kinds).await.unwrap_err();
        assert!(matches!(again, BuildgenError::TransportClosed(_)));
        assert_eq!(transport.close_reason(), Some(CloseReason::EndOfStream));
        assert!(!transport.close_reason().unwrap().is_error());
    }

    #[tokio::test]
    async fn test_malformed_input_closes_with_error() {
        let (transport, mut peer) = connect(None);

        let server = tokio::spawn(async move {
            let _ = peer.next_request().await;
            peer.write_raw(b"Gazelle Listener loop\n").await;
            peer
        });

        let err = transport.call(Request::Kinds).await.unwrap_err();
        match err {
            BuildgenError::TransportClosed(CloseReason::Malformed(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(transport.close_reason().unwrap().is_error());
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_id_poisons_transport() {
        let (transport, mut peer) = connect(None);

        let server = tokio::spawn(async move {
            let req = peer.next_request().await;
            peer.reply(req.id + 41, Response::Kinds(Default::default()))
                .await;
            peer
        });

        let err = transport.call(Request::Kinds).await.unwrap_err();
        assert!(matches!(err, BuildgenError::MalformedMessage(_)));
        assert_eq!(transport.state(), TransportState::Closed);
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_version_poisons_transport() {
        let (transport, mut peer) = connect(None);

        let server = tokio::spawn(async move {
            let req = peer.next_request().await;
            let raw = format!(r#"{{"version":99,"id":{},"body":{{"kinds":{{}}}}}}"#, req.id);
            peer.write_raw(raw.as_bytes()).await;
            peer
        });

        let err = transport.call(Request::Kinds).await.unwrap_err();
        assert!(matches!(err, BuildgenError::MalformedMessage(_)));
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_closes_transport() {
        let (transport, mut peer) = connect(Some(Duration::from_millis(50)));

        let server = tokio::spawn(async move {
            let _ = peer.next_request().await;
            // Never answer.
            peer
        });

        let err = transport.call(Request::Kinds).await.unwrap_err();
        assert!(matches!(
            err,
            BuildgenError::TransportClosed(CloseReason::TimedOut { after_ms: 50 })
        ));
        assert_eq!(transport.state(), TransportState::Closed);
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let (transport, mut peer) = connect(None);
        let transport = Arc::new(transport);

        let server = tokio::spawn(async move {
            for _ in 0..4 {
                let req = peer.next_request().await;
                let Request::ExtractReferences { rule } = req.body else {
                    panic!("unexpected request");
                };
                tokio::time::sleep(Duration::from_millis(5)).await;
                let echo = vec![crate::types::ImportSpec::new("test", rule.name)];
                peer.reply(req.id, Response::ExtractReferences(echo)).await;
            }
        });

        let mut handles = Vec::new();
        for i in 0..4 {
            let transport = transport.clone();
            handles.push(tokio::spawn(async move {
                let rule = crate::types::GeneratedRule::new("k", format!("r{}", i));
                let resp = transport
                    .call(Request::ExtractReferences { rule })
                    .await
                    .unwrap();
                (i, resp)
            }));
        }

        for handle in handles {
            let (i, resp) = handle.await.unwrap();
            match resp {
                Response::ExtractReferences(specs) => assert_eq!(specs[0].imp, format!("r{}", i)),
                other => panic!("unexpected {:?}", other),
            }
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_seen_by_peer() {
        let (transport, mut peer) = connect(None);
        transport.close();
        assert_eq!(transport.closed().await, CloseReason::Shutdown);

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(1), peer.stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
        assert!(matches!(
            transport.call(Request::Kinds).await,
            Err(BuildgenError::TransportClosed(CloseReason::Shutdown))
        ));
    }
}
