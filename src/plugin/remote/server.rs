//! Plugin side of the protocol: answer requests for an [`Analyzer`] until end of stream.
//!
//! Requests are handled strictly in order, one response per request, so a
//! response is always flushed before the next request is read.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::codec::{encode, FrameDecoder};
use super::protocol::{Envelope, Request, Response, PROTOCOL_VERSION};
use crate::plugin::Analyzer;
use crate::types::{BuildgenError, CloseReason};
use crate::Result;

/// Serve `analyzer` over `reader`/`writer`.
///
/// Returns `Ok(EndOfStream)` once the host closes its side cleanly. Malformed
/// input or an I/O failure ends the loop with `TransportClosed`.
pub async fn serve<A, R, W>(analyzer: &A, mut reader: R, mut writer: W) -> Result<CloseReason>
where
    A: Analyzer + ?Sized,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; 8 * 1024];
    let mut handled = 0usize;

    loop {
        loop {
            let envelope = match decoder.decode::<Envelope<Request>>() {
                Ok(Some(envelope)) => envelope,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(
                        plugin = analyzer.name(),
                        error = %e,
                        "Unable to decode request"
                    );
                    return Err(BuildgenError::TransportClosed(CloseReason::Malformed(
                        e.to_string(),
                    )));
                }
            };

            let response = if envelope.version != PROTOCOL_VERSION {
                Response::Error {
                    message: format!(
                        "unsupported protocol version {} (expected {})",
                        envelope.version, PROTOCOL_VERSION
                    ),
                }
            } else {
                handle(analyzer, envelope.body).await
            };

            let bytes = encode(&Envelope::new(envelope.id, response))?;
            if let Err(e) = write_frame(&mut writer, &bytes).await {
                return Err(BuildgenError::TransportClosed(CloseReason::Io(
                    e.to_string(),
                )));
            }
            handled += 1;
        }

        match reader.read(&mut chunk).await {
            Ok(0) => {
                if decoder.has_partial() {
                    return Err(BuildgenError::TransportClosed(CloseReason::Malformed(
                        "stream ended inside a message".to_string(),
                    )));
                }
                tracing::info!(plugin = analyzer.name(), handled, "Got EOF, exiting");
                let _ = writer.shutdown().await;
                return Ok(CloseReason::EndOfStream);
            }
            Ok(n) => decoder.extend(&chunk[..n]),
            Err(e) => {
                return Err(BuildgenError::TransportClosed(CloseReason::Io(
                    e.to_string(),
                )))
            }
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

async fn handle<A: Analyzer + ?Sized>(analyzer: &A, request: Request) -> Response {
    let op = request.op();
    let result = match request {
        Request::Kinds => analyzer.kinds().await.map(Response::Kinds),
        Request::Redirects => analyzer.redirects().await.map(Response::Redirects),
        Request::GenerateRules(args) => analyzer
            .generate_rules(&args)
            .await
            .map(Response::GenerateRules),
        Request::IndexedReferences { rule, rel } => analyzer
            .indexed_references(&rule, &rel)
            .await
            .map(Response::IndexedReferences),
        Request::ExtractReferences { rule } => analyzer
            .extract_references(&rule)
            .await
            .map(Response::ExtractReferences),
        Request::ApplyResolutions {
            rule,
            resolved,
            from,
        } => analyzer
            .apply_resolutions(rule, resolved, &from)
            .await
            .map(Response::ApplyResolutions),
    };

    result.unwrap_or_else(|e| {
        tracing::warn!(plugin = analyzer.name(), op, error = %e, "Request failed");
        Response::Error {
            message: e.to_string(),
        }
    })
}
