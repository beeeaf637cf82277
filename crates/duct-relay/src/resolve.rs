//! Transfer body resolution.
//!
//! A sender using an HTML form upload wraps its payload in a
//! `multipart/form-data` envelope. The resolver unwraps that envelope to
//! its first part, forwarding the part's own headers and body instead of
//! the outer request's, so a form upload behaves exactly like a raw
//! `curl -T` upload. Detection is best-effort: when the declared media
//! type is not multipart, or the first part cannot be read, the outer
//! request's headers and body are forwarded verbatim.
//!
//! Resolution happens once per sender request, before the rendezvous
//! wait, so an absent receiver never delays header resolution.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::body::{ByteStream, ChannelStream, RelayError, ReplayStream};

/// The header set and byte stream to forward for one transfer.
pub struct ResolvedTransfer {
    pub headers: HeaderMap,
    pub body: ByteStream,
}

/// Resolve the actual transfer headers and body for a sender request.
///
/// `request_headers` is the outer request's header set; `body` its raw
/// byte stream. See the module docs for the multipart unwrapping rules.
pub async fn resolve_transfer_body(
    request_headers: &HeaderMap,
    body: ByteStream,
) -> ResolvedTransfer {
    let boundary = request_headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok());
    let Some(boundary) = boundary else {
        return ResolvedTransfer {
            headers: request_headers.clone(),
            body,
        };
    };

    // Read the envelope through a tap that records every consumed chunk,
    // so the raw body can be reconstructed if the envelope turns out to
    // be unreadable.
    let shared = SharedSource::new(body);
    let tap = TapStream {
        shared: shared.clone(),
    };
    let (header_tx, header_rx) = oneshot::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(1);
    tokio::spawn(pump_first_part(
        multer::Multipart::new(tap, boundary),
        shared.clone(),
        header_tx,
        chunk_tx,
    ));

    match header_rx.await {
        Ok(part_headers) => ResolvedTransfer {
            headers: part_headers,
            body: Box::pin(ChannelStream::new(chunk_rx)),
        },
        Err(_) => {
            debug!("multipart envelope unreadable, forwarding raw body");
            let (replay, rest) = shared.reclaim();
            ResolvedTransfer {
                headers: request_headers.clone(),
                body: Box::pin(ReplayStream::new(replay, rest)),
            }
        }
    }
}

/// Forwards the first part's headers, then pumps its chunks.
///
/// Dropping `header_tx` without sending is the fallback signal: the
/// resolver reclaims the tapped source and forwards it verbatim.
async fn pump_first_part(
    mut multipart: multer::Multipart<'static>,
    source: SharedSource,
    header_tx: oneshot::Sender<HeaderMap>,
    chunk_tx: mpsc::Sender<Result<Bytes, RelayError>>,
) {
    let mut field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) | Err(_) => return,
    };
    if header_tx.send(field.headers().clone()).is_err() {
        return;
    }
    // The fallback branch is unreachable once the headers are delivered;
    // release the replay prefix so the transfer streams unbuffered.
    source.stop_recording();
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if chunk_tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = chunk_tx
                    .send(Err(RelayError::Source(e.to_string())))
                    .await;
                return;
            }
        }
    }
}

/// The raw body plus a record of everything read from it so far.
#[derive(Clone)]
struct SharedSource(Arc<Mutex<SourceState>>);

struct SourceState {
    stream: Option<ByteStream>,
    replay: Vec<Bytes>,
    recording: bool,
}

impl SharedSource {
    fn new(stream: ByteStream) -> Self {
        Self(Arc::new(Mutex::new(SourceState {
            stream: Some(stream),
            replay: Vec::new(),
            recording: true,
        })))
    }

    /// Take back the underlying stream and the consumed prefix. Any tap
    /// still holding this source sees end-of-stream afterwards.
    fn reclaim(&self) -> (Vec<Bytes>, Option<ByteStream>) {
        let mut state = self.0.lock().expect("source lock");
        (std::mem::take(&mut state.replay), state.stream.take())
    }

    /// Free the replay prefix and make the tap a plain passthrough.
    /// Memory held per transfer is bounded from this point on.
    fn stop_recording(&self) {
        let mut state = self.0.lock().expect("source lock");
        state.recording = false;
        state.replay = Vec::new();
    }
}

/// Reads the shared source, recording each chunk for replay until
/// recording is switched off.
struct TapStream {
    shared: SharedSource,
}

impl Stream for TapStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state = self.shared.0.lock().expect("source lock");
        let Some(stream) = state.stream.as_mut() else {
            return Poll::Ready(None);
        };
        match stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if state.recording {
                    state.replay.push(chunk.clone());
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
