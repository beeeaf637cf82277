//! Byte-stream primitives.
//!
//! The relay deals in [`ByteStream`]s: type-erased, fallible async streams
//! of `Bytes` chunks. Adapters here bridge the two HTTP exchanges: a
//! request body becomes a `ByteStream` ([`from_body`]), and a `ByteStream`
//! drains into a receiver's response through a channel-backed
//! [`ChannelBody`], one frame per chunk.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use http_body::{Body, Frame};
use thiserror::Error;
use tokio::sync::mpsc;

/// A type-erased, fallible async stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

/// Error observed while relaying bytes.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// The sender's body stream failed mid-read.
    #[error("failed to read the transfer source: {0}")]
    Source(String),

    /// The receiver stopped consuming its response body.
    #[error("receiver disconnected")]
    SinkClosed,
}

/// Await the next chunk of a [`ByteStream`].
pub async fn next_chunk(stream: &mut ByteStream) -> Option<Result<Bytes, RelayError>> {
    std::future::poll_fn(|cx| stream.as_mut().poll_next(cx)).await
}

/// Adapt an `http_body::Body` into a [`ByteStream`].
///
/// Trailer frames are skipped; body errors surface as
/// [`RelayError::Source`].
pub fn from_body<B>(body: B) -> ByteStream
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: std::fmt::Display,
{
    Box::pin(BodySource { body })
}

struct BodySource<B> {
    body: B,
}

impl<B> Stream for BodySource<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    type Item = Result<Bytes, RelayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.body).poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                    Ok(chunk) => return Poll::Ready(Some(Ok(chunk))),
                    // Trailers; keep polling.
                    Err(_) => continue,
                },
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(RelayError::Source(e.to_string()))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Create a channel-backed response body of the given capacity.
///
/// The relay sends one frame per source chunk; capacity one means each
/// chunk is handed to the connection before the next is read, which is
/// what keeps delivery flush-per-write rather than buffered.
pub fn channel(capacity: usize) -> (mpsc::Sender<Result<Frame<Bytes>, RelayError>>, ChannelBody) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ChannelBody { rx })
}

/// An `http_body::Body` fed through an mpsc channel.
///
/// The body ends when every sender handle is dropped; an `Err` item
/// aborts the response mid-stream.
pub struct ChannelBody {
    rx: mpsc::Receiver<Result<Frame<Bytes>, RelayError>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = RelayError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Yields a buffered prefix, then drains an underlying stream.
///
/// Used by the resolver's multipart fallback to put already-consumed
/// bytes back in front of the remainder, and handy for building fixed
/// sources in tests (`rest = None`).
pub struct ReplayStream {
    replay: VecDeque<Bytes>,
    rest: Option<ByteStream>,
}

impl ReplayStream {
    pub fn new(replay: Vec<Bytes>, rest: Option<ByteStream>) -> Self {
        Self {
            replay: replay.into(),
            rest,
        }
    }
}

impl Stream for ReplayStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(chunk) = this.replay.pop_front() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        match this.rest.as_mut() {
            Some(rest) => rest.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

/// A [`ByteStream`] fed through an mpsc channel.
pub struct ChannelStream {
    rx: mpsc::Receiver<Result<Bytes, RelayError>>,
}

impl ChannelStream {
    pub fn new(rx: mpsc::Receiver<Result<Bytes, RelayError>>) -> Self {
        Self { rx }
    }
}

impl Stream for ChannelStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
