//! The copy loop.
//!
//! Moves chunks from the resolved source into the receiver's response
//! body channel, one frame per chunk. The channel has capacity one, so a
//! chunk is handed to the connection before the next is read from the
//! source; hyper writes and flushes each frame as it arrives, which is
//! what gives the live-pipe latency over ordinary request/response HTTP.

use bytes::Bytes;
use http_body::Frame;
use tokio::sync::mpsc;

use crate::body::{ByteStream, RelayError, next_chunk};

/// Copy `source` into the receiver's body channel.
///
/// Returns the number of bytes relayed. Any read error from the source
/// or write error to the sink aborts the copy without retry; on a source
/// error the receiver's body is terminated with the error so its
/// connection aborts rather than ending with a clean-looking truncation.
pub async fn copy(
    mut source: ByteStream,
    sink: mpsc::Sender<Result<Frame<Bytes>, RelayError>>,
) -> Result<u64, RelayError> {
    let mut transferred = 0u64;
    loop {
        match next_chunk(&mut source).await {
            Some(Ok(chunk)) => {
                transferred += chunk.len() as u64;
                if sink.send(Ok(Frame::data(chunk))).await.is_err() {
                    return Err(RelayError::SinkClosed);
                }
            }
            Some(Err(e)) => {
                let _ = sink.send(Err(e.clone())).await;
                return Err(e);
            }
            None => return Ok(transferred),
        }
    }
}
