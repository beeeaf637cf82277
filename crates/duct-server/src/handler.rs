//! Request routing and transfer policy.
//!
//! Every inbound request is classified by method and path:
//!
//! - GET/HEAD on a reserved path → static pages
//! - GET elsewhere → receiver attach
//! - POST/PUT elsewhere → sender attach + relay
//! - OPTIONS → fixed CORS preflight
//! - anything else → 405
//!
//! [`handle`] is generic over the request body type so tests drive it
//! in-process with `http::Request` builders, no listener required.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_RANGE;
use http::{HeaderMap, Method, Request, Response};
use http_body::Frame;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use duct_core::{Pipe, Registry, Reject};
use duct_relay::body::{ChannelBody, RelayError};
use duct_relay::{ResolvedTransfer, from_body, receiver_headers, resolve_transfer_body};

use crate::pages;

/// Response body type for every route: static pages and rejections are
/// buffered, transfers stream.
pub type ResponseBody = BoxBody<Bytes, RelayError>;

/// The handle deposited by a waiting receiver: the sender side builds the
/// receiver's complete response and releases the receiver with it.
pub type ReceiverSlot = oneshot::Sender<Response<ResponseBody>>;

/// Shared server state: the path → pipe registry.
///
/// Owned per server instance so independent servers can coexist in one
/// process (and in one test binary).
pub struct ServerState {
    pub registry: Registry<ReceiverSlot>,
}

impl ServerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: Registry::new(),
        })
    }
}

pub(crate) fn full(content: impl Into<Bytes>) -> ResponseBody {
    Full::new(content.into())
        .map_err(|e: Infallible| match e {})
        .boxed()
}

/// Route one request to completion.
pub async fn handle<B>(state: Arc<ServerState>, req: Request<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    info!(method = %method, path, "request");

    if (method == Method::GET || method == Method::HEAD) && pages::is_page_path(&path) {
        return pages::serve(&path, req.uri().query(), req.headers());
    }

    if method == Method::GET {
        receiver_attach(state, req).await
    } else if method == Method::POST || method == Method::PUT {
        sender_attach(state, req).await
    } else if method == Method::OPTIONS {
        preflight()
    } else {
        reject(&Reject::MethodNotSupported {
            method: method.as_str().to_string(),
        })
    }
}

fn reject(cause: &Reject) -> Response<ResponseBody> {
    Response::builder()
        .status(cause.status())
        .header("access-control-allow-origin", "*")
        .header("content-type", "text/plain; charset=utf-8")
        .body(full(cause.to_string()))
        .unwrap()
}

/// Fixed CORS preflight answer; no pipe interaction.
fn preflight() -> Response<ResponseBody> {
    Response::builder()
        .status(200)
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-methods", "GET, HEAD, POST, PUT, OPTIONS")
        .header(
            "access-control-allow-headers",
            "Content-Type, Content-Disposition, X-Piping",
        )
        .header("access-control-max-age", "86400")
        .header("content-length", "0")
        .body(full(Bytes::new()))
        .unwrap()
}

/// Attach a receiver: claim the slot, deposit the response handle, then
/// suspend until the paired sender releases it. No timeout; an abandoned
/// receiver waits until its transport connection is torn down.
async fn receiver_attach<B>(state: Arc<ServerState>, req: Request<B>) -> Response<ResponseBody> {
    // A path hijacked to serve an installable service-worker script would
    // turn the relay into a persistent origin-wide attack surface.
    if req
        .headers()
        .get("service-worker")
        .is_some_and(|v| v.as_bytes() == b"script")
    {
        return reject(&Reject::ServiceWorkerRejected);
    }

    let path = req.uri().path();
    let pipe = state.registry.get_or_create(path);

    let (sink, response_rx) = oneshot::channel();
    if pipe.offer_receiver(sink).is_err() {
        return reject(&Reject::ReceiverSlotFull);
    }
    debug!(path, "receiver waiting");

    match response_rx.await {
        Ok(response) => response,
        Err(_) => Response::builder()
            .status(500)
            .header("access-control-allow-origin", "*")
            .body(full("Internal Server Error"))
            .unwrap(),
    }
}

/// Attach a sender: enforce the upload policies, claim the sender role,
/// resolve the transfer body, then hand the relay off to a task and
/// answer immediately with a streaming progress body.
async fn sender_attach<B>(state: Arc<ServerState>, req: Request<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: std::fmt::Display,
{
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();

    if pages::is_reserved(&path) {
        return reject(&Reject::PathReserved { path });
    }
    if req.headers().contains_key(CONTENT_RANGE) {
        return reject(&Reject::RangeUnsupported { method });
    }

    let pipe = state.registry.get_or_create(&path);
    if !pipe.try_claim_sender() {
        return reject(&Reject::SenderAlreadyConnected { path });
    }

    let (parts, body) = req.into_parts();
    let resolved = resolve_transfer_body(&parts.headers, from_body(body)).await;

    let (progress_tx, progress_body) = duct_relay::channel(4);
    tokio::spawn(run_transfer(
        state,
        path,
        pipe,
        parts.headers,
        resolved,
        progress_tx,
    ));

    Response::builder()
        .status(200)
        .header("access-control-allow-origin", "*")
        .body(progress_body.boxed())
        .unwrap()
}

/// Drive one transfer: rendezvous, release the receiver with its
/// response, then pump bytes until the source ends or either side fails.
async fn run_transfer(
    state: Arc<ServerState>,
    path: String,
    pipe: Arc<Pipe<ReceiverSlot>>,
    request_headers: HeaderMap,
    resolved: ResolvedTransfer,
    progress: mpsc::Sender<Result<Frame<Bytes>, RelayError>>,
) {
    if send_line(&progress, "[INFO] Waiting for 1 receiver(s)...\n")
        .await
        .is_err()
    {
        return;
    }

    let Some(sink) = pipe.take_receiver().await else {
        return;
    };

    if send_line(&progress, "[INFO] A receiver was connected.\n")
        .await
        .is_err()
    {
        return;
    }
    if send_line(&progress, "[INFO] Start sending to 1 receiver(s)!\n")
        .await
        .is_err()
    {
        return;
    }

    pipe.begin_transfer();

    let (body_tx, receiver_body) = duct_relay::channel(1);
    let mut response = Response::new(wrap_channel_body(receiver_body));
    *response.headers_mut() = receiver_headers(&resolved.headers, &request_headers);

    if sink.send(response).is_err() {
        warn!(path, "receiver disappeared before the transfer started");
        return;
    }

    match duct_relay::relay::copy(resolved.body, body_tx).await {
        Ok(bytes) => {
            let _ = send_line(&progress, "[INFO] Sent successfully!\n").await;
            info!(path, bytes, "transfer finished");
            state.registry.remove(&path);
        }
        Err(e) => {
            // The pipe entry stays registered: the path is burned for
            // this generation, matching the historical semantics.
            warn!(path, error = %e, "transfer aborted");
        }
    }
}

fn wrap_channel_body(body: ChannelBody) -> ResponseBody {
    body.boxed()
}

async fn send_line(
    tx: &mpsc::Sender<Result<Frame<Bytes>, RelayError>>,
    line: &'static str,
) -> Result<(), ()> {
    tx.send(Ok(Frame::data(Bytes::from_static(line.as_bytes()))))
        .await
        .map_err(|_| ())
}
