//! Header propagation rules for the receiver's response.
//!
//! Only a constrained subset of the sender's headers reaches the
//! receiver: `Content-Type`, `Content-Length` and `Content-Disposition`
//! are copied iff present exactly once on the resolved transfer headers
//! (a repeated header is ambiguous and is treated as "do not forward"),
//! and every `X-Piping` metadata value from the outer request is
//! forwarded verbatim.

use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName};
use http::HeaderValue;

/// Custom multi-value metadata header forwarded sender → receiver.
pub const METADATA_HEADER: &str = "x-piping";

/// Build the receiver response headers for a transfer.
///
/// `resolved` is the header set chosen by the body resolver (the outer
/// request's, or the first multipart part's); `request` is always the
/// outer sender request, which is where the metadata header is read
/// from. The response is built from scratch, so no stale content type
/// survives to trigger sniffing; a no-index directive and a permissive
/// cross-origin header are always present.
pub fn receiver_headers(resolved: &HeaderMap, request: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();

    forward_if_single(resolved, CONTENT_TYPE, &mut out);
    forward_if_single(resolved, CONTENT_LENGTH, &mut out);
    forward_if_single(resolved, CONTENT_DISPOSITION, &mut out);

    let metadata: Vec<HeaderValue> = request.get_all(METADATA_HEADER).iter().cloned().collect();
    for value in &metadata {
        out.append(METADATA_HEADER, value.clone());
    }

    out.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    if !metadata.is_empty() {
        out.insert(
            "access-control-expose-headers",
            HeaderValue::from_static("X-Piping"),
        );
    }
    out.insert("x-robots-tag", HeaderValue::from_static("none"));

    out
}

fn forward_if_single(src: &HeaderMap, name: HeaderName, dst: &mut HeaderMap) {
    let mut values = src.get_all(&name).iter();
    if let (Some(value), None) = (values.next(), values.next()) {
        dst.insert(name, value.clone());
    }
}
