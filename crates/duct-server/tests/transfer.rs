//! End-to-end transfer tests.
//!
//! Drives the router in-process: requests are built with `http::Request`
//! and handed straight to `handle`, the same way the daemon's hyper
//! service does. Receiver responses stream, so their bodies are collected
//! with `BodyExt::collect`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use tokio::time::sleep;

use duct_server::handler::{ResponseBody, ServerState, handle};

fn empty_req(method: &str, uri: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::default())
        .unwrap()
}

fn post(uri: &str, body: &'static str) -> Request<Full<Bytes>> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/plain")
        .header("content-length", body.len().to_string())
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

async fn body_string(resp: Response<ResponseBody>) -> String {
    let collected = resp.into_body().collect().await.unwrap();
    String::from_utf8(collected.to_bytes().to_vec()).unwrap()
}

#[tokio::test]
async fn round_trip_receiver_first() {
    let state = ServerState::new();

    let receiver = {
        let state = state.clone();
        tokio::spawn(async move { handle(state, empty_req("GET", "/p")).await })
    };
    sleep(Duration::from_millis(50)).await;

    let sender_resp = handle(state.clone(), post("/p", "hello")).await;
    assert_eq!(sender_resp.status(), 200);
    assert_eq!(
        sender_resp
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );

    let receiver_resp = receiver.await.unwrap();
    assert_eq!(receiver_resp.status(), 200);
    assert_eq!(
        receiver_resp.headers().get("content-type").unwrap(),
        "text/plain"
    );
    assert_eq!(receiver_resp.headers().get("content-length").unwrap(), "5");
    assert_eq!(receiver_resp.headers().get("x-robots-tag").unwrap(), "none");
    assert_eq!(body_string(receiver_resp).await, "hello");

    let progress = body_string(sender_resp).await;
    assert!(progress.contains("[INFO] Waiting for 1 receiver(s)..."));
    assert!(progress.contains("[INFO] Sent successfully!"));
}

#[tokio::test]
async fn round_trip_sender_first() {
    let state = ServerState::new();

    let sender_resp = handle(state.clone(), post("/p", "hello")).await;
    assert_eq!(sender_resp.status(), 200);
    sleep(Duration::from_millis(50)).await;

    let receiver_resp = handle(state.clone(), empty_req("GET", "/p")).await;
    assert_eq!(receiver_resp.status(), 200);
    assert_eq!(body_string(receiver_resp).await, "hello");
}

#[tokio::test]
async fn second_receiver_is_rejected() {
    let state = ServerState::new();

    let _first = {
        let state = state.clone();
        tokio::spawn(async move { handle(state, empty_req("GET", "/p")).await })
    };
    sleep(Duration::from_millis(50)).await;

    let second = handle(state.clone(), empty_req("GET", "/p")).await;
    assert_eq!(second.status(), 400);
    assert_eq!(
        body_string(second).await,
        "[ERROR] The number of receivers has reached limits.\n"
    );
}

#[tokio::test]
async fn second_sender_is_rejected() {
    let state = ServerState::new();

    let first = handle(state.clone(), post("/p", "data")).await;
    assert_eq!(first.status(), 200);

    let second = handle(state.clone(), post("/p", "data")).await;
    assert_eq!(second.status(), 400);
    assert_eq!(
        body_string(second).await,
        "[ERROR] Another sender has been connected on '/p'.\n"
    );
}

#[tokio::test]
async fn upload_to_reserved_path_is_rejected() {
    let state = ServerState::new();

    for path in ["/", "/version", "/help", "/noscript", "/favicon.ico", "/robots.txt"] {
        let resp = handle(state.clone(), post(path, "data")).await;
        assert_eq!(resp.status(), 400, "{path}");
        assert!(body_string(resp).await.contains("reserved path"));
    }
}

#[tokio::test]
async fn content_range_is_rejected_regardless_of_path() {
    let state = ServerState::new();

    let req = Request::builder()
        .method("PUT")
        .uri("/p")
        .header("content-range", "bytes 0-3/4")
        .body(Full::new(Bytes::from_static(b"data")))
        .unwrap();

    let resp = handle(state.clone(), req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(
        body_string(resp).await,
        "[ERROR] Content-Range is not supported for now in PUT\n"
    );
}

#[tokio::test]
async fn service_worker_registration_is_rejected() {
    let state = ServerState::new();

    let req = Request::builder()
        .method("GET")
        .uri("/p")
        .header("service-worker", "script")
        .body(Full::<Bytes>::default())
        .unwrap();

    let resp = handle(state.clone(), req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(
        body_string(resp).await,
        "[ERROR] Service Worker registration is rejected.\n"
    );
}

#[tokio::test]
async fn options_preflight_on_any_path() {
    let state = ServerState::new();

    for path in ["/p", "/", "/version"] {
        let resp = handle(state.clone(), empty_req("OPTIONS", path)).await;
        assert_eq!(resp.status(), 200, "{path}");
        assert_eq!(
            resp.headers().get("access-control-allow-methods").unwrap(),
            "GET, HEAD, POST, PUT, OPTIONS"
        );
        assert_eq!(
            resp.headers().get("access-control-allow-headers").unwrap(),
            "Content-Type, Content-Disposition, X-Piping"
        );
        assert_eq!(resp.headers().get("access-control-max-age").unwrap(), "86400");
    }
}

#[tokio::test]
async fn unsupported_method_is_rejected() {
    let state = ServerState::new();

    let resp = handle(state.clone(), empty_req("PATCH", "/p")).await;
    assert_eq!(resp.status(), 405);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert_eq!(body_string(resp).await, "[ERROR] Unsupported method: PATCH.\n");
}

#[tokio::test]
async fn missing_content_type_is_not_sniffed() {
    let state = ServerState::new();

    let receiver = {
        let state = state.clone();
        tokio::spawn(async move { handle(state, empty_req("GET", "/p")).await })
    };
    sleep(Duration::from_millis(50)).await;

    let req = Request::builder()
        .method("POST")
        .uri("/p")
        .body(Full::new(Bytes::from_static(b"raw")))
        .unwrap();
    // Hold the progress response so the transfer task keeps running.
    let _sender_resp = handle(state.clone(), req).await;

    let receiver_resp = receiver.await.unwrap();
    assert_eq!(receiver_resp.status(), 200);
    assert!(receiver_resp.headers().get("content-type").is_none());
    assert_eq!(body_string(receiver_resp).await, "raw");
}

#[tokio::test]
async fn metadata_header_is_forwarded_and_exposed() {
    let state = ServerState::new();

    let receiver = {
        let state = state.clone();
        tokio::spawn(async move { handle(state, empty_req("GET", "/p")).await })
    };
    sleep(Duration::from_millis(50)).await;

    let req = Request::builder()
        .method("POST")
        .uri("/p")
        .header("x-piping", "a")
        .header("x-piping", "b")
        .header("x-piping", "c")
        .body(Full::new(Bytes::from_static(b"data")))
        .unwrap();
    let _sender_resp = handle(state.clone(), req).await;

    let receiver_resp = receiver.await.unwrap();
    let values: Vec<_> = receiver_resp.headers().get_all("x-piping").iter().collect();
    assert_eq!(values, ["a", "b", "c"]);
    assert_eq!(
        receiver_resp
            .headers()
            .get("access-control-expose-headers")
            .unwrap(),
        "X-Piping"
    );
}

#[tokio::test]
async fn multipart_upload_unwraps_to_first_part() {
    let state = ServerState::new();

    let receiver = {
        let state = state.clone();
        tokio::spawn(async move { handle(state, empty_req("GET", "/p")).await })
    };
    sleep(Duration::from_millis(50)).await;

    let envelope: &'static [u8] = b"--FORMBOUND\r\n\
        Content-Disposition: form-data; name=\"input_file\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        form payload\r\n\
        --FORMBOUND--\r\n";
    let req = Request::builder()
        .method("POST")
        .uri("/p")
        .header("content-type", "multipart/form-data; boundary=FORMBOUND")
        .body(Full::new(Bytes::from_static(envelope)))
        .unwrap();
    let _sender_resp = handle(state.clone(), req).await;

    let receiver_resp = receiver.await.unwrap();
    assert_eq!(
        receiver_resp.headers().get("content-type").unwrap(),
        "text/plain"
    );
    assert_eq!(body_string(receiver_resp).await, "form payload");
}

#[tokio::test]
async fn completed_path_starts_a_fresh_generation() {
    let state = ServerState::new();

    for round in ["first", "second"] {
        let receiver = {
            let state = state.clone();
            tokio::spawn(async move { handle(state, empty_req("GET", "/reuse")).await })
        };
        sleep(Duration::from_millis(50)).await;

        let sender_resp = handle(state.clone(), post("/reuse", "payload")).await;
        assert_eq!(sender_resp.status(), 200, "{round}");

        let receiver_resp = receiver.await.unwrap();
        assert_eq!(body_string(receiver_resp).await, "payload", "{round}");

        // Removal happens after the sender's relay task finishes.
        let _ = body_string(sender_resp).await;
        sleep(Duration::from_millis(50)).await;
        assert!(state.registry.is_empty(), "{round}");
    }
}

#[tokio::test]
async fn landing_and_metadata_pages() {
    let state = ServerState::new();

    let index = handle(state.clone(), empty_req("GET", "/")).await;
    assert_eq!(index.status(), 200);
    assert_eq!(index.headers().get("content-type").unwrap(), "text/html");
    assert!(body_string(index).await.contains("duct"));

    let version = handle(state.clone(), empty_req("GET", "/version")).await;
    assert_eq!(version.status(), 200);
    assert!(body_string(version).await.contains(env!("CARGO_PKG_VERSION")));

    let noscript = handle(state.clone(), empty_req("GET", "/noscript?path=mypath")).await;
    assert_eq!(noscript.status(), 200);
    assert!(body_string(noscript).await.contains("action=\"mypath\""));

    let favicon = handle(state.clone(), empty_req("GET", "/favicon.ico")).await;
    assert_eq!(favicon.status(), 204);

    let robots = handle(state.clone(), empty_req("GET", "/robots.txt")).await;
    assert_eq!(robots.status(), 404);

    let head = handle(state.clone(), empty_req("HEAD", "/")).await;
    assert_eq!(head.status(), 200);
}

#[tokio::test]
async fn head_on_transfer_path_is_not_supported() {
    let state = ServerState::new();

    let resp = handle(state.clone(), empty_req("HEAD", "/p")).await;
    assert_eq!(resp.status(), 405);
}
