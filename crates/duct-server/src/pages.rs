//! Reserved-path static content.
//!
//! A small fixed set of paths is served by the server itself and never
//! usable for transfers: the landing page, the no-script upload form,
//! version, help, favicon and robots. No coordination logic lives here.

use http::header::HOST;
use http::{HeaderMap, Response};

use crate::handler::{ResponseBody, full};

const PATH_INDEX: &str = "/";
const PATH_NOSCRIPT: &str = "/noscript";
const PATH_VERSION: &str = "/version";
const PATH_HELP: &str = "/help";
const PATH_FAVICON: &str = "/favicon.ico";
const PATH_ROBOTS: &str = "/robots.txt";

const RESERVED_PATHS: [&str; 6] = [
    PATH_INDEX,
    PATH_NOSCRIPT,
    PATH_VERSION,
    PATH_HELP,
    PATH_FAVICON,
    PATH_ROBOTS,
];

const NOSCRIPT_PATH_QUERY_PARAMETER: &str = "path";

/// True if `path` is served as a static page on GET/HEAD.
pub fn is_page_path(path: &str) -> bool {
    RESERVED_PATHS.contains(&path)
}

/// True if uploads to `path` must be rejected.
pub fn is_reserved(path: &str) -> bool {
    RESERVED_PATHS.contains(&path)
}

/// Serve a reserved path. Callers guarantee `is_page_path(path)`.
pub fn serve(path: &str, query: Option<&str>, headers: &HeaderMap) -> Response<ResponseBody> {
    match path {
        PATH_INDEX => html(index_page()),
        PATH_NOSCRIPT => {
            let target = query_param(query, NOSCRIPT_PATH_QUERY_PARAMETER).unwrap_or_default();
            html(noscript_page(&target))
        }
        PATH_VERSION => text(format!("{} (ductd)\n", env!("CARGO_PKG_VERSION"))),
        PATH_HELP => {
            let host = headers
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            text(help_page(&format!("http://{host}")))
        }
        PATH_FAVICON => Response::builder()
            .status(204)
            .header("content-length", "0")
            .body(full(bytes::Bytes::new()))
            .unwrap(),
        PATH_ROBOTS => Response::builder()
            .status(404)
            .header("content-length", "0")
            .body(full(bytes::Bytes::new()))
            .unwrap(),
        other => unreachable!("not a reserved path: {other}"),
    }
}

fn html(content: String) -> Response<ResponseBody> {
    Response::builder()
        .status(200)
        .header("content-type", "text/html")
        .header("content-length", content.len().to_string())
        .header("access-control-allow-origin", "*")
        .body(full(content))
        .unwrap()
}

fn text(content: String) -> Response<ResponseBody> {
    Response::builder()
        .status(200)
        .header("content-type", "text/plain")
        .header("content-length", content.len().to_string())
        .header("access-control-allow-origin", "*")
        .body(full(content))
        .unwrap()
}

fn index_page() -> String {
    "<!DOCTYPE html>\n\
     <html>\n\
     <head><title>duct</title></head>\n\
     <body>\n\
     <h1>duct</h1>\n\
     <p>Stream bytes between any two HTTP clients. Pick a path, send to it,\n\
     receive from it:</p>\n\
     <pre>\n\
     # Send\n\
     curl -T myfile /mypath123\n\
     # Receive\n\
     curl /mypath123 &gt; myfile\n\
     </pre>\n\
     <p><a href=\"/noscript?path=mypath123\">Upload without JavaScript</a> |\n\
     <a href=\"/help\">Help</a></p>\n\
     </body>\n\
     </html>\n"
        .to_string()
}

/// Plain HTML upload form for browsers without JavaScript. The form posts
/// `multipart/form-data` to the chosen path; the resolver unwraps it to
/// the first part on the sender side.
fn noscript_page(path: &str) -> String {
    let escaped = html_escape(path);
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>duct - no script</title></head>\n\
         <body>\n\
         <h1>Send a file</h1>\n\
         <form method=\"GET\" action=\"/noscript\">\n\
         <input name=\"path\" value=\"{escaped}\" placeholder=\"Send path\">\n\
         <input type=\"submit\" value=\"Apply\">\n\
         </form>\n\
         <form method=\"POST\" action=\"{escaped}\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"input_file\">\n\
         <input type=\"submit\" value=\"Send\">\n\
         </form>\n\
         </body>\n\
         </html>\n"
    )
}

fn help_page(base_url: &str) -> String {
    format!(
        "Help for duct\n\
         =============\n\
         \n\
         ======= Send =======\n\
         # Send a file\n\
         curl -T myfile {base_url}/mypath\n\
         \n\
         # Send a directory\n\
         tar zfcp - ./mydir | curl -T - {base_url}/mypath\n\
         \n\
         # Send stdin\n\
         echo hello | curl -T - {base_url}/mypath\n\
         \n\
         ======= Receive =======\n\
         # Receive a file\n\
         curl {base_url}/mypath > myfile\n\
         \n\
         # Receive a directory\n\
         curl {base_url}/mypath | tar zxf -\n\
         \n\
         # Receive to stdout\n\
         curl {base_url}/mypath\n"
    )
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == name {
            return Some(form_urldecode(value));
        }
    }
    None
}

fn form_urldecode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (hex_digit(bytes.get(i + 1)), hex_digit(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi * 16 + lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(byte: Option<&u8>) -> Option<u8> {
    byte.and_then(|b| (*b as char).to_digit(16)).map(|d| d as u8)
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
