//! Rejection taxonomy for the policy layer.
//!
//! Every rejection is terminal for the offending request and is surfaced
//! as a 4xx with a plaintext body. The display strings are the bodies
//! sent to the client, so they carry a trailing newline.

use thiserror::Error;

/// A request rejected by the policy layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Reject {
    /// Upload attempted against a reserved path.
    #[error("[ERROR] Cannot send to the reserved path '{path}'. (e.g. '/mypath123')\n")]
    PathReserved { path: String },

    /// Upload declared a byte range; resumable upload is unsupported.
    #[error("[ERROR] Content-Range is not supported for now in {method}\n")]
    RangeUnsupported { method: String },

    /// A second receiver attached while one is waiting or a transfer is
    /// in progress.
    #[error("[ERROR] The number of receivers has reached limits.\n")]
    ReceiverSlotFull,

    /// A second sender attached to the same generation.
    #[error("[ERROR] Another sender has been connected on '{path}'.\n")]
    SenderAlreadyConnected { path: String },

    /// A GET declared itself a service-worker script registration.
    #[error("[ERROR] Service Worker registration is rejected.\n")]
    ServiceWorkerRejected,

    /// Any method outside GET/HEAD/POST/PUT/OPTIONS.
    #[error("[ERROR] Unsupported method: {method}.\n")]
    MethodNotSupported { method: String },
}

impl Reject {
    /// HTTP status code for this rejection.
    pub fn status(&self) -> u16 {
        match self {
            Reject::MethodNotSupported { .. } => 405,
            _ => 400,
        }
    }
}
