//! Request carrier and response writer.

use super::ItemBag;
use crate::cancellation::CancellationToken;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// Accumulates the response produced by the stages.
#[derive(Debug)]
pub struct ResponseWriter {
    state: Mutex<ResponseState>,
}

#[derive(Debug)]
struct ResponseState {
    status: u16,
    body: String,
    written: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            state: Mutex::new(ResponseState {
                status: 200,
                body: String::new(),
                written: false,
            }),
        }
    }
}

impl ResponseWriter {
    /// Appends text to the body.
    pub fn write(&self, text: &str) {
        let mut state = self.state.lock();
        state.body.push_str(text);
        state.written = true;
    }

    /// Sets the status code.
    pub fn set_status(&self, status: u16) {
        let mut state = self.state.lock();
        state.status = status;
        state.written = true;
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.state.lock().status
    }

    /// Returns a copy of the body.
    #[must_use]
    pub fn body(&self) -> String {
        self.state.lock().body.clone()
    }

    /// Returns true once any stage has written a body or a status.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.state.lock().written
    }
}

/// One inbound unit of work, as handed over by the host.
///
/// The pipeline registers the context in the Request Scope as the
/// `Carrier` binding, so stage factories can depend on it.
#[derive(Debug)]
pub struct RequestContext {
    request_id: Uuid,
    method: String,
    path: String,
    received_at: DateTime<Utc>,
    items: ItemBag,
    response: ResponseWriter,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Creates a request with a fresh id.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            method: method.into(),
            path: path.into(),
            received_at: Utc::now(),
            items: ItemBag::new(),
            response: ResponseWriter::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Uses a request id supplied by the host.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Shares a cancellation token owned by the host.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns when the request was received.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Returns the item store.
    #[must_use]
    pub fn items(&self) -> &ItemBag {
        &self.items
    }

    /// Returns the response writer.
    #[must_use]
    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true if the host cancelled the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
