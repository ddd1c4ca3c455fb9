//! Scripted transport for deterministic tests without network access.

use crate::{Error, HttpRequest, RawResponse, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// A transport that answers from scripted responses.
///
/// Responses are queued per URL and returned in order; the last one queued
/// for a URL keeps being returned once the others are used up. URLs with no
/// script answer 404 with an upstream-shaped error body. Clones share state,
/// so a test can keep a handle after moving one into a client.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, VecDeque<RawResponse>>,
    unreachable: HashSet<String>,
    requests: Vec<HttpRequest>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`.
    pub fn respond(&self, url: &str, response: RawResponse) -> &Self {
        if let Ok(mut state) = self.state.lock() {
            state
                .routes
                .entry(url.to_string())
                .or_default()
                .push_back(response);
        }
        self
    }

    /// Queue a 200 response with a JSON body.
    pub fn respond_json(&self, url: &str, body: Value) -> &Self {
        self.respond(url, RawResponse::json(200, &body))
    }

    /// Make every request to `url` fail with [`Error::Network`].
    pub fn unreachable(&self, url: &str) -> &Self {
        if let Ok(mut state) = self.state.lock() {
            state.unreachable.insert(url.to_string());
        }
        self
    }

    /// Every request made so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().map(|s| s.requests.len()).unwrap_or(0)
    }

    /// Number of requests made to exactly `url`.
    pub fn requests_to(&self, url: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.requests.iter().filter(|r| r.url == url).count())
            .unwrap_or(0)
    }
}

fn not_found() -> RawResponse {
    RawResponse::json(
        404,
        &json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest",
        }),
    )
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &HttpRequest) -> Result<RawResponse, Error> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Network("mock transport poisoned".to_string()))?;
        state.requests.push(request.clone());
        if state.unreachable.contains(&request.url) {
            return Err(Error::Network(format!("{}: connection refused", request.url)));
        }

        let response = match state.routes.get_mut(&request.url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(not_found))
    }
}
