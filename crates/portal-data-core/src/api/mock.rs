//! Scripted in-memory transport for dispatcher tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Barrier;

use super::{ApiError, Transport, TransportRequest, TransportResponse};

pub(crate) const BASE_URL: &str = "http://portal.test";

#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Reply { status: u16, body: String },
    Fail(String),
}

/// Replies from per-route queues, falling back to `200 {"path": ...}`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    queues: Mutex<HashMap<(String, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<TransportRequest>>,
    barrier: Option<Arc<Barrier>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every send waits on `barrier` before replying.
    pub(crate) fn gated(barrier: Arc<Barrier>) -> Self {
        Self {
            barrier: Some(barrier),
            ..Self::default()
        }
    }

    fn push(&self, method: &str, path: &str, scripted: Scripted) {
        self.queues
            .lock()
            .unwrap()
            .entry((method.to_string(), format!("{}{}", BASE_URL, path)))
            .or_default()
            .push_back(scripted);
    }

    pub(crate) fn reply(&self, method: &str, path: &str, status: u16, body: &str) {
        self.push(
            method,
            path,
            Scripted::Reply {
                status,
                body: body.to_string(),
            },
        );
    }

    pub(crate) fn fail(&self, method: &str, path: &str, reason: &str) {
        self.push(method, path, Scripted::Fail(reason.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self, method: &str, path: &str) -> usize {
        let url = format!("{}{}", BASE_URL, path);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == method && r.url == url)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ApiError> {
        let key = (request.method.as_str().to_string(), request.url.clone());
        let scripted = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        match scripted {
            Some(Scripted::Reply { status, body }) => Ok(TransportResponse { status, body }),
            Some(Scripted::Fail(reason)) => Err(ApiError::Transport(reason)),
            None => {
                let path = request.url.trim_start_matches(BASE_URL);
                Ok(TransportResponse {
                    status: 200,
                    body: serde_json::json!({ "path": path }).to_string(),
                })
            }
        }
    }
}
