//! Transport backends for api.php.
//!
//! The [`Backend`] trait sends one [`Request`] and hands back the raw status
//! and body; all decoding happens in [`crate::Client`]. The primary
//! implementation is [`http::HttpBackend`].
//!
//! # Testing
//!
//! Use [`MockBackend`] to run the client without network access:
//!
//! ```
//! use racktables::backend::MockBackend;
//! use racktables::{Client, ClientConfig};
//!
//! let mock = MockBackend::new();
//! mock.push_depot(1504, r#"{"response": {"7": {"id": 7, "name": "vm1"}}}"#);
//!
//! let client = Client::with_backend(Box::new(mock.clone()), ClientConfig::default());
//! let objects = client.fetch_objects().unwrap();
//! assert_eq!(objects.len(), 1);
//! assert_eq!(mock.requests().len(), 1);
//! ```

pub mod http;

use crate::error::Result;
use crate::request::Request;
use crate::types::ObjectId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Raw api.php response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl Response {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// api.php signals success with 200 only.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Backend trait for delivering api.php calls.
///
/// Implementations must not interpret the status; a non-200 answer is still
/// `Ok`. `Err` means no answer was received at all.
pub trait Backend: Send + Sync {
    /// Send one request and return the raw response.
    fn send(&self, request: &Request) -> Result<Response>;
}

#[derive(Debug, Clone)]
struct FailureRule {
    method: &'static str,
    object_id: Option<ObjectId>,
    response: Response,
}

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<Request>,
    depots: HashMap<u64, VecDeque<String>>,
    tags: Option<String>,
    created: VecDeque<Response>,
    failures: Vec<FailureRule>,
}

/// In-memory backend that records requests and serves canned bodies.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// client owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

const EMPTY: &str = r#"{"response": []}"#;

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a `get_depot` body for an object type.
    ///
    /// Queued bodies are served in order; the last one keeps being served.
    pub fn push_depot(&self, type_id: u64, body: impl Into<String>) {
        self.lock()
            .depots
            .entry(type_id)
            .or_default()
            .push_back(body.into());
    }

    /// Set the `get_tags` body.
    pub fn set_tags(&self, body: impl Into<String>) {
        self.lock().tags = Some(body.into());
    }

    /// Queue the response to the next `add_object` call.
    pub fn push_create_response(&self, status: u16, body: impl Into<String>) {
        self.lock().created.push_back(Response::new(status, body));
    }

    /// Answer every matching mutation with `status`/`body`.
    ///
    /// `object_id` narrows the rule to calls targeting that object.
    pub fn fail(
        &self,
        method: &'static str,
        object_id: Option<ObjectId>,
        status: u16,
        body: impl Into<String>,
    ) {
        self.lock().failures.push(FailureRule {
            method,
            object_id,
            response: Response::new(status, body),
        });
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Mutating requests received so far.
    #[must_use]
    pub fn mutations(&self) -> Vec<Request> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.is_mutation())
            .cloned()
            .collect()
    }
}

impl Backend for MockBackend {
    fn send(&self, request: &Request) -> Result<Response> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let failure = state.failures.iter().find(|rule| {
            rule.method == request.method()
                && rule.object_id.is_none_or(|id| request.object_id() == Some(id))
        });
        if let Some(rule) = failure {
            return Ok(rule.response.clone());
        }

        let response = match request {
            Request::GetDepot { type_id, .. } => {
                let body = state.depots.get_mut(type_id).and_then(|queue| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                });
                Response::new(200, body.unwrap_or_else(|| EMPTY.to_string()))
            }
            Request::GetTags => {
                Response::new(200, state.tags.clone().unwrap_or_else(|| EMPTY.to_string()))
            }
            Request::AddObject { .. } => state
                .created
                .pop_front()
                .unwrap_or_else(|| Response::new(200, EMPTY)),
            _ => Response::new(200, EMPTY),
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagId;

    fn depot(type_id: u64) -> Request {
        Request::GetDepot {
            type_id,
            filter_tags: vec![],
        }
    }

    #[test]
    fn test_mock_records_requests() {
        let mock = MockBackend::new();
        mock.send(&Request::GetTags).unwrap();
        mock.send(&Request::UpdateObjectTags {
            object_id: ObjectId(1),
            tags: vec![TagId(2)],
        })
        .unwrap();

        assert_eq!(mock.requests().len(), 2);
        assert_eq!(mock.mutations().len(), 1);
    }

    #[test]
    fn test_mock_depot_queue_keeps_last() {
        let mock = MockBackend::new();
        mock.push_depot(1504, "first");
        mock.push_depot(1504, "second");

        assert_eq!(mock.send(&depot(1504)).unwrap().body, "first");
        assert_eq!(mock.send(&depot(1504)).unwrap().body, "second");
        assert_eq!(mock.send(&depot(1504)).unwrap().body, "second");
        assert_eq!(mock.send(&depot(1505)).unwrap().body, EMPTY);
    }

    #[test]
    fn test_mock_failure_rules() {
        let mock = MockBackend::new();
        mock.fail("link_entities", Some(ObjectId(7)), 500, "boom");

        let hit = mock
            .send(&Request::LinkEntities {
                child: ObjectId(7),
                parent: ObjectId(1),
            })
            .unwrap();
        assert_eq!(hit.status, 500);

        let miss = mock
            .send(&Request::LinkEntities {
                child: ObjectId(8),
                parent: ObjectId(1),
            })
            .unwrap();
        assert!(miss.is_success());
    }

    #[test]
    fn test_clones_share_state() {
        let mock = MockBackend::new();
        let handle = mock.clone();
        mock.send(&Request::GetTags).unwrap();
        assert_eq!(handle.requests(), vec![Request::GetTags]);
    }
}
