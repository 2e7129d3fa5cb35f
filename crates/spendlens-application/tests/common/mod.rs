//! Scripted in-memory backend shared by the integration tests.

#![allow(dead_code)]

use serde_json::Value;
use spendlens_application::ClientContext;
use spendlens_core::config::ClientConfig;
use spendlens_core::credentials::InMemoryCredentialStore;
use spendlens_core::transport::{
    ApiRequest, ApiResponse, HttpTransport, Method, ProgressSink, RequestBody, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One scripted answer.
pub enum Reply {
    Json(u16, Value),
    Fail(TransportError),
    /// Waits for the notify before answering.
    Gated(Arc<Notify>, u16, Value),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl Recorded {
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Routes `"METHOD /path"` to queued replies; unscripted routes get 404.
#[derive(Default)]
pub struct MockBackend {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{} {}", method.as_str(), path))
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockBackend {
    async fn execute(
        &self,
        request: ApiRequest,
        bearer: Option<String>,
        progress: Option<ProgressSink>,
    ) -> Result<ApiResponse, TransportError> {
        let key = format!("{} {}", request.method.as_str(), request.path);
        if let (RequestBody::Multipart { file, .. }, Some(report)) = (&request.body, &progress) {
            report(file.size() / 2, file.size());
            report(file.size(), file.size());
        }
        self.requests.lock().unwrap().push(Recorded {
            method: request.method,
            path: request.path,
            bearer,
            body: request.body,
        });

        let reply = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Json(status, body)) => Ok(ApiResponse::with_json(status, &body)),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Gated(gate, status, body)) => {
                gate.notified().await;
                Ok(ApiResponse::with_json(status, &body))
            }
            None => Ok(ApiResponse::with_json(
                404,
                &serde_json::json!({"detail": "Not Found"}),
            )),
        }
    }
}

/// Context over an in-memory store, optionally already logged in.
pub fn context(backend: Arc<MockBackend>, logged_in_as: Option<&str>) -> (ClientContext, Arc<InMemoryCredentialStore>) {
    let store = Arc::new(match logged_in_as {
        Some(username) => InMemoryCredentialStore::with_token("stored-access", "stored-refresh", username),
        None => InMemoryCredentialStore::new(),
    });
    let ctx = ClientContext::bootstrap(ClientConfig::default(), store.clone(), backend).unwrap();
    (ctx, store)
}

pub fn token_pair() -> Value {
    serde_json::json!({"access_token": "new-access", "refresh_token": "new-refresh", "token_type": "bearer"})
}

pub fn analysis_payload() -> Value {
    serde_json::json!({
        "analysis_id": "an-7",
        "created_at": "2025-04-02T08:30:00Z",
        "analysis": {
            "basic_analysis": {
                "spending_pattern": "Mostly groceries",
                "avg_spending": "$31.20",
                "shopping_frequency": "Twice a week"
            },
            "items_analysis": {
                "frequently_bought": ["Eggs", "Coffee"],
                "possible_categories": {"Groceries": 6, "Household": 2}
            },
            "shopping_habits": {
                "preferred_stores": ["FreshMart"],
                "time_patterns": "Evenings"
            },
            "recommendations": ["Try a loyalty card"]
        },
        "from_cache": false
    })
}
