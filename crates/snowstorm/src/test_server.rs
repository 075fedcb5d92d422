//! Canned-response Snowstorm stand-in for client tests.
//!
//! Binds an axum server to an ephemeral local port, answers each (method, path) with the
//! response registered for it and records every request it receives.

use crate::SnowstormClient;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use rms_types::BranchPath;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Value,
}

#[derive(Clone, Debug)]
struct Canned {
    status: u16,
    body: Value,
    location: Option<String>,
}

#[derive(Clone, Default)]
struct Shared {
    routes: Arc<Mutex<HashMap<(String, String), Canned>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct FakeSnowstorm {
    addr: SocketAddr,
    shared: Shared,
}

impl FakeSnowstorm {
    pub async fn start() -> Self {
        let shared = Shared::default();
        let app = Router::new().fallback(handle).with_state(shared.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake snowstorm");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake snowstorm stopped");
        });
        Self { addr, shared }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> SnowstormClient {
        SnowstormClient::new(
            self.base_url(),
            BranchPath::new("MAIN/SNOMEDCT-NO").expect("valid"),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    pub fn respond_json(&self, method: &str, path: &str, status: u16, body: Value) {
        self.register(method, path, Canned {
            status,
            body,
            location: None,
        });
    }

    pub fn respond_created(&self, method: &str, path: &str, location: Option<&str>) {
        self.register(method, path, Canned {
            status: 201,
            body: Value::Null,
            location: location.map(str::to_string),
        });
    }

    pub fn last_request(&self) -> Option<Recorded> {
        self.shared.requests.lock().expect("requests lock").last().cloned()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.shared.requests.lock().expect("requests lock").clone()
    }

    fn register(&self, method: &str, path: &str, canned: Canned) {
        self.shared
            .routes
            .lock()
            .expect("routes lock")
            .insert((method.to_string(), path.to_string()), canned);
    }
}

async fn handle(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    shared.requests.lock().expect("requests lock").push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        body,
    });

    let canned = shared
        .routes
        .lock()
        .expect("routes lock")
        .get(&(method.to_string(), uri.path().to_string()))
        .cloned();
    let Some(canned) = canned else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let status = StatusCode::from_u16(canned.status).expect("valid status");
    let mut response = if canned.body.is_null() {
        status.into_response()
    } else {
        (status, Json(canned.body)).into_response()
    };
    if let Some(location) = canned.location {
        response.headers_mut().insert(
            header::LOCATION,
            HeaderValue::from_str(&location).expect("valid header"),
        );
    }
    response
}
