//! Shared harness: the full router over an in-memory database, a temporary
//! storage root and the mock renderer.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use reportdesk_server::db::{create_memory_pool, migrations};
use reportdesk_server::{build_router, AppState, MockRenderer, ServerConfig};

pub const JRXML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<jasperReport name="sales" pageWidth="595" pageHeight="842"></jasperReport>"#;

pub const SUBREPORT: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<jasperReport name="lines"></jasperReport>"#;

const BOUNDARY: &str = "reportdesk-test-boundary";

/// Builder for `multipart/form-data` bodies
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn template(self, file_name: &str) -> Self {
        self.file("report_file", file_name, "application/xml", JRXML)
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// Raw response pieces
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        if self.bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&self.bytes).unwrap()
        }
    }

    pub fn header(&self, name: header::HeaderName) -> &str {
        self.headers.get(name).unwrap().to_str().unwrap()
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub renderer: Arc<MockRenderer>,
    _storage: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = create_memory_pool().await.unwrap();
        migrations::run(&pool).await.unwrap();

        let storage = TempDir::new().unwrap();
        let config = ServerConfig {
            storage_root: storage.path().to_path_buf(),
            ..ServerConfig::default()
        };

        let renderer = Arc::new(MockRenderer::new());
        let state = Arc::new(AppState::new(pool, renderer.clone(), config));
        let app = build_router(state.clone());

        Self {
            app,
            state,
            renderer,
            _storage: storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply {
            status,
            headers,
            bytes,
        }
    }

    fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    pub async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> Reply {
        let request = Self::builder(method, uri, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        let request = Self::builder(Method::GET, uri, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Reply {
        let request = Self::builder(Method::DELETE, uri, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn multipart(&self, method: Method, uri: &str, token: Option<&str>, form: Form) -> Reply {
        let request = Self::builder(method, uri, token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(form.finish()))
            .unwrap();
        self.send(request).await
    }

    /// Register a user; returns `(user_id, token)`.
    pub async fn register(&self, email: &str) -> (i64, String) {
        let reply = self
            .json(
                Method::POST,
                "/api/register",
                None,
                json!({
                    "name": "Test User",
                    "email": email,
                    "password": "password123",
                    "password_confirmation": "password123"
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());
        let body = reply.json();
        (
            body["user"]["id"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_data_source(&self, token: &str, body: Value) -> Value {
        let reply = self
            .json(Method::POST, "/api/datasources", Some(token), body)
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());
        reply.json()
    }

    /// Inline data source with two records
    pub async fn inline_data_source(&self, token: &str, name: &str) -> i64 {
        let ds = self
            .create_data_source(
                token,
                json!({
                    "name": name,
                    "type": "json",
                    "configuration": [{"region": "north", "total": 10}, {"region": "south", "total": 7}]
                }),
            )
            .await;
        ds["id"].as_i64().unwrap()
    }

    pub async fn create_report(&self, token: &str, name: &str, data_source_id: i64) -> Value {
        let form = Form::new()
            .text("name", name)
            .text("data_source_id", &data_source_id.to_string())
            .template("sales.jrxml");
        let reply = self
            .multipart(Method::POST, "/api/reports", Some(token), form)
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());
        reply.json()
    }
}
