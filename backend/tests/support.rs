//! Shared helpers for driving the router in-process.
#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use scrap_exchange::app::{build_router, AppState};
use scrap_exchange::config::AppConfig;
use scrap_exchange::db::{establish_pool, run_migrations, DbPool};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-secret";
pub const PROVIDER_SECRET: &str = "provider-secret";

pub struct TestApp {
    _dir: TempDir,
    pub pool: DbPool,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(Some(PROVIDER_SECRET))
    }

    pub fn with_provider(provider_secret: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database_url = dir.path().join("api.db").to_str().unwrap().to_string();
        let pool = establish_pool(&database_url, 4).unwrap();
        run_migrations(&pool).unwrap();
        let config = AppConfig {
            database_url,
            port: 0,
            jwt_secret: JWT_SECRET.into(),
            token_ttl_hours: 1,
            identity_provider_secret: provider_secret.map(Into::into),
            pool_max_size: 4,
        };
        let router = build_router(AppState {
            config,
            pool: pool.clone(),
        });
        Self {
            _dir: dir,
            pool,
            router,
        }
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Opens an anonymous session and returns its token.
    pub async fn session(&self) -> String {
        let (status, body) = self.send(Method::POST, "/auth/anonymous", None, None).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}
