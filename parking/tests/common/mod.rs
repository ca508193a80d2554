//! Shared harness: the full router over the in-memory store.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use parking::identity::TokenIssuer;
use parking::payment_gateway::MockPaymentGateway;
use parking::store::{MemoryParkingStore, ParkingStore};
use parking::types::LiveEvent;
use parking::{AppState, build_router};
use parking_web::Broadcaster;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Router plus handles on its store and hub.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryParkingStore,
    pub live: Broadcaster<LiveEvent>,
}

/// A decoded response.
pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).expect("response body is JSON")
    }
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryParkingStore::new();
        let live = Broadcaster::new(64);
        let shared: Arc<dyn ParkingStore> = Arc::new(store.clone());
        let state = AppState::new(
            shared,
            TokenIssuer::new("integration-secret", 3600),
            MockPaymentGateway::shared(),
            "INR",
            live.clone(),
        );
        Self {
            router: build_router(state),
            store,
            live,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
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

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Register an account with `role` and return its token.
    pub async fn register(&self, name: &str, role: &str) -> String {
        let reply = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "username": name,
                    "email": format!("{name}@example.com"),
                    "password": "pa55word",
                    "role": role,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "register {name}");
        reply.json()["token"].as_str().unwrap().to_string()
    }

    /// Create a lot with one space as `owner_token`; returns `(lot_id, space_id)`.
    pub async fn lot_with_space(&self, owner_token: &str, rate: f64) -> (i64, i64) {
        let lot = self
            .post(
                "/api/lots",
                Some(owner_token),
                json!({
                    "lot_name": "MG Road Plaza",
                    "city": "Bengaluru",
                    "total_spaces": 1,
                    "hourly_rate": rate,
                }),
            )
            .await;
        assert_eq!(lot.status, StatusCode::OK);
        let lot_id = lot.json()["lot_id"].as_i64().unwrap();

        let spaces = self
            .post(
                &format!("/api/lots/{lot_id}/spaces"),
                Some(owner_token),
                json!({ "spaces": [{ "space_number": "A1" }] }),
            )
            .await;
        assert_eq!(spaces.status, StatusCode::OK);
        let space_id = spaces.json()["space_ids"][0].as_i64().unwrap();
        (lot_id, space_id)
    }

    /// Book `space_id` from 09:00 to 11:30 as `token`.
    pub async fn book(&self, token: &str, lot_id: i64, space_id: i64) -> Reply {
        self.post(
            "/api/reservations",
            Some(token),
            json!({
                "lot_id": lot_id,
                "space_id": space_id,
                "start_time": "2025-06-01T09:00:00Z",
                "end_time": "2025-06-01T11:30:00Z",
            }),
        )
        .await
    }
}
