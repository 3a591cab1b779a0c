//! Shared setup for payment-manager integration tests.
//!
//! Everything runs against the in-memory stores through the real router.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use payment_manager::config::{
    EvidenceConfig, MongoConfig, PaymentManagerConfig, StoreBackend, DEFAULT_MAX_REQUEST_BYTES,
};
use payment_manager::models::{Payment, PaymentDraft, PaymentStatus};
use payment_manager::services::{InMemoryEvidenceStore, InMemoryPaymentStore, PaymentStore};
use payment_manager::startup::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const MIB: usize = 1024 * 1024;
const BOUNDARY: &str = "----payment-manager-test-boundary";

pub fn test_config() -> PaymentManagerConfig {
    PaymentManagerConfig {
        common: service_core::config::Config::default(),
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "payment_manager_test".to_string(),
        },
        store: StoreBackend::Memory,
        evidence: EvidenceConfig {
            max_bytes: 10 * MIB,
            allowed_extensions: vec![".pdf".into(), ".png".into(), ".jpg".into()],
        },
        max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
    }
}

pub struct TestApp {
    pub router: Router,
    pub payments: Arc<InMemoryPaymentStore>,
    pub blobs: Arc<InMemoryEvidenceStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn detail(&self) -> String {
        self.json()["detail"].as_str().unwrap_or_default().to_string()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let blobs = Arc::new(InMemoryEvidenceStore::new());
        let state = AppState::new(test_config(), payments.clone(), blobs.clone());

        Self {
            router: build_router(state),
            payments,
            blobs,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body")
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn send_json(&self, method: Method, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn upload(
        &self,
        uri: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body("file", filename, content_type, data)))
                .unwrap(),
        )
        .await
    }

    pub async fn seed(&self, draft: PaymentDraft) -> Payment {
        self.payments.insert(draft).await.expect("seed insert failed")
    }
}

pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn draft(last_name: &str, added: DateTime<Utc>, due: DateTime<Utc>) -> PaymentDraft {
    PaymentDraft {
        payee_first_name: "Alex".to_string(),
        payee_last_name: last_name.to_string(),
        payee_payment_status: PaymentStatus::Pending,
        payee_added_date_utc: added,
        payee_due_date: due,
        payee_address_line_1: "12 Harbour St".to_string(),
        payee_address_line_2: None,
        payee_city: "Cork".to_string(),
        payee_country: "IE".to_string(),
        payee_province_or_state: None,
        payee_postal_code: "T12 X8Y9".to_string(),
        payee_phone_number: "+353210000000".to_string(),
        payee_email: format!("{}@example.com", last_name.to_lowercase()),
        currency: "EUR".to_string(),
        discount_percent: Some(5.0),
        tax_percent: Some(10.0),
        due_amount: 100.0,
        total_due: None,
        evidence_file_ext: None,
    }
}

pub fn create_body() -> Value {
    serde_json::json!({
        "payee_first_name": "Priya",
        "payee_last_name": "Smith",
        "payee_payment_status": "pending",
        "payee_due_date": "2030-01-15",
        "payee_address_line_1": "88 Queen St",
        "payee_city": "Auckland",
        "payee_country": "NZ",
        "payee_postal_code": "1010",
        "payee_phone_number": "+6491234567",
        "payee_email": "priya@example.com",
        "currency": "NZD",
        "discount_percent": 5,
        "tax_percent": 10,
        "due_amount": 100
    })
}
