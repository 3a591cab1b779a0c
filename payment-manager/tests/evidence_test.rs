mod common;

use axum::http::{header, StatusCode};
use chrono::{Duration, Utc};
use common::{draft, TestApp, MIB};
use mongodb::bson::oid::ObjectId;
use payment_manager::services::PaymentStore;

async fn app_with_payment() -> (TestApp, String) {
    let app = TestApp::new();
    let now = Utc::now();
    let payment = app
        .seed(draft("Evidence", now, now - Duration::days(3)))
        .await;
    (app, payment.id)
}

#[tokio::test]
async fn upload_links_file_and_marks_payment_completed() {
    let (app, id) = app_with_payment().await;

    let response = app
        .upload(
            &format!("/payments/{id}/evidence"),
            "receipt.png",
            "image/png",
            &vec![0x89; MIB],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let json = response.json();
    assert_eq!(json["message"], "Evidence uploaded successfully");
    let file_id = json["file_id"].as_str().unwrap().to_string();

    let stored = app.payments.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.evidence_file_id.as_deref(), Some(file_id.as_str()));

    let listed = app.get("/payments").await.json();
    assert_eq!(listed["payments"][0]["payee_payment_status"], "completed");
}

#[tokio::test]
async fn oversized_upload_is_rejected_with_400() {
    let (app, id) = app_with_payment().await;

    let response = app
        .upload(
            &format!("/payments/{id}/evidence"),
            "scan.pdf",
            "application/pdf",
            &vec![b'%'; 11 * MIB],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.detail(),
        "File size exceeds the maximum limit of 10 MB."
    );
    assert!(app.blobs.is_empty().await);
}

#[tokio::test]
async fn disallowed_extension_is_rejected_with_400() {
    let (app, id) = app_with_payment().await;

    let response = app
        .upload(
            &format!("/payments/{id}/evidence"),
            "invoice.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            b"PK\x03\x04",
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.detail(),
        "Invalid file extension. Allowed extensions are: .pdf, .png, .jpg"
    );
}

#[tokio::test]
async fn upload_for_unknown_payment_is_404() {
    let app = TestApp::new();

    let response = app
        .upload(
            &format!("/payments/{}/evidence", ObjectId::new().to_hex()),
            "a.jpg",
            "image/jpeg",
            b"\xff\xd8\xff",
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.detail(), "Payment not found");
}

#[tokio::test]
async fn download_streams_file_as_attachment() {
    let (app, id) = app_with_payment().await;
    let content = b"%PDF-1.7 test evidence".to_vec();

    let uploaded = app
        .upload(
            &format!("/payments/{id}/evidence"),
            "Proof Of Payment.PDF",
            "application/pdf",
            &content,
        )
        .await
        .json();
    let file_id = uploaded["file_id"].as_str().unwrap();

    let response = app.get(&format!("/payments/evidence/{file_id}")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Proof Of Payment.PDF\""
    );
    assert_eq!(response.body, content);
}

#[tokio::test]
async fn download_errors() {
    let app = TestApp::new();

    let response = app.get("/payments/evidence/not-hex").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "Invalid evidence_file_id");

    let response = app
        .get(&format!("/payments/evidence/{}", ObjectId::new().to_hex()))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.detail(), "File not found");
}
