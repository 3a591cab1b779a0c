mod common;

use axum::http::StatusCode;
use common::TestApp;
use payment_manager::models::PaymentStatus;
use payment_manager::services::{PaymentFilter, PaymentStore};

const HEADER: &str = "payee_first_name,payee_last_name,payee_payment_status,payee_added_date_utc,payee_due_date,payee_address_line_1,payee_address_line_2,payee_city,payee_country,payee_province_or_state,payee_postal_code,payee_phone_number,payee_email,currency,discount_percent,tax_percent,due_amount";

fn csv(rows: &[&str]) -> Vec<u8> {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out.into_bytes()
}

#[tokio::test]
async fn imports_valid_rows_and_skips_incomplete_ones() {
    let app = TestApp::new();
    let data = csv(&[
        "Tom,Smith,pending,1704067200,2024-02-01,5 Oak Rd,,Denver,us,CO,08002,+13035550100,tom@example.com,usd,5,10,100",
        "Ann,Lee,overdue,1704153600,2024-01-15,6 Pine Rd,Apt 3,Boston,us,MA,02108,+16175550100,ann@example.com,usd,,,50",
        "Bad,Row,pending,1704153600,2024-01-15,6 Pine Rd,,Boston,US,MA,02108,+16175550100,bad@example.com,USD,0,0,",
    ]);

    let response = app
        .upload("/upload/payments", "payments.csv", "text/csv", &data)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["message"], "2 payments inserted successfully.");

    let smith = app
        .payments
        .find_all(&PaymentFilter::search("Smith"))
        .await
        .unwrap();
    assert_eq!(smith.len(), 1);
    let smith = &smith[0];
    assert_eq!(smith.payee_country, "US");
    assert_eq!(smith.currency, "USD");
    assert_eq!(smith.payee_postal_code, "08002");
    assert_eq!(smith.payee_added_date_utc.timestamp(), 1_704_067_200);
    assert_eq!(smith.payee_payment_status, PaymentStatus::Pending);
    assert!((smith.total_due.unwrap() - 104.5).abs() < 1e-9);
}

#[tokio::test]
async fn rejects_non_csv_files() {
    let app = TestApp::new();
    let response = app
        .upload("/upload/payments", "payments.txt", "text/plain", b"a,b\n1,2\n")
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "Only CSV files are allowed.");
}

#[tokio::test]
async fn all_invalid_rows_is_400() {
    let app = TestApp::new();
    let data = csv(&[
        "No,Amount,pending,1704067200,2024-02-01,5 Oak Rd,,Denver,US,CO,80202,+13035550100,na@example.com,USD,0,0,",
    ]);

    let response = app
        .upload("/upload/payments", "payments.csv", "text/csv", &data)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "No valid data found to insert.");
    assert!(app.payments.is_empty().await);
}

#[tokio::test]
async fn malformed_csv_is_400() {
    let app = TestApp::new();
    let data = csv(&[
        "Tom,Smith,pending,1704067200,2024-02-01,5 Oak Rd,,Denver,US,CO,80202,+13035550100,tom@example.com,USD,0,0,10,unexpected",
    ]);

    let response = app
        .upload("/upload/payments", "payments.csv", "text/csv", &data)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.payments.is_empty().await);
}
