use crate::dtos::{
    CreatePaymentRequest, EvidenceUploadResponse, ListPaymentsParams, MessageResponse,
    PaymentListResponse, PaymentResponse, UpdatePaymentRequest,
};
use crate::models::PaymentStatus;
use crate::services::evidence_store::DEFAULT_CONTENT_TYPE;
use crate::services::status::{additive_total, round_cents};
use crate::services::PaymentChanges;
use crate::startup::AppState;
use crate::utils::{ensure_object_id, ValidatedJson};
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use service_core::error::AppError;

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<ListPaymentsParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.into_query()?;
    let page = state.query.list(&query).await?;

    Ok(Json(PaymentListResponse::from(page)))
}

pub async fn create_payment(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let draft = request.into_draft(Utc::now())?;
    let payment = state.payments.insert(draft).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to create payment");
        e
    })?;

    metrics::counter!("payments_created_total").increment(1);
    tracing::info!(payment_id = %payment.id, "Payment created");

    Ok(Json(PaymentResponse::from(payment)))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ensure_object_id(&payment_id, "payment id")?;

    if !state.payments.delete(&payment_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
    }

    tracing::info!(payment_id = %payment_id, "Payment deleted");
    Ok(Json(MessageResponse::new("Payment deleted successfully")))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_object_id(&payment_id, "payment id")?;
    let due_date = request.due_date()?;

    let existing = state
        .payments
        .get(&payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    if request.payee_payment_status == Some(PaymentStatus::Completed)
        && existing.evidence_file_id.is_none()
    {
        return Err(AppError::PreconditionFailed(anyhow::anyhow!(
            "Cannot mark payment as complete without evidence_file_id"
        )));
    }

    let due_amount = request.due_amount.map(round_cents);
    let changes = PaymentChanges {
        due_amount,
        total_due: due_amount.map(|amount| {
            additive_total(
                amount,
                existing.tax_percent.unwrap_or(0.0),
                existing.discount_percent.unwrap_or(0.0),
            )
        }),
        payee_payment_status: request.payee_payment_status,
        payee_due_date: due_date,
    };

    let updated = state
        .payments
        .update(&payment_id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    tracing::info!(payment_id = %payment_id, "Payment updated");
    Ok(Json(PaymentResponse::from(updated)))
}

pub async fn upload_evidence(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    ensure_object_id(&payment_id, "payment id")?;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        // Reject on name before reading the body.
        state.evidence.policy().validate_extension(&filename)?;
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let chunks = field
            .map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
            })
            .boxed();

        let file_id = state
            .evidence
            .attach(&payment_id, &filename, &content_type, chunks)
            .await?;

        return Ok(Json(EvidenceUploadResponse {
            file_id,
            message: "Evidence uploaded successfully".to_string(),
        }));
    }

    Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")))
}

pub async fn download_evidence(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let download = state.evidence.fetch(&file_id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(&download.filename)
    );
    let headers = [
        (header::CONTENT_TYPE, download.content_type),
        (header::CONTENT_DISPOSITION, disposition),
        (header::CONTENT_LENGTH, download.length.to_string()),
    ];

    Ok((headers, Body::from_stream(download.body)))
}

/// Printable ASCII only, so the name fits a quoted header parameter.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.is_empty() {
        "evidence".to_string()
    } else {
        cleaned
    }
}
