use crate::models::{Payment, PaymentDraft, PaymentStatus};
use crate::services::query::{ListQuery, PaymentPage, DEFAULT_PER_PAGE};
use crate::services::status::{additive_total, round_cents};
use crate::utils::{is_e164, parse_flexible_datetime};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::{Validate, ValidationError};

/// Raw query string of `GET /payments`. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl ListPaymentsParams {
    pub fn into_query(self) -> Result<ListQuery, AppError> {
        let page = parse_positive("page", self.page.as_deref())?.unwrap_or(1);
        let per_page = parse_positive("per_page", self.per_page.as_deref())?.unwrap_or(DEFAULT_PER_PAGE);

        let search = non_empty(self.search);
        let status = non_empty(self.status)
            .map(|value| value.parse::<PaymentStatus>())
            .transpose()
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

        Ok(ListQuery {
            page,
            per_page,
            search,
            status,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_positive(name: &str, value: Option<&str>) -> Result<Option<u64>, AppError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(Some(n as u64)),
        Ok(_) => Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must be at least 1",
            name
        ))),
        Err(_) => Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must be an integer",
            name
        ))),
    }
}

/// A payment as returned by the API: `_id` and RFC 3339 dates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub payee_first_name: String,
    pub payee_last_name: String,
    pub payee_payment_status: PaymentStatus,
    pub payee_added_date_utc: String,
    pub payee_due_date: String,
    pub payee_address_line_1: String,
    pub payee_address_line_2: Option<String>,
    pub payee_city: String,
    pub payee_country: String,
    pub payee_province_or_state: Option<String>,
    pub payee_postal_code: String,
    pub payee_phone_number: String,
    pub payee_email: String,
    pub currency: String,
    pub discount_percent: Option<f64>,
    pub tax_percent: Option<f64>,
    pub due_amount: f64,
    pub total_due: Option<f64>,
    pub evidence_file_id: Option<String>,
    pub evidence_file_ext: Option<String>,
}

fn rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            payee_first_name: p.payee_first_name,
            payee_last_name: p.payee_last_name,
            payee_payment_status: p.payee_payment_status,
            payee_added_date_utc: rfc3339(p.payee_added_date_utc),
            payee_due_date: rfc3339(p.payee_due_date),
            payee_address_line_1: p.payee_address_line_1,
            payee_address_line_2: p.payee_address_line_2,
            payee_city: p.payee_city,
            payee_country: p.payee_country,
            payee_province_or_state: p.payee_province_or_state,
            payee_postal_code: p.payee_postal_code,
            payee_phone_number: p.payee_phone_number,
            payee_email: p.payee_email,
            currency: p.currency,
            discount_percent: p.discount_percent,
            tax_percent: p.tax_percent,
            due_amount: p.due_amount,
            total_due: p.total_due,
            evidence_file_id: p.evidence_file_id,
            evidence_file_ext: p.evidence_file_ext,
        }
    }
}

/// Body of `POST /payments`.
///
/// `payee_added_date_utc` is accepted so full records can be posted back, but
/// it is always replaced by the server clock. `total_due` and
/// `evidence_file_id` are likewise not taken from the client.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub payee_first_name: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub payee_last_name: String,
    #[serde(default = "default_status")]
    pub payee_payment_status: PaymentStatus,
    #[serde(default)]
    pub payee_added_date_utc: Option<serde_json::Value>,
    pub payee_due_date: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub payee_address_line_1: String,
    #[serde(default)]
    pub payee_address_line_2: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub payee_city: String,
    #[validate(length(equal = 2, message = "must be an ISO 3166-1 alpha-2 code"))]
    pub payee_country: String,
    #[serde(default)]
    pub payee_province_or_state: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub payee_postal_code: String,
    #[validate(custom(function = "validate_e164"))]
    pub payee_phone_number: String,
    #[validate(email(message = "must be a valid email address"))]
    pub payee_email: String,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: String,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub tax_percent: Option<f64>,
    #[validate(range(min = 0.0))]
    pub due_amount: f64,
    #[serde(default)]
    pub evidence_file_ext: Option<String>,
}

fn default_status() -> PaymentStatus {
    PaymentStatus::Pending
}

fn validate_e164(phone: &str) -> Result<(), ValidationError> {
    if is_e164(phone) {
        Ok(())
    } else {
        let mut err = ValidationError::new("e164");
        err.message = Some("must be an E.164 phone number".into());
        Err(err)
    }
}

impl CreatePaymentRequest {
    /// Builds the draft stamped with `now`, computing the additive total.
    pub fn into_draft(self, now: DateTime<Utc>) -> Result<PaymentDraft, AppError> {
        let payee_due_date = parse_due_date(&self.payee_due_date)?;
        let discount_percent = self.discount_percent.unwrap_or(0.0);
        let tax_percent = self.tax_percent.unwrap_or(0.0);
        let due_amount = round_cents(self.due_amount);

        Ok(PaymentDraft {
            payee_first_name: self.payee_first_name,
            payee_last_name: self.payee_last_name,
            payee_payment_status: self.payee_payment_status,
            payee_added_date_utc: now,
            payee_due_date,
            payee_address_line_1: self.payee_address_line_1,
            payee_address_line_2: self.payee_address_line_2,
            payee_city: self.payee_city,
            payee_country: self.payee_country,
            payee_province_or_state: self.payee_province_or_state,
            payee_postal_code: self.payee_postal_code,
            payee_phone_number: self.payee_phone_number,
            payee_email: self.payee_email,
            currency: self.currency,
            discount_percent: Some(discount_percent),
            tax_percent: Some(tax_percent),
            due_amount,
            total_due: Some(additive_total(due_amount, tax_percent, discount_percent)),
            evidence_file_ext: self.evidence_file_ext,
        })
    }
}

/// Body of `PATCH /payments/:id`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    #[validate(range(min = 0.0))]
    pub due_amount: Option<f64>,
    pub payee_payment_status: Option<PaymentStatus>,
    pub payee_due_date: Option<String>,
}

impl UpdatePaymentRequest {
    pub fn due_date(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        self.payee_due_date.as_deref().map(parse_due_date).transpose()
    }
}

fn parse_due_date(value: &str) -> Result<DateTime<Utc>, AppError> {
    parse_flexible_datetime(value).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Invalid payee_due_date: {}", value))
    })
}

/// One entry of `metadata.links`; serializes as a single-key object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageLink {
    #[serde(rename = "self")]
    SelfLink(String),
    First(String),
    Previous(String),
    Next(String),
    Last(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageMetadata {
    pub page: u64,
    pub per_page: u64,
    pub page_count: u64,
    pub total_count: u64,
    pub links: Vec<PageLink>,
}

impl PageMetadata {
    pub fn new(page: u64, per_page: u64, page_count: u64, total_count: u64) -> Self {
        let link = |p: u64| format!("/payments?page={}&per_page={}", p, per_page);
        let links = vec![
            PageLink::SelfLink(link(page)),
            PageLink::First(link(1)),
            PageLink::Previous(link(page.saturating_sub(1).max(1))),
            PageLink::Next(link((page + 1).min(page_count))),
            PageLink::Last(link(page_count)),
        ];

        Self {
            page,
            per_page,
            page_count,
            total_count,
            links,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentListResponse {
    pub metadata: PageMetadata,
    pub payments: Vec<PaymentResponse>,
}

impl From<PaymentPage> for PaymentListResponse {
    fn from(page: PaymentPage) -> Self {
        Self {
            metadata: PageMetadata::new(page.page, page.per_page, page.page_count, page.total_count),
            payments: page.payments.into_iter().map(PaymentResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceUploadResponse {
    pub file_id: String,
    pub message: String,
}
