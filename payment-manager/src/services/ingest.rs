use crate::models::{PaymentDraft, PaymentStatus};
use crate::services::status::compounded_total;
use crate::services::store::PaymentStore;
use crate::utils::{parse_epoch_seconds, parse_flexible_datetime};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;

/// Bulk import of payments from an uploaded CSV file.
#[derive(Clone)]
pub struct CsvIngestService {
    store: Arc<dyn PaymentStore>,
}

impl CsvIngestService {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    /// Parses, normalizes and inserts every usable row in one batch.
    pub async fn ingest(&self, filename: &str, data: &[u8]) -> Result<usize, AppError> {
        if !filename.ends_with(".csv") {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only CSV files are allowed."
            )));
        }

        let drafts = parse_payments(data)?;
        if drafts.is_empty() {
            tracing::warn!(filename = %filename, "CSV upload contained no usable rows");
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "No valid data found to insert."
            )));
        }

        let inserted = self.store.insert_many(drafts).await.map_err(|e| {
            tracing::error!(filename = %filename, error = %e, "Bulk payment insert failed");
            AppError::InternalError(anyhow::anyhow!("An error occurred: {}", e))
        })?;

        metrics::counter!("payments_imported_total").increment(inserted as u64);
        tracing::info!(filename = %filename, inserted, "Imported payments from CSV");

        Ok(inserted)
    }
}

/// Turns raw CSV bytes into drafts, silently dropping rows that are missing
/// a mandatory value or carry an unparseable date, amount or status.
///
/// Structural problems (invalid UTF-8, a row wider than the header) fail the
/// whole file.
pub fn parse_payments(data: &[u8]) -> Result<Vec<PaymentDraft>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers = reader.headers().map_err(malformed)?.clone();
    let columns: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name, idx))
        .collect();

    let mut drafts = Vec::new();
    let mut dropped = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(malformed)?;
        if record.len() > headers.len() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Expected {} fields in row {}, saw {}",
                headers.len(),
                line + 1,
                record.len()
            )));
        }

        let row = Row {
            columns: &columns,
            record: &record,
        };
        match row.to_draft() {
            Some(draft) => drafts.push(draft),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(kept = drafts.len(), dropped, "Dropped incomplete CSV rows");
    }

    Ok(drafts)
}

fn malformed(err: csv::Error) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("{}", err))
}

struct Row<'a> {
    columns: &'a HashMap<&'a str, usize>,
    record: &'a StringRecord,
}

impl Row<'_> {
    /// Non-empty cell under `column`, if the column exists.
    fn cell(&self, column: &str) -> Option<&str> {
        let idx = *self.columns.get(column)?;
        self.record.get(idx).filter(|value| !value.is_empty())
    }

    fn text(&self, column: &str) -> Option<String> {
        self.cell(column).map(str::to_string)
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.cell(column)?
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
    }

    fn status(&self) -> Option<PaymentStatus> {
        self.cell("payee_payment_status")?.parse().ok()
    }

    fn added_date(&self) -> Option<DateTime<Utc>> {
        parse_epoch_seconds(self.cell("payee_added_date_utc")?)
    }

    fn due_date(&self) -> Option<DateTime<Utc>> {
        parse_flexible_datetime(self.cell("payee_due_date")?)
    }

    fn to_draft(&self) -> Option<PaymentDraft> {
        let due_amount = self.number("due_amount")?;
        let discount_percent = self.number("discount_percent").unwrap_or(0.0);
        let tax_percent = self.number("tax_percent").unwrap_or(0.0);

        Some(PaymentDraft {
            payee_first_name: self.text("payee_first_name")?,
            payee_last_name: self.text("payee_last_name")?,
            payee_payment_status: self.status()?,
            payee_added_date_utc: self.added_date()?,
            payee_due_date: self.due_date()?,
            payee_address_line_1: self.text("payee_address_line_1")?,
            payee_address_line_2: self.text("payee_address_line_2"),
            payee_city: self.text("payee_city")?,
            payee_country: self.text("payee_country")?.to_uppercase(),
            payee_province_or_state: self.text("payee_province_or_state"),
            payee_postal_code: self.text("payee_postal_code")?,
            payee_phone_number: self.text("payee_phone_number")?,
            payee_email: self.text("payee_email")?,
            currency: self.text("currency")?.to_uppercase(),
            discount_percent: Some(discount_percent),
            tax_percent: Some(tax_percent),
            due_amount,
            total_due: Some(compounded_total(due_amount, tax_percent, discount_percent)),
            evidence_file_ext: self.text("evidence_file_ext"),
        })
    }
}
