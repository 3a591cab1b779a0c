use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::{chrono_datetime_as_bson_datetime, hex_string_as_object_id};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[serde(alias = "complete")]
    Completed,
    DueNow,
    Overdue,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
            PaymentStatus::DueNow => "due_now",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" | "complete" => Ok(PaymentStatus::Completed),
            "due_now" => Ok(PaymentStatus::DueNow),
            "overdue" => Ok(PaymentStatus::Overdue),
            "pending" => Ok(PaymentStatus::Pending),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// A payment as persisted in the `payments` collection.
///
/// `payee_payment_status` and `total_due` hold whatever was last written; the
/// values shown to callers are recomputed by `services::status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    #[serde(rename = "_id", with = "hex_string_as_object_id")]
    pub id: String,
    pub payee_first_name: String,
    pub payee_last_name: String,
    pub payee_payment_status: PaymentStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub payee_added_date_utc: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub payee_due_date: DateTime<Utc>,
    pub payee_address_line_1: String,
    pub payee_address_line_2: Option<String>,
    pub payee_city: String,
    pub payee_country: String,
    pub payee_province_or_state: Option<String>,
    pub payee_postal_code: String,
    pub payee_phone_number: String,
    pub payee_email: String,
    pub currency: String,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub tax_percent: Option<f64>,
    pub due_amount: f64,
    #[serde(default)]
    pub total_due: Option<f64>,
    #[serde(default)]
    pub evidence_file_id: Option<String>,
    #[serde(default)]
    pub evidence_file_ext: Option<String>,
}

/// Everything a store needs to create a [`Payment`]; the id is the store's to assign.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub payee_first_name: String,
    pub payee_last_name: String,
    pub payee_payment_status: PaymentStatus,
    pub payee_added_date_utc: DateTime<Utc>,
    pub payee_due_date: DateTime<Utc>,
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
    pub evidence_file_ext: Option<String>,
}

impl Payment {
    pub fn from_draft(id: String, draft: PaymentDraft) -> Self {
        Self {
            id,
            payee_first_name: draft.payee_first_name,
            payee_last_name: draft.payee_last_name,
            payee_payment_status: draft.payee_payment_status,
            payee_added_date_utc: draft.payee_added_date_utc,
            payee_due_date: draft.payee_due_date,
            payee_address_line_1: draft.payee_address_line_1,
            payee_address_line_2: draft.payee_address_line_2,
            payee_city: draft.payee_city,
            payee_country: draft.payee_country,
            payee_province_or_state: draft.payee_province_or_state,
            payee_postal_code: draft.payee_postal_code,
            payee_phone_number: draft.payee_phone_number,
            payee_email: draft.payee_email,
            currency: draft.currency,
            discount_percent: draft.discount_percent,
            tax_percent: draft.tax_percent,
            due_amount: draft.due_amount,
            total_due: draft.total_due,
            evidence_file_id: None,
            evidence_file_ext: draft.evidence_file_ext,
        }
    }
}
