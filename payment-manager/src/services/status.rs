//! Read-time status and total computation.
//!
//! Nothing here touches a store: the derived values are a presentation of the
//! persisted record and are never written back.

use crate::models::{Payment, PaymentStatus};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub status: PaymentStatus,
    pub total_due: f64,
}

/// Effective status of `payment` on `today` (a UTC calendar date).
///
/// Evidence wins over dates; a due date still in the future keeps whatever
/// status was persisted.
pub fn effective_status(payment: &Payment, today: NaiveDate) -> PaymentStatus {
    if payment.evidence_file_id.is_some() {
        return PaymentStatus::Completed;
    }

    let due = payment.payee_due_date.date_naive();
    if due == today {
        PaymentStatus::DueNow
    } else if due < today {
        PaymentStatus::Overdue
    } else {
        payment.payee_payment_status
    }
}

/// Tax and discount are both taken off the base amount and summed, not
/// compounded. The CSV import path uses [`compounded_total`] instead.
pub fn additive_total(due_amount: f64, tax_percent: f64, discount_percent: f64) -> f64 {
    let tax_amount = due_amount * (tax_percent / 100.0);
    let discount_amount = due_amount * (discount_percent / 100.0);
    round_cents(due_amount + tax_amount - discount_amount)
}

/// Discount first, then tax on the discounted amount. Unrounded.
pub fn compounded_total(due_amount: f64, tax_percent: f64, discount_percent: f64) -> f64 {
    due_amount * (1.0 - discount_percent / 100.0) * (1.0 + tax_percent / 100.0)
}

pub fn derive(payment: &Payment, today: NaiveDate) -> Derived {
    Derived {
        status: effective_status(payment, today),
        total_due: additive_total(
            payment.due_amount,
            payment.tax_percent.unwrap_or(0.0),
            payment.discount_percent.unwrap_or(0.0),
        ),
    }
}

/// Returns `payment` with its status and total replaced by the derived ones.
pub fn materialize(mut payment: Payment, today: NaiveDate) -> Payment {
    let derived = derive(&payment, today);
    payment.payee_payment_status = derived.status;
    payment.total_due = Some(derived.total_due);
    payment
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
