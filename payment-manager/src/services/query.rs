use crate::models::{Payment, PaymentStatus};
use crate::services::status;
use crate::services::store::{PaymentFilter, PaymentStore};
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use std::sync::Arc;

pub const DEFAULT_PER_PAGE: u64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u64,
    pub per_page: u64,
    pub search: Option<String>,
    pub status: Option<PaymentStatus>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPage {
    pub page: u64,
    pub per_page: u64,
    pub page_count: u64,
    pub total_count: u64,
    pub payments: Vec<Payment>,
}

#[derive(Clone)]
pub struct PaymentQueryService {
    store: Arc<dyn PaymentStore>,
}

impl PaymentQueryService {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<PaymentPage, AppError> {
        self.list_on(query, Utc::now().date_naive()).await
    }

    /// Lists one page as seen on `today`.
    ///
    /// The status filter is applied to the fetched window only, so a page can
    /// come back short (or empty) while later pages still hold matches.
    /// `total_count` on the other hand is computed over every record matching
    /// the search, which costs a full scan per call: effective status is not
    /// stored and cannot be queried.
    pub async fn list_on(&self, query: &ListQuery, today: NaiveDate) -> Result<PaymentPage, AppError> {
        if query.page < 1 {
            return Err(AppError::BadRequest(anyhow::anyhow!("page must be at least 1")));
        }
        if query.per_page < 1 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "per_page must be at least 1"
            )));
        }

        let filter = PaymentFilter {
            search: query.search.clone(),
        };
        let skip = (query.page - 1)
            .checked_mul(query.per_page)
            .filter(|skip| *skip <= i64::MAX as u64)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("page is out of range")))?;

        let fetched = self
            .store
            .find_page(&filter, skip, query.per_page)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, page = query.page, "Failed to fetch payments page");
                e
            })?;

        let payments: Vec<Payment> = fetched
            .into_iter()
            .map(|payment| status::materialize(payment, today))
            .filter(|payment| matches_status(query.status, payment.payee_payment_status))
            .collect();

        let total_count = self.count_matching(&filter, query.status, today).await?;
        let page_count = page_count(total_count, query.per_page);

        tracing::debug!(
            page = query.page,
            per_page = query.per_page,
            returned = payments.len(),
            total_count,
            "Listed payments"
        );

        Ok(PaymentPage {
            page: query.page,
            per_page: query.per_page,
            page_count,
            total_count,
            payments,
        })
    }

    async fn count_matching(
        &self,
        filter: &PaymentFilter,
        wanted: Option<PaymentStatus>,
        today: NaiveDate,
    ) -> Result<u64, AppError> {
        let all = self.store.find_all(filter).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to scan payments for count");
            e
        })?;

        Ok(all
            .iter()
            .filter(|payment| matches_status(wanted, status::effective_status(payment, today)))
            .count() as u64)
    }
}

fn matches_status(wanted: Option<PaymentStatus>, actual: PaymentStatus) -> bool {
    wanted.map_or(true, |wanted| wanted == actual)
}

pub fn page_count(total_count: u64, per_page: u64) -> u64 {
    total_count.div_ceil(per_page)
}
