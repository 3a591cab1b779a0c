use crate::models::{Payment, PaymentDraft, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use service_core::error::AppError;

/// Fields matched by a free-text search.
pub const SEARCH_FIELDS: [&str; 7] = [
    "payee_first_name",
    "payee_last_name",
    "payee_address_line_1",
    "payee_address_line_2",
    "payee_city",
    "payee_country",
    "payee_email",
];

/// Store-level filter. Only what the store can evaluate lives here; derived
/// status filtering happens after the fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    pub search: Option<String>,
}

impl PaymentFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
        }
    }

    /// Case-insensitive literal substring match over [`SEARCH_FIELDS`].
    pub fn to_document(&self) -> Document {
        match self.search.as_deref() {
            Some(term) => {
                let pattern = escape_regex(term);
                let clauses: Vec<Document> = SEARCH_FIELDS
                    .iter()
                    .map(|field| {
                        let mut clause = Document::new();
                        clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
                        clause
                    })
                    .collect();
                doc! { "$or": clauses }
            }
            None => Document::new(),
        }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        let Some(term) = self.search.as_deref() else {
            return true;
        };
        let needle = term.to_lowercase();
        [
            Some(payment.payee_first_name.as_str()),
            Some(payment.payee_last_name.as_str()),
            Some(payment.payee_address_line_1.as_str()),
            payment.payee_address_line_2.as_deref(),
            Some(payment.payee_city.as_str()),
            Some(payment.payee_country.as_str()),
            Some(payment.payee_email.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&needle))
    }
}

fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentChanges {
    pub due_amount: Option<f64>,
    pub total_due: Option<f64>,
    pub payee_payment_status: Option<PaymentStatus>,
    pub payee_due_date: Option<DateTime<Utc>>,
}

impl PaymentChanges {
    pub fn is_empty(&self) -> bool {
        self.due_amount.is_none()
            && self.total_due.is_none()
            && self.payee_payment_status.is_none()
            && self.payee_due_date.is_none()
    }

    pub fn apply_to(&self, payment: &mut Payment) {
        if let Some(amount) = self.due_amount {
            payment.due_amount = amount;
        }
        if let Some(total) = self.total_due {
            payment.total_due = Some(total);
        }
        if let Some(status) = self.payee_payment_status {
            payment.payee_payment_status = status;
        }
        if let Some(due) = self.payee_due_date {
            payment.payee_due_date = due;
        }
    }

    fn to_set_document(&self) -> Result<Document, AppError> {
        let mut set = Document::new();
        if let Some(amount) = self.due_amount {
            set.insert("due_amount", amount);
        }
        if let Some(total) = self.total_due {
            set.insert("total_due", total);
        }
        if let Some(status) = self.payee_payment_status {
            let status = mongodb::bson::to_bson(&status).map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to serialize status: {}", e))
            })?;
            set.insert("payee_payment_status", status);
        }
        if let Some(due) = self.payee_due_date {
            set.insert(
                "payee_due_date",
                Bson::DateTime(mongodb::bson::DateTime::from_chrono(due)),
            );
        }
        Ok(set)
    }
}

/// The system of record for payments.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// One page, newest `payee_added_date_utc` first.
    async fn find_page(
        &self,
        filter: &PaymentFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Payment>, AppError>;

    /// Every match, unordered and unbounded.
    async fn find_all(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Payment>, AppError>;

    async fn insert(&self, draft: PaymentDraft) -> Result<Payment, AppError>;

    /// All-or-nothing from the caller's point of view: a failure aborts the batch.
    async fn insert_many(&self, drafts: Vec<PaymentDraft>) -> Result<usize, AppError>;

    /// Returns the record after the update, or `None` if it does not exist.
    async fn update(&self, id: &str, changes: &PaymentChanges)
        -> Result<Option<Payment>, AppError>;

    /// Returns `false` if the record does not exist.
    async fn set_evidence(&self, id: &str, evidence_file_id: &str) -> Result<bool, AppError>;

    /// Returns `false` if the record does not exist.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Ids are stored as ObjectIds; anything that does not parse cannot exist.
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

#[derive(Clone)]
pub struct MongoPaymentStore {
    collection: Collection<Payment>,
}

impl MongoPaymentStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("payments"),
        }
    }

    pub async fn init_indexes(&self) -> Result<(), AppError> {
        let added_index = IndexModel::builder()
            .keys(doc! { "payee_added_date_utc": -1 })
            .options(
                IndexOptions::builder()
                    .name("added_date_desc".to_string())
                    .build(),
            )
            .build();

        self.collection
            .create_index(added_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create added_date index on payments: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on payments.payee_added_date_utc");

        Ok(())
    }
}

#[async_trait]
impl PaymentStore for MongoPaymentStore {
    async fn find_page(
        &self,
        filter: &PaymentFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Payment>, AppError> {
        let find_options = FindOptions::builder()
            .sort(doc! { "payee_added_date_utc": -1 })
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();

        let cursor = self
            .collection
            .find(filter.to_document(), find_options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_all(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let cursor = self.collection.find(filter.to_document(), None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get(&self, id: &str) -> Result<Option<Payment>, AppError> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self.collection.find_one(doc! { "_id": oid }, None).await?)
    }

    async fn insert(&self, draft: PaymentDraft) -> Result<Payment, AppError> {
        let payment = Payment::from_draft(ObjectId::new().to_hex(), draft);
        self.collection.insert_one(&payment, None).await?;
        Ok(payment)
    }

    async fn insert_many(&self, drafts: Vec<PaymentDraft>) -> Result<usize, AppError> {
        if drafts.is_empty() {
            return Ok(0);
        }

        let payments: Vec<Payment> = drafts
            .into_iter()
            .map(|draft| Payment::from_draft(ObjectId::new().to_hex(), draft))
            .collect();
        let result = self.collection.insert_many(payments, None).await?;
        Ok(result.inserted_ids.len())
    }

    async fn update(
        &self,
        id: &str,
        changes: &PaymentChanges,
    ) -> Result<Option<Payment>, AppError> {
        if changes.is_empty() {
            return self.get(id).await;
        }
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };

        let set = changes.to_set_document()?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": set }, options)
            .await?)
    }

    async fn set_evidence(&self, id: &str, evidence_file_id: &str) -> Result<bool, AppError> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };
        let result = self
            .collection
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": { "evidence_file_id": evidence_file_id } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };
        let result = self.collection.delete_one(doc! { "_id": oid }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.collection.estimated_document_count(None).await?;
        Ok(())
    }
}
