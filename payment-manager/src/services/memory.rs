//! In-process stores, selected with `STORE_BACKEND=memory`. State lives only as
//! long as the process.

use crate::models::{Payment, PaymentDraft};
use crate::services::evidence_store::{ChunkStream, EvidenceDownload, EvidenceStore};
use crate::services::store::{PaymentChanges, PaymentFilter, PaymentStore};
use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<String, Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_page(
        &self,
        filter: &PaymentFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Payment>, AppError> {
        let mut matches = self.find_all(filter).await?;
        // Newest first; ObjectIds grow over time so they break ties.
        matches.sort_by(|a, b| {
            b.payee_added_date_utc
                .cmp(&a.payee_added_date_utc)
                .then_with(|| b.id.cmp(&a.id))
        });

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(matches.into_iter().skip(skip).take(limit).collect())
    }

    async fn find_all(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Payment>, AppError> {
        Ok(self.payments.read().await.get(id).cloned())
    }

    async fn insert(&self, draft: PaymentDraft) -> Result<Payment, AppError> {
        let payment = Payment::from_draft(ObjectId::new().to_hex(), draft);
        self.payments
            .write()
            .await
            .insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    async fn insert_many(&self, drafts: Vec<PaymentDraft>) -> Result<usize, AppError> {
        let mut payments = self.payments.write().await;
        let count = drafts.len();
        for draft in drafts {
            let payment = Payment::from_draft(ObjectId::new().to_hex(), draft);
            payments.insert(payment.id.clone(), payment);
        }
        Ok(count)
    }

    async fn update(
        &self,
        id: &str,
        changes: &PaymentChanges,
    ) -> Result<Option<Payment>, AppError> {
        let mut payments = self.payments.write().await;
        Ok(payments.get_mut(id).map(|payment| {
            changes.apply_to(payment);
            payment.clone()
        }))
    }

    async fn set_evidence(&self, id: &str, evidence_file_id: &str) -> Result<bool, AppError> {
        let mut payments = self.payments.write().await;
        match payments.get_mut(id) {
            Some(payment) => {
                payment.evidence_file_id = Some(evidence_file_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.payments.write().await.remove(id).is_some())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Clone)]
struct StoredFile {
    filename: String,
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
pub struct InMemoryEvidenceStore {
    files: RwLock<HashMap<ObjectId, StoredFile>>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        mut chunks: ChunkStream<'_>,
    ) -> Result<String, AppError> {
        let mut data = Vec::new();
        while let Some(chunk) = chunks.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        let id = ObjectId::new();
        self.files.write().await.insert(
            id,
            StoredFile {
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                data: Bytes::from(data),
            },
        );
        Ok(id.to_hex())
    }

    async fn open_download(&self, id: ObjectId) -> Result<Option<EvidenceDownload>, AppError> {
        let Some(file) = self.files.read().await.get(&id).cloned() else {
            return Ok(None);
        };

        Ok(Some(EvidenceDownload {
            filename: file.filename,
            content_type: file.content_type,
            length: file.data.len() as u64,
            body: stream::once(async move { Ok(file.data) }).boxed(),
        }))
    }
}
