use crate::services::evidence_store::{ChunkStream, EvidenceDownload, EvidenceStore};
use crate::services::store::PaymentStore;
use crate::utils::ensure_object_id;
use futures::stream::StreamExt;
use service_core::error::AppError;
use std::sync::Arc;

pub const DEFAULT_MAX_EVIDENCE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = [".pdf", ".png", ".jpg"];

/// Which evidence files are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidencePolicy {
    pub max_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_EVIDENCE_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl EvidencePolicy {
    /// Checks the text from the last `.` of `filename`, case-insensitively.
    pub fn validate_extension(&self, filename: &str) -> Result<(), AppError> {
        let extension = filename
            .rfind('.')
            .map(|idx| filename[idx..].to_lowercase())
            .unwrap_or_default();

        if self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            Ok(())
        } else {
            Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid file extension. Allowed extensions are: {}",
                self.allowed_extensions.join(", ")
            )))
        }
    }

    /// Passes `chunks` through until more than `max_bytes` have gone by, then
    /// yields the size error in place of the offending chunk.
    pub fn limit<'a>(&self, chunks: ChunkStream<'a>) -> ChunkStream<'a> {
        let max_bytes = self.max_bytes;
        let mut seen = 0usize;
        chunks
            .map(move |chunk| {
                let chunk = chunk?;
                seen = seen.saturating_add(chunk.len());
                if seen > max_bytes {
                    Err(size_limit_error(max_bytes))
                } else {
                    Ok(chunk)
                }
            })
            .boxed()
    }
}

fn size_limit_error(max_bytes: usize) -> AppError {
    AppError::BadRequest(anyhow::anyhow!(
        "File size exceeds the maximum limit of {} MB.",
        max_bytes / (1024 * 1024)
    ))
}

/// Attaches evidence files to payments and serves them back.
#[derive(Clone)]
pub struct EvidenceManager {
    payments: Arc<dyn PaymentStore>,
    blobs: Arc<dyn EvidenceStore>,
    policy: EvidencePolicy,
}

impl EvidenceManager {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        blobs: Arc<dyn EvidenceStore>,
        policy: EvidencePolicy,
    ) -> Self {
        Self {
            payments,
            blobs,
            policy,
        }
    }

    pub fn policy(&self) -> &EvidencePolicy {
        &self.policy
    }

    /// Streams `chunks` into blob storage and links the blob to the payment.
    /// Returns the blob id.
    ///
    /// The payment is looked up before any byte is read. The size limit is
    /// enforced while streaming, so an oversized file is cut off and
    /// discarded mid-upload. The blob and the link are two separate writes:
    /// if the payment disappears in between the blob is left orphaned.
    pub async fn attach(
        &self,
        payment_id: &str,
        filename: &str,
        content_type: &str,
        chunks: ChunkStream<'_>,
    ) -> Result<String, AppError> {
        ensure_object_id(payment_id, "payment id")?;
        self.policy.validate_extension(filename)?;

        if self.payments.get(payment_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
        }

        let file_id = self
            .blobs
            .upload(filename, content_type, self.policy.limit(chunks))
            .await?;

        if !self.payments.set_evidence(payment_id, &file_id).await? {
            tracing::warn!(
                payment_id = %payment_id,
                file_id = %file_id,
                "Payment vanished before evidence could be linked"
            );
            return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
        }

        metrics::counter!("evidence_uploaded_total").increment(1);
        tracing::info!(
            payment_id = %payment_id,
            file_id = %file_id,
            filename = %filename,
            "Evidence attached"
        );

        Ok(file_id)
    }

    pub async fn fetch(&self, file_id: &str) -> Result<EvidenceDownload, AppError> {
        let id = ensure_object_id(file_id, "evidence_file_id")?;

        self.blobs
            .open_download(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("File not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentDraft, PaymentStatus};
    use crate::services::memory::{InMemoryEvidenceStore, InMemoryPaymentStore};
    use chrono::{TimeZone, Utc};
    use axum::body::Bytes;
    use futures::stream;
    use futures::TryStreamExt;
    use mongodb::bson::oid::ObjectId;

    const MIB: usize = 1024 * 1024;

    /// `total` bytes split into 256 KiB chunks, like a multipart body.
    fn chunks(total: usize) -> ChunkStream<'static> {
        let sizes: Vec<usize> = (0..total)
            .step_by(256 * 1024)
            .map(|start| (total - start).min(256 * 1024))
            .collect();
        stream::iter(sizes.into_iter().map(|n| Ok(Bytes::from(vec![7u8; n])))).boxed()
    }

    fn draft() -> PaymentDraft {
        PaymentDraft {
            payee_first_name: "Noor".to_string(),
            payee_last_name: "Haddad".to_string(),
            payee_payment_status: PaymentStatus::Pending,
            payee_added_date_utc: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            payee_due_date: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            payee_address_line_1: "7 Cedar Ave".to_string(),
            payee_address_line_2: None,
            payee_city: "Beirut".to_string(),
            payee_country: "LB".to_string(),
            payee_province_or_state: None,
            payee_postal_code: "1107".to_string(),
            payee_phone_number: "+9611000000".to_string(),
            payee_email: "noor@example.com".to_string(),
            currency: "USD".to_string(),
            discount_percent: None,
            tax_percent: None,
            due_amount: 40.0,
            total_due: None,
            evidence_file_ext: None,
        }
    }

    async fn manager() -> (EvidenceManager, Arc<InMemoryPaymentStore>, Arc<InMemoryEvidenceStore>, String) {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let blobs = Arc::new(InMemoryEvidenceStore::new());
        let payment = payments.insert(draft()).await.unwrap();
        let manager = EvidenceManager::new(payments.clone(), blobs.clone(), EvidencePolicy::default());
        (manager, payments, blobs, payment.id)
    }

    #[test]
    fn extension_check_uses_last_dot_and_ignores_case() {
        let policy = EvidencePolicy::default();
        assert!(policy.validate_extension("scan.PDF").is_ok());
        assert!(policy.validate_extension("archive.tar.jpg").is_ok());
        assert!(policy.validate_extension("receipt.pdf.docx").is_err());
        assert!(policy.validate_extension("noextension").is_err());
    }

    #[test]
    fn extension_error_lists_allowed_extensions() {
        let err = EvidencePolicy::default()
            .validate_extension("notes.docx")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: Invalid file extension. Allowed extensions are: .pdf, .png, .jpg"
        );
    }

    #[tokio::test]
    async fn attaches_an_accepted_file() {
        let (manager, payments, blobs, id) = manager().await;

        let file_id = manager
            .attach(&id, "proof.png", "image/png", chunks(MIB))
            .await
            .unwrap();

        let stored = payments.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.evidence_file_id.as_deref(), Some(file_id.as_str()));
        assert_eq!(blobs.len().await, 1);

        let download = manager.fetch(&file_id).await.unwrap();
        assert_eq!(download.filename, "proof.png");
        assert_eq!(download.content_type, "image/png");
        let chunks: Vec<_> = download.body.try_collect().await.unwrap();
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), MIB);
    }

    #[tokio::test]
    async fn limit_passes_exactly_max_bytes() {
        let policy = EvidencePolicy::default();
        let received: Vec<Bytes> = policy.limit(chunks(10 * MIB)).try_collect().await.unwrap();
        assert_eq!(received.iter().map(|c| c.len()).sum::<usize>(), 10 * MIB);

        let err = policy
            .limit(chunks(10 * MIB + 1))
            .try_collect::<Vec<Bytes>>()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: File size exceeds the maximum limit of 10 MB."
        );
    }

    #[tokio::test]
    async fn oversized_file_is_cut_off_and_discarded() {
        let (manager, payments, blobs, id) = manager().await;

        let err = manager
            .attach(&id, "big.pdf", "application/pdf", chunks(11 * MIB))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(blobs.is_empty().await);
        assert!(payments.get(&id).await.unwrap().unwrap().evidence_file_id.is_none());
    }

    #[tokio::test]
    async fn wrong_extension_is_rejected() {
        let (manager, _, blobs, id) = manager().await;

        let err = manager
            .attach(&id, "letter.docx", "application/msword", chunks(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let (manager, _, blobs, _) = manager().await;

        let err = manager
            .attach(&ObjectId::new().to_hex(), "a.pdf", "application/pdf", chunks(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn fetch_validates_and_resolves_ids() {
        let (manager, _, _, _) = manager().await;

        let err = manager.fetch("not-an-id").await.unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Invalid evidence_file_id");

        let err = manager.fetch(&ObjectId::new().to_hex()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.to_string(), "Not found: File not found");
    }
}
