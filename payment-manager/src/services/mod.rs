pub mod database;
pub mod evidence;
pub mod evidence_store;
pub mod ingest;
pub mod memory;
pub mod metrics;
pub mod query;
pub mod status;
pub mod store;

pub use database::MongoDb;
pub use evidence::{EvidenceManager, EvidencePolicy};
pub use evidence_store::{EvidenceDownload, EvidenceStore, GridFsEvidenceStore};
pub use ingest::CsvIngestService;
pub use memory::{InMemoryEvidenceStore, InMemoryPaymentStore};
pub use self::metrics::{init_metrics, render_metrics};
pub use query::{ListQuery, PaymentPage, PaymentQueryService};
pub use store::{MongoPaymentStore, PaymentChanges, PaymentFilter, PaymentStore};
