pub mod health;
pub mod payments;
pub mod upload;

pub use health::{health_check, metrics_endpoint, readiness_check, root};
pub use payments::{
    create_payment, delete_payment, download_evidence, list_payments, update_payment,
    upload_evidence,
};
pub use upload::upload_payments;
