pub mod payments;

pub use payments::{
    CreatePaymentRequest, EvidenceUploadResponse, ListPaymentsParams, MessageResponse,
    PageLink, PageMetadata, PaymentListResponse, PaymentResponse, UpdatePaymentRequest,
};
