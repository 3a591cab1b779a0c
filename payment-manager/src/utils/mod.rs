pub mod datetime;
pub mod validation;

pub use datetime::{parse_epoch_seconds, parse_flexible_datetime};
pub use validation::{ensure_object_id, is_e164, ValidatedJson};
