pub mod record;

pub use record::{CanonicalRecord, Classification, PartialRecord};
