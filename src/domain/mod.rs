pub mod bookmark;
pub mod state;

pub use bookmark::{fingerprint, Bookmark};
pub use state::{ProcessedRecord, ProcessedState, RETENTION_LIMIT};
