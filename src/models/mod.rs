use chrono::{DateTime, Utc};

pub mod listing;
pub mod search_target;
pub mod watermark;

// Re-exports for convenience
pub use listing::*;
pub use search_target::*;
pub use watermark::*;

/// Absolute instant a listing was published, normalized to UTC.
pub type Timestamp = DateTime<Utc>;
