pub mod aggregator;
pub mod dates;
pub mod differ;
pub mod extractor;
pub mod locale;

pub use aggregator::{CycleOutcome, DomainAggregator, TargetOutcome};
pub use dates::DateNormalizer;
pub use differ::{next_watermark, should_emit, Decision, MirrorDiff};
pub use extractor::{Extracted, ListingExtractor, SkipReason};
pub use locale::{DateOrder, LocaleProfile};
