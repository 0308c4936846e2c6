//! Decides, listing by listing in newest-first feed order, whether a mirror's
//! feed has reached territory already seen in an earlier cycle.
//!
//! The early stop relies on the feed being sorted newest first. A source
//! without that guarantee needs a full-page scan compared against the maximum
//! timestamp instead.

use chrono::Duration;

use crate::models::{Listing, Watermark};

/// Tolerance below the watermark date. Feed order near the boundary is not
/// perfectly stable, so listings published just before the watermark are
/// still let through.
pub fn grace_window() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Emit,
    Stop,
}

/// Stateless decision for one listing against a mirror's prior watermark.
///
/// Cold state (no watermark) always emits. An exact URL match with the
/// watermark is the seen boundary itself, so it stops without emitting.
pub fn should_emit(listing: &Listing, prior: Option<&Watermark>) -> Decision {
    let Some(prior) = prior else {
        return Decision::Emit;
    };

    if listing.url == prior.last_url {
        return Decision::Stop;
    }

    if listing.published_at < prior.last_date - grace_window() {
        return Decision::Stop;
    }

    Decision::Emit
}

pub fn next_watermark(listing: &Listing) -> Watermark {
    Watermark::from_listing(listing)
}

/// Per-mirror traversal state: applies [`should_emit`] and remembers the first
/// emitted listing as the candidate watermark.
#[derive(Debug)]
pub struct MirrorDiff<'a> {
    prior: Option<&'a Watermark>,
    candidate: Option<Watermark>,
    stopped: bool,
}

impl<'a> MirrorDiff<'a> {
    pub fn new(prior: Option<&'a Watermark>) -> Self {
        Self {
            prior,
            candidate: None,
            stopped: false,
        }
    }

    pub fn observe(&mut self, listing: &Listing) -> Decision {
        if self.stopped {
            return Decision::Stop;
        }

        let decision = should_emit(listing, self.prior);
        match decision {
            Decision::Emit if self.candidate.is_none() => {
                self.candidate = Some(next_watermark(listing));
            }
            Decision::Stop => self.stopped = true,
            Decision::Emit => {}
        }
        decision
    }

    /// Whether a listing URL is exactly the previously seen boundary.
    pub fn is_boundary(&self, url: &str) -> bool {
        self.prior.is_some_and(|prior| prior.last_url == url)
    }

    /// Marks traversal as finished at a boundary found without a parsed listing.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Watermark to commit for this mirror, if it should change.
    ///
    /// The URL always moves to the candidate so it is recognised as seen on
    /// the next poll. A candidate older than the prior watermark (possible
    /// inside the grace window) keeps the prior date, so the stored date never
    /// moves backwards.
    pub fn into_update(self) -> Option<Watermark> {
        let candidate = self.candidate?;
        match self.prior {
            Some(prior) if candidate.last_date < prior.last_date => {
                Some(Watermark::new(candidate.last_url, prior.last_date))
            }
            _ => Some(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timestamp;
    use chrono::{TimeZone, Utc};

    fn at(minutes_after_noon: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 26, 12, 0, 0).unwrap() + Duration::minutes(minutes_after_noon)
    }

    fn listing(id: u32, published_at: Timestamp) -> Listing {
        Listing {
            identity: id.to_string(),
            url: format!("https://www.ebay.com/itm/{}", id),
            title: format!("Item {}", id),
            subtitle: String::new(),
            price: "$1.00".to_string(),
            published_at,
        }
    }

    #[test]
    fn test_cold_state_always_emits() {
        assert_eq!(should_emit(&listing(1, at(0)), None), Decision::Emit);
        assert_eq!(should_emit(&listing(2, at(-10_000)), None), Decision::Emit);
    }

    #[test]
    fn test_exact_url_match_stops() {
        let prior = Watermark::new("https://www.ebay.com/itm/7", at(-500));
        assert_eq!(should_emit(&listing(7, at(60)), Some(&prior)), Decision::Stop);
    }

    #[test]
    fn test_grace_window_boundary() {
        let prior = Watermark::new("https://www.ebay.com/itm/999", at(0));

        assert_eq!(should_emit(&listing(1, at(-30)), Some(&prior)), Decision::Emit);
        assert_eq!(should_emit(&listing(2, at(-60)), Some(&prior)), Decision::Emit);
        assert_eq!(should_emit(&listing(3, at(-61)), Some(&prior)), Decision::Stop);
        assert_eq!(should_emit(&listing(4, at(-90)), Some(&prior)), Decision::Stop);
        assert_eq!(should_emit(&listing(5, at(45)), Some(&prior)), Decision::Emit);
    }

    #[test]
    fn test_first_emitted_listing_becomes_candidate() {
        let prior = Watermark::new("https://www.ebay.com/itm/3", at(0));
        let mut diff = MirrorDiff::new(Some(&prior));

        assert_eq!(diff.observe(&listing(5, at(20))), Decision::Emit);
        assert_eq!(diff.observe(&listing(4, at(10))), Decision::Emit);
        assert_eq!(diff.observe(&listing(3, at(0))), Decision::Stop);
        assert!(diff.stopped());
        assert_eq!(diff.observe(&listing(9, at(90))), Decision::Stop);

        assert_eq!(
            diff.into_update(),
            Some(Watermark::new("https://www.ebay.com/itm/5", at(20)))
        );
    }

    #[test]
    fn test_nothing_new_leaves_watermark_alone() {
        let prior = Watermark::new("https://www.ebay.com/itm/3", at(0));
        let mut diff = MirrorDiff::new(Some(&prior));

        assert_eq!(diff.observe(&listing(3, at(0))), Decision::Stop);
        assert_eq!(diff.into_update(), None);
    }

    #[test]
    fn test_candidate_never_moves_watermark_backwards() {
        let prior = Watermark::new("https://www.ebay.com/itm/3", at(0));
        let mut diff = MirrorDiff::new(Some(&prior));

        assert_eq!(diff.observe(&listing(8, at(-20))), Decision::Emit);
        assert_eq!(
            diff.into_update(),
            Some(Watermark::new("https://www.ebay.com/itm/8", at(0)))
        );

        // The late listing is now the boundary and is not emitted again.
        let advanced = Watermark::new("https://www.ebay.com/itm/8", at(0));
        let mut diff = MirrorDiff::new(Some(&advanced));
        assert_eq!(diff.observe(&listing(8, at(-20))), Decision::Stop);
        assert_eq!(diff.into_update(), None);
    }

    #[test]
    fn test_cold_candidate_is_newest() {
        let mut diff = MirrorDiff::new(None);
        for (id, minutes) in [(10, 50), (9, 40), (8, 30)] {
            assert_eq!(diff.observe(&listing(id, at(minutes))), Decision::Emit);
        }
        assert!(!diff.stopped());
        assert!(!diff.is_boundary("https://www.ebay.com/itm/10"));
        assert_eq!(
            diff.into_update(),
            Some(Watermark::new("https://www.ebay.com/itm/10", at(50)))
        );
    }
}
