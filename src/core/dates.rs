//! Turns the feed's year-less date fragments ("Jun-26 06:21", "17. Nov. 04:09")
//! into absolute timestamps.

use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use super::locale::{self, DateOrder, LocaleProfile};
use crate::models::Timestamp;
use crate::utils::error::DateError;

const LAYOUT: &str = "%d %m %Y %H:%M";

pub struct DateNormalizer {
    separator_regex: Regex,
    clock_regex: Regex,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self {
            separator_regex: Regex::new(r"[\s\-]+").unwrap(),
            clock_regex: Regex::new(r"^\d{1,2}:\d{2}$").unwrap(),
        }
    }

    /// Normalizes a fragment from a mirror with the given domain code.
    ///
    /// `reference_year` supplies the year the feed leaves out.
    pub fn normalize(
        &self,
        fragment: &str,
        domain_code: &str,
        reference_year: i32,
    ) -> Result<Timestamp, DateError> {
        let locale = locale::resolve(domain_code)?;
        self.normalize_with_locale(fragment, locale, reference_year)
    }

    pub fn normalize_with_locale(
        &self,
        fragment: &str,
        locale: LocaleProfile,
        reference_year: i32,
    ) -> Result<Timestamp, DateError> {
        let tokens: Vec<&str> = fragment.split_whitespace().collect();
        let (clock, day_month) = tokens
            .split_last()
            .ok_or_else(|| DateError::malformed(fragment, "empty fragment"))?;
        if !self.clock_regex.is_match(clock) {
            return Err(DateError::malformed(fragment, format!("'{}' is not a clock time", clock)));
        }

        let joined = day_month.join(" ");
        let parts: Vec<&str> = self
            .separator_regex
            .split(&joined)
            .filter(|part| part.chars().any(char::is_alphanumeric))
            .collect();
        if parts.len() < 2 {
            return Err(DateError::malformed(fragment, "expected a day and a month"));
        }

        let (day, month) = self.day_and_month(fragment, &parts, locale)?;
        let full = format!("{} {:02} {} {}", day, month, reference_year, clock);
        let naive = NaiveDateTime::parse_from_str(&full, LAYOUT)
            .map_err(|e| DateError::malformed(fragment, format!("'{}': {}", full, e)))?;

        let local = Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| DateError::malformed(fragment, "time does not exist in the local timezone"))?;
        Ok(local.with_timezone(&Utc))
    }

    // The numeric token is the day and the alphabetic token the month, whatever
    // their order. Two numeric tokens fall back to the locale's ordering.
    fn day_and_month(
        &self,
        fragment: &str,
        parts: &[&str],
        locale: LocaleProfile,
    ) -> Result<(String, u32), DateError> {
        let numeric: Vec<&str> = parts.iter().copied().filter(|p| starts_with_digit(p)).collect();
        let alphabetic: Vec<&str> = parts.iter().copied().filter(|p| !starts_with_digit(p)).collect();

        match (numeric.first(), alphabetic.first()) {
            (Some(day), Some(month)) => {
                let day = first_n(digits(day), 2);
                let month = locale
                    .month_number(month)
                    .or_else(|| locale.month_number(&first_n(month, 3)))
                    .ok_or_else(|| {
                        DateError::malformed(
                            fragment,
                            format!("unknown {} month '{}'", locale.language_tag(), month),
                        )
                    })?;
                Ok((day, month))
            }
            (Some(_), None) if numeric.len() >= 2 => {
                let (day, month) = match locale.date_order() {
                    DateOrder::MonthDay => (numeric[1], numeric[0]),
                    DateOrder::DayMonth => (numeric[0], numeric[1]),
                };
                let month: u32 = first_n(digits(month), 2)
                    .parse()
                    .map_err(|_| DateError::malformed(fragment, format!("invalid month '{}'", month)))?;
                Ok((first_n(digits(day), 2), month))
            }
            _ => Err(DateError::malformed(fragment, "expected a day and a month")),
        }
    }
}

fn starts_with_digit(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn digits(token: &str) -> &str {
    let end = token
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

/// First `n` characters, counting code points rather than bytes.
pub fn first_n(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
