//! Domain code to date-locale resolution.
//!
//! The mapping is a closed `match`: a domain that is not listed here is an
//! explicit [`DateError::UnsupportedLocale`], never a guessed default.

use std::fmt;

use crate::utils::error::DateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocaleProfile {
    UsEnglish,
    UkEnglish,
    French,
    German,
    Spanish,
    Italian,
    Dutch,
    Polish,
}

/// Order the listing feed prints day and month in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    MonthDay,
    DayMonth,
}

/// Every domain code with a known locale, in a stable order.
pub const SUPPORTED_DOMAINS: &[&str] = &[
    "com", "ca", "com.au", "com.sg", "com.my", "ph", "co.uk", "ie", "fr", "de", "ch", "at", "es",
    "it", "nl", "pl",
];

pub fn resolve(domain_code: &str) -> Result<LocaleProfile, DateError> {
    let locale = match domain_code.trim().to_ascii_lowercase().as_str() {
        "com" | "ca" | "com.au" | "com.sg" | "com.my" | "ph" => LocaleProfile::UsEnglish,
        "co.uk" | "ie" => LocaleProfile::UkEnglish,
        "fr" => LocaleProfile::French,
        "de" | "ch" | "at" => LocaleProfile::German,
        "es" => LocaleProfile::Spanish,
        "it" => LocaleProfile::Italian,
        "nl" => LocaleProfile::Dutch,
        "pl" => LocaleProfile::Polish,
        _ => {
            return Err(DateError::UnsupportedLocale {
                domain: domain_code.to_string(),
            })
        }
    };
    Ok(locale)
}

// Lowercase spellings per month, without trailing periods.
type MonthVocabulary = [&'static [&'static str]; 12];

const ENGLISH_MONTHS: MonthVocabulary = [
    &["jan", "january"],
    &["feb", "february"],
    &["mar", "march"],
    &["apr", "april"],
    &["may"],
    &["jun", "june"],
    &["jul", "july"],
    &["aug", "august"],
    &["sep", "sept", "september"],
    &["oct", "october"],
    &["nov", "november"],
    &["dec", "december"],
];

const FRENCH_MONTHS: MonthVocabulary = [
    &["janv", "janvier", "jan"],
    &["févr", "février", "fév", "fev", "fevr", "fevrier"],
    &["mars", "mar"],
    &["avr", "avril"],
    &["mai"],
    &["juin"],
    &["juil", "juillet"],
    &["août", "aout", "aoû", "aou"],
    &["sept", "septembre", "sep"],
    &["oct", "octobre"],
    &["nov", "novembre"],
    &["déc", "décembre", "dec", "decembre"],
];

const GERMAN_MONTHS: MonthVocabulary = [
    &["jan", "januar", "jän", "jänner"],
    &["feb", "februar"],
    &["mär", "märz", "mrz", "mae", "maerz"],
    &["apr", "april"],
    &["mai"],
    &["jun", "juni"],
    &["jul", "juli"],
    &["aug", "august"],
    &["sep", "sept", "september"],
    &["okt", "oktober"],
    &["nov", "november"],
    &["dez", "dezember"],
];

const SPANISH_MONTHS: MonthVocabulary = [
    &["ene", "enero"],
    &["feb", "febrero"],
    &["mar", "marzo"],
    &["abr", "abril"],
    &["may", "mayo"],
    &["jun", "junio"],
    &["jul", "julio"],
    &["ago", "agosto"],
    &["sep", "sept", "set", "septiembre", "setiembre"],
    &["oct", "octubre"],
    &["nov", "noviembre"],
    &["dic", "diciembre"],
];

const ITALIAN_MONTHS: MonthVocabulary = [
    &["gen", "gennaio"],
    &["feb", "febbraio"],
    &["mar", "marzo"],
    &["apr", "aprile"],
    &["mag", "maggio"],
    &["giu", "giugno"],
    &["lug", "luglio"],
    &["ago", "agosto"],
    &["set", "settembre"],
    &["ott", "ottobre"],
    &["nov", "novembre"],
    &["dic", "dicembre"],
];

const DUTCH_MONTHS: MonthVocabulary = [
    &["jan", "januari"],
    &["feb", "februari"],
    &["mrt", "maa", "maart"],
    &["apr", "april"],
    &["mei"],
    &["jun", "juni"],
    &["jul", "juli"],
    &["aug", "augustus"],
    &["sep", "sept", "september"],
    &["okt", "oktober"],
    &["nov", "november"],
    &["dec", "december"],
];

const POLISH_MONTHS: MonthVocabulary = [
    &["sty", "stycznia", "styczeń"],
    &["lut", "lutego", "luty"],
    &["mar", "marca", "marzec"],
    &["kwi", "kwietnia", "kwiecień"],
    &["maj", "maja"],
    &["cze", "czerwca", "czerwiec"],
    &["lip", "lipca", "lipiec"],
    &["sie", "sierpnia", "sierpień"],
    &["wrz", "września", "wrzesień"],
    &["paź", "paz", "października", "październik"],
    &["lis", "listopada", "listopad"],
    &["gru", "grudnia", "grudzień"],
];

impl LocaleProfile {
    pub fn language_tag(&self) -> &'static str {
        match self {
            LocaleProfile::UsEnglish => "en-US",
            LocaleProfile::UkEnglish => "en-GB",
            LocaleProfile::French => "fr-FR",
            LocaleProfile::German => "de-DE",
            LocaleProfile::Spanish => "es-ES",
            LocaleProfile::Italian => "it-IT",
            LocaleProfile::Dutch => "nl-NL",
            LocaleProfile::Polish => "pl-PL",
        }
    }

    pub fn date_order(&self) -> DateOrder {
        match self {
            LocaleProfile::UsEnglish => DateOrder::MonthDay,
            _ => DateOrder::DayMonth,
        }
    }

    fn months(&self) -> &'static MonthVocabulary {
        match self {
            LocaleProfile::UsEnglish | LocaleProfile::UkEnglish => &ENGLISH_MONTHS,
            LocaleProfile::French => &FRENCH_MONTHS,
            LocaleProfile::German => &GERMAN_MONTHS,
            LocaleProfile::Spanish => &SPANISH_MONTHS,
            LocaleProfile::Italian => &ITALIAN_MONTHS,
            LocaleProfile::Dutch => &DUTCH_MONTHS,
            LocaleProfile::Polish => &POLISH_MONTHS,
        }
    }

    /// Month number (1-12) for a month name or abbreviation in this locale.
    ///
    /// An exact spelling wins. Otherwise the token is accepted as a prefix of
    /// exactly one month's spellings, so "juin" and "juil" stay distinct in
    /// French while the truncated "jui" is rejected as ambiguous.
    pub fn month_number(&self, token: &str) -> Option<u32> {
        let token = token.trim().trim_end_matches('.').to_lowercase();
        if token.is_empty() {
            return None;
        }

        let months = self.months();
        if let Some(index) = months
            .iter()
            .position(|names| names.iter().any(|name| *name == token))
        {
            return Some(index as u32 + 1);
        }

        let mut candidates = months
            .iter()
            .enumerate()
            .filter(|(_, names)| names.iter().any(|name| name.starts_with(&token)))
            .map(|(index, _)| index);
        match (candidates.next(), candidates.next()) {
            (Some(index), None) => Some(index as u32 + 1),
            _ => None,
        }
    }
}

impl fmt::Display for LocaleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.language_tag())
    }
}
