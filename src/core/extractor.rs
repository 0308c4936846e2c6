use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::dates::DateNormalizer;
use crate::config::ExtractionConfig;
use crate::models::{Listing, Mirror};
use crate::utils::error::{AppError, ExtractError};

/// Result of looking at one item node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Listing(Listing),
    /// Layout gap: the node is not a usable listing. Traversal carries on.
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooFewChildren(usize),
    MissingLink,
    UnresolvableLink(String),
}

pub struct ListingExtractor {
    item: Selector,
    title: Selector,
    subtitle: Selector,
    price: Selector,
    date: Selector,
    link: Selector,
    tracking_markers: Vec<String>,
    title_prefixes: Vec<String>,
    min_children: usize,
    dates: DateNormalizer,
}

impl ListingExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, AppError> {
        Ok(Self {
            item: parse_selector("item", &config.item)?,
            title: parse_selector("title", &config.title)?,
            subtitle: parse_selector("subtitle", &config.subtitle)?,
            price: parse_selector("price", &config.price)?,
            date: parse_selector("date", &config.date)?,
            link: parse_selector("link", &config.link)?,
            tracking_markers: config.tracking_markers.clone(),
            title_prefixes: config.title_prefixes.clone(),
            min_children: config.min_children,
            dates: DateNormalizer::new(),
        })
    }

    /// Item nodes of a results page, in feed order.
    pub fn items<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        document.select(&self.item)
    }

    pub fn extract(
        &self,
        item: ElementRef<'_>,
        mirror: &Mirror,
        reference_year: i32,
    ) -> Result<Extracted, ExtractError> {
        let children: Vec<ElementRef<'_>> = item.children().filter_map(ElementRef::wrap).collect();
        if children.len() < self.min_children {
            return Ok(Extracted::Skip(SkipReason::TooFewChildren(children.len())));
        }

        let href = children
            .first()
            .and_then(|child| child.value().attr("href"))
            .or_else(|| item.select(&self.link).next().and_then(|a| a.value().attr("href")));
        let Some(href) = href else {
            return Ok(Extracted::Skip(SkipReason::MissingLink));
        };

        let url = match self.canonical_url(href, &mirror.url) {
            Some(url) => url,
            None => return Ok(Extracted::Skip(SkipReason::UnresolvableLink(href.to_string()))),
        };
        let Some(identity) = identity_of(&url) else {
            return Ok(Extracted::Skip(SkipReason::UnresolvableLink(href.to_string())));
        };

        let title = self.strip_title_prefix(&select_text(item, &self.title));
        let subtitle = select_text(item, &self.subtitle);
        let price = select_text(item, &self.price);
        let date = select_text(item, &self.date);

        let published_at = self
            .dates
            .normalize(&date, &mirror.domain_code, reference_year)
            .map_err(|source| ExtractError {
                mirror_url: mirror.url.clone(),
                listing_url: url.clone(),
                source,
            })?;

        Ok(Extracted::Listing(Listing {
            identity,
            url,
            title,
            subtitle,
            price,
            published_at,
        }))
    }

    /// Absolute listing URL with any tracking suffix removed, so the same
    /// listing maps to the same URL across polls.
    pub fn canonical_url(&self, href: &str, mirror_url: &str) -> Option<String> {
        let base = Url::parse(mirror_url).ok()?;
        let mut url = base.join(href.trim()).ok()?.to_string();
        for marker in &self.tracking_markers {
            if let Some(index) = url.find(marker.as_str()) {
                url.truncate(index);
            }
        }
        Some(url)
    }

    fn strip_title_prefix(&self, title: &str) -> String {
        let mut title = title.trim();
        for prefix in &self.title_prefixes {
            if let Some(rest) = title.strip_prefix(prefix.as_str()) {
                title = rest.trim_start();
            }
        }
        title.to_string()
    }
}

/// Final non-empty path segment of a canonical listing URL.
pub fn identity_of(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

fn select_text(item: ElementRef<'_>, selector: &Selector) -> String {
    item.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn parse_selector(name: &str, selector: &str) -> Result<Selector, AppError> {
    Selector::parse(selector).map_err(|e| {
        AppError::Validation(format!("Invalid CSS selector for {} '{}': {:?}", name, selector, e))
    })
}
