use askama::Template;
use chrono::Local;

use crate::models::Listing;

/// Plain-text notification for one new listing.
#[derive(Template)]
#[template(
    source = "{{ title }}\n{% if !subtitle.is_empty() %}{{ subtitle }}\n{% endif %}{% if !price.is_empty() %}{{ price }}\n{% endif %}Listed {{ published }}\n{{ url }}",
    ext = "txt"
)]
pub struct ListingMessage<'a> {
    pub title: &'a str,
    pub subtitle: &'a str,
    pub price: &'a str,
    pub published: String,
    pub url: &'a str,
}

impl<'a> ListingMessage<'a> {
    pub fn new(listing: &'a Listing) -> Self {
        Self {
            title: &listing.title,
            subtitle: &listing.subtitle,
            price: &listing.price,
            published: listing
                .published_at
                .with_timezone(&Local)
                .format("%d %b %H:%M")
                .to_string(),
            url: &listing.url,
        }
    }
}

/// Renders the message for a listing, falling back to its bare URL.
pub fn render_listing(listing: &Listing) -> String {
    match ListingMessage::new(listing).render() {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Could not render message for {}: {}", listing.url, e);
            listing.url.clone()
        }
    }
}
