//! HTML extraction for search-results and listing-detail pages.
//!
//! All structural knowledge of the site's markup lives here. The list page
//! repeats one container shape per ad; containers missing their title link
//! are skipped, every other field is optional and defaulted. Markup is parsed
//! forgivingly, so partial or broken pages degrade to fewer results, not
//! errors.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::error::ParseError;
use super::normalize;
use crate::models::{ListingDetail, ListingStub};

const BASE_URL: &str = "https://bazos.sk";

/// Phrases the site renders when a listing has been pulled. Any one of them
/// appearing in the page text marks the listing unavailable.
const UNAVAILABLE_PHRASES: &[&str] = &[
    "inzerát bol vymazaný",
    "inzerát už nie je dostupný",
    "inzerát bol stiahnutý",
    "inzerát neexistuje",
];

static LISTING_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/inzerat/(\d+)/").expect("valid regex"));
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d .]{7,14}\d").expect("valid regex"));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.]+").expect("valid regex"));

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{css}: {e}")))
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Make a relative or protocol-relative href absolute.
fn resolve_url(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{BASE_URL}{href}")
    } else {
        format!("{BASE_URL}/{href}")
    }
}

/// Derive the merge key from a detail URL: the numeric id segment when the
/// URL has one, otherwise a stable hash of the whole URL.
fn external_id_from_url(url: &str) -> String {
    if let Some(caps) = LISTING_ID.captures(url) {
        return caps[1].to_string();
    }
    let digest = Sha256::digest(url.as_bytes());
    format!("{digest:x}")[..16].to_string()
}

/// Extracts listing stubs from a search-results page.
pub struct SearchPageParser {
    container: Selector,
    title_link: Selector,
    price: Selector,
    date: Selector,
    location: Selector,
    views: Selector,
}

impl SearchPageParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            container: selector("div.inzeraty.inzeratyflex")?,
            title_link: selector("div.inzeratynadpis h2.nadpis a")?,
            price: selector("div.inzeratycena")?,
            date: selector("div.inzeratynadpis span.velikost10")?,
            location: selector("div.inzeratylok")?,
            views: selector("div.inzeratyview")?,
        })
    }

    /// Parse all ad containers on the page, oldest-allowed cutoff applied.
    ///
    /// Stubs with a known publish date older than `max_age_days` are dropped
    /// here so their detail pages are never fetched; stubs without a date
    /// pass through. An empty page yields an empty vec.
    pub fn parse(&self, html: &str, max_age_days: i64, now: DateTime<Utc>) -> Vec<ListingStub> {
        let document = Html::parse_document(html);
        let cutoff = now - Duration::days(max_age_days);
        let mut stubs = Vec::new();

        for container in document.select(&self.container) {
            let Some(stub) = self.parse_container(&container, now) else {
                debug!("skipping ad container without title link");
                continue;
            };

            if let Some(published) = stub.published_at {
                if published < cutoff {
                    debug!(id = %stub.external_id, "skipping listing older than cutoff");
                    continue;
                }
            }
            stubs.push(stub);
        }

        debug!(count = stubs.len(), "parsed search page");
        stubs
    }

    fn parse_container(&self, container: &ElementRef, now: DateTime<Utc>) -> Option<ListingStub> {
        // the title anchor is the one required node per ad
        let link = container.select(&self.title_link).next()?;
        let href = link.value().attr("href")?;

        let url = resolve_url(href);
        let title = element_text(&link);

        let text_of = |sel: &Selector| {
            container
                .select(sel)
                .next()
                .map(|el| element_text(&el))
                .unwrap_or_default()
        };

        Some(ListingStub {
            external_id: external_id_from_url(&url),
            title,
            price: normalize::parse_price(&text_of(&self.price)),
            published_at: normalize::parse_relative_date(&text_of(&self.date), now),
            location_raw: text_of(&self.location),
            view_count: normalize::parse_view_count(&text_of(&self.views)),
            url,
        })
    }
}

/// Extracts the detail bundle from a listing's own page.
pub struct DetailPageParser {
    description: Selector,
    images: Selector,
    contact: Selector,
}

impl DetailPageParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            description: selector("div.popisdetail")?,
            images: selector("img[src]")?,
            contact: selector("div.inzeratydetdetail")?,
        })
    }

    pub fn parse(&self, html: &str) -> ListingDetail {
        let document = Html::parse_document(html);

        let description = document
            .select(&self.description)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_default();

        let images = self.collect_images(&document);

        let page_lower = html.to_lowercase();
        let is_available = !UNAVAILABLE_PHRASES
            .iter()
            .any(|phrase| page_lower.contains(phrase));

        let (seller_name, seller_phone, seller_email) = self.parse_contact(&document);

        ListingDetail {
            description,
            images,
            is_available,
            seller_name,
            seller_phone,
            seller_email,
        }
    }

    /// Full-size listing photos: site image path, thumbnails excluded,
    /// duplicates dropped, page order preserved.
    fn collect_images(&self, document: &Html) -> Vec<String> {
        let mut images = Vec::new();
        for img in document.select(&self.images) {
            let Some(src) = img.value().attr("src") else {
                continue;
            };
            if !src.contains("bazos.sk/img/") || src.ends_with("t.jpg") {
                continue;
            }
            let url = resolve_url(src);
            if !images.contains(&url) {
                images.push(url);
            }
        }
        images
    }

    fn parse_contact(&self, document: &Html) -> (Option<String>, Option<String>, Option<String>) {
        let Some(block) = document.select(&self.contact).next() else {
            return (None, None, None);
        };

        let lines: Vec<String> = block
            .text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if lines.is_empty() {
            warn!("contact block present but empty");
            return (None, None, None);
        }

        let joined = lines.join("\n");
        let phone = PHONE.find(&joined).map(|m| m.as_str().trim().to_string());
        let email = EMAIL.find(&joined).map(|m| m.as_str().to_string());
        // best effort: the block starts with the seller's name
        let name = lines
            .iter()
            .find(|l| !PHONE.is_match(l.as_str()) && !EMAIL.is_match(l.as_str()))
            .cloned();

        (name, phone, email)
    }
}
