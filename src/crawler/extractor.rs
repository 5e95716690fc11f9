//! Page extraction for listing and detail pages
//!
//! Everything that knows about the page format lives here, behind the
//! `Site` trait, so orchestration never depends on markup details.
//!
//! Listing pages embed their photo list as JSON inside a
//! `<script class="modelExport">` block:
//!
//! ```text
//! "photos":{"_data":[{"pathAlias":"parismadrid","id":"2099310718","title":"Paris",...}],"fetchedStart":...
//! ```
//!
//! Detail pages carry the coordinates in a geo model:
//!
//! ```text
//! {"hasGeo":true,"latitude":48.853187,"longitude":2.350301,"accuracy":15,...}
//! ```

use crate::crawler::fetcher::{FetchError, PageContent};
use crate::state::{GeoPoint, Record, WorkItem};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

static PHOTO_LIST_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"photos":\{"_data":(.*),"fetchedStart""#).expect("valid photo list regex")
});

static GEO_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""latitude":([-\d.]+),"longitude":([-\d.]+)"#).expect("valid geo regex")
});

/// Why a listing page yielded no work items
#[derive(Debug, Error)]
pub enum DiscoveryParseError {
    #[error("no modelExport script block found")]
    MissingDataBlock,

    #[error("script block has no photo list")]
    MissingPhotoList,

    #[error("photo list is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// Why a work item did not produce a record
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Owner or id missing, so no canonical URL can be built
    #[error("work item has no resolvable identity (owner: '{owner}', id: '{item_id}')")]
    Identity { owner: String, item_id: String },

    /// Detail page fetched but it carries no coordinates
    #[error("no geo data on {url}")]
    GeoAbsent { url: String },

    /// Detail page could not be fetched
    #[error("detail page unreachable: {0}")]
    GeoFetch(#[source] FetchError),
}

impl ExtractError {
    /// Only fetch failures can succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GeoFetch(_))
    }
}

/// Outcome of looking up coordinates for one detail page
///
/// "Fetched but no coordinates" and "could not fetch" are kept apart.
#[derive(Debug)]
pub enum GeoLookup {
    Found(GeoPoint),
    Absent,
    FetchFailed(FetchError),
}

/// Site-specific extraction capabilities
pub trait Site: Send + Sync + 'static {
    /// Lists the work items embedded in a listing page, in page order
    fn discover(&self, listing: &PageContent) -> Result<Vec<WorkItem>, DiscoveryParseError>;

    /// Canonical detail page URL for a work item
    fn detail_url(&self, item: &WorkItem) -> Result<String, ExtractError>;

    /// Finds a coordinate pair in raw detail page content
    fn extract_geo(&self, body: &str) -> Option<GeoPoint>;

    /// Turns a detail fetch result into a three-way geo outcome
    fn lookup_geo(&self, detail: Result<PageContent, FetchError>) -> GeoLookup {
        match detail {
            Ok(page) => match self.extract_geo(&page.body) {
                Some(geo) => GeoLookup::Found(geo),
                None => GeoLookup::Absent,
            },
            Err(e) => GeoLookup::FetchFailed(e),
        }
    }

    /// Builds the record for a work item from its geo outcome
    fn extract_record(&self, item: &WorkItem, detail: GeoLookup) -> Result<Record, ExtractError> {
        let url = self.detail_url(item)?;
        match detail {
            GeoLookup::Found(geo) => Ok(Record::new(item, url, geo)),
            GeoLookup::Absent => Err(ExtractError::GeoAbsent { url }),
            GeoLookup::FetchFailed(e) => Err(ExtractError::GeoFetch(e)),
        }
    }
}

/// Extraction rules for Flickr search and photo pages
#[derive(Debug, Clone)]
pub struct FlickrSite {
    base_url: Url,
}

impl FlickrSite {
    /// Creates the site rooted at `base_url` (e.g. `https://www.flickr.com`)
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }
}

impl Site for FlickrSite {
    fn discover(&self, listing: &PageContent) -> Result<Vec<WorkItem>, DiscoveryParseError> {
        let document = Html::parse_document(&listing.body);
        let selector =
            Selector::parse("script.modelExport").map_err(|_| DiscoveryParseError::MissingDataBlock)?;

        let script = document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .ok_or(DiscoveryParseError::MissingDataBlock)?;

        let captures = PHOTO_LIST_REGEX
            .captures(&script)
            .ok_or(DiscoveryParseError::MissingPhotoList)?;
        let raw = captures[1].trim();

        // Entries are parsed one by one: the list is sparse and may hold nulls
        let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;
        let items = entries
            .into_iter()
            .filter(|entry| !entry.is_null())
            .filter_map(|entry| match serde_json::from_value::<WorkItem>(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(url = %listing.url, "Skipping unreadable photo entry: {}", e);
                    None
                }
            })
            .collect();

        Ok(items)
    }

    fn detail_url(&self, item: &WorkItem) -> Result<String, ExtractError> {
        let identity_error = || ExtractError::Identity {
            owner: item.owner.clone(),
            item_id: item.item_id.clone(),
        };

        if !item.has_identity() {
            return Err(identity_error());
        }

        self.base_url
            .join(&format!("photos/{}/{}", item.owner, item.item_id))
            .map(String::from)
            .map_err(|_| identity_error())
    }

    fn extract_geo(&self, body: &str) -> Option<GeoPoint> {
        let captures = GEO_REGEX.captures(body)?;
        GeoPoint::parse(&captures[1], &captures[2])
    }
}
