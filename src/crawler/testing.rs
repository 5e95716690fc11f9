//! Shared test doubles for the crawler

use crate::crawler::fetcher::{FetchError, FetchErrorKind, Fetcher, PageContent};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const BASE: &str = "https://www.flickr.com";

/// Serves canned bodies; unknown URLs fail to connect
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockFetcher {
    /// Registers a body for `path` under `BASE`
    pub fn with_page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(format!("{}/{}", BASE, path), body.to_string());
        self
    }

    /// Delays every response, for cancellation tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.pages.get(url) {
            Some(body) => Ok(PageContent::new(url, body.clone())),
            None => Err(FetchError::new(
                url,
                FetchErrorKind::Connect("connection refused".to_string()),
            )),
        }
    }
}

pub fn geo_body(lat: f64, lon: f64) -> String {
    format!(
        r#"{{"hasGeo":true,"latitude":{},"longitude":{},"accuracy":16}}"#,
        lat, lon
    )
}

/// Listing page embedding `(owner, id)` pairs in a modelExport block
pub fn listing_body(photos: &[(&str, &str)]) -> String {
    let entries: Vec<String> = photos
        .iter()
        .map(|(owner, id)| format!(r#"{{"pathAlias":"{}","id":"{}","title":"t{}"}}"#, owner, id, id))
        .collect();
    format!(
        r#"<html><script class="modelExport">{{"photos":{{"_data":[{}],"fetchedStart":true}}}}</script></html>"#,
        entries.join(",")
    )
}
