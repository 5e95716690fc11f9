//! Work items and the records produced from them

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A photo reference discovered on a listing page
///
/// Deserialized straight from the listing page's embedded photo list.
/// Numbers are kept in their decimal form; missing, null or structured
/// values become empty strings so that incomplete entries still reach
/// extraction, which rejects them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct WorkItem {
    /// Owner path alias, used in the canonical photo URL
    #[serde(rename = "pathAlias", default, deserialize_with = "lenient_string")]
    pub owner: String,

    /// Photo identifier; the uniqueness key of a work item
    #[serde(rename = "id", default, deserialize_with = "lenient_string")]
    pub item_id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
}

impl WorkItem {
    pub fn new(owner: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            item_id: item_id.into(),
            title: String::new(),
            description: String::new(),
        }
    }

    /// Sets title and description, consuming the item
    pub fn with_text(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.title = title.into();
        self.description = description.into();
        self
    }

    /// Whether both identity fields are present
    pub fn has_identity(&self) -> bool {
        !self.owner.is_empty() && !self.item_id.is_empty()
    }
}

/// A latitude/longitude pair
///
/// Both coordinates are always present; a page that reports only one of
/// them is treated as carrying no geo data at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Parses a coordinate pair from its textual form
    ///
    /// Returns None unless both values parse and lie in range.
    pub fn parse(latitude: &str, longitude: &str) -> Option<Self> {
        let latitude: f64 = latitude.trim().parse().ok()?;
        let longitude: f64 = longitude.trim().parse().ok()?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        Some(Self {
            latitude,
            longitude,
        })
    }
}

/// A fully extracted photo, ready for the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub owner: String,
    pub item_id: String,
    pub title: String,
    pub description: String,

    /// Canonical detail page URL
    pub url: String,

    pub geo: GeoPoint,
}

impl Record {
    pub fn new(item: &WorkItem, url: String, geo: GeoPoint) -> Self {
        Self {
            owner: item.owner.clone(),
            item_id: item.item_id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            url,
            geo,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.geo.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.geo.longitude
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}
