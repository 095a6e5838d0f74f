//! Query model for the `/videos` listing endpoint.

use serde::Deserialize;

use super::ResolveError;

/// Server-side cap on page size.
pub const MAX_PAGE_LIMIT: u32 = 32;

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sort {
    Date,
    Trending,
    Popularity,
    #[default]
    Views,
    Likes,
}

impl Sort {
    /// Wire value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Trending => "trending",
            Self::Popularity => "popularity",
            Self::Views => "views",
            Self::Likes => "likes",
        }
    }
}

/// Content rating filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rating {
    #[default]
    All,
    General,
    Ecchi,
}

impl Rating {
    /// Wire value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::General => "general",
            Self::Ecchi => "ecchi",
        }
    }
}

/// Parameters for [`ResourceResolver::list_videos`](super::ResourceResolver::list_videos).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoQuery {
    pub sort: Sort,
    pub rating: Rating,
    /// Zero-based page index.
    pub page: u32,
    /// Page size; clamped to `1..=32` when sent.
    pub limit: u32,
    pub subscribed: bool,
    /// Month filter in `YYYY-m` form, e.g. `2025-8`.
    pub date: Option<String>,
    /// Free-text search.
    pub query: Option<String>,
}

impl Default for VideoQuery {
    fn default() -> Self {
        Self {
            sort: Sort::default(),
            rating: Rating::default(),
            page: 0,
            limit: MAX_PAGE_LIMIT,
            subscribed: false,
            date: None,
            query: None,
        }
    }
}

impl VideoQuery {
    /// Query parameters in wire order.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidQuery`] for a malformed `date`.
    pub fn to_params(&self) -> Result<Vec<(&'static str, String)>, ResolveError> {
        let mut params = vec![
            ("sort", self.sort.as_str().to_string()),
            ("rating", self.rating.as_str().to_string()),
            ("page", self.page.to_string()),
            ("limit", self.limit.clamp(1, MAX_PAGE_LIMIT).to_string()),
            ("subscribed", self.subscribed.to_string()),
        ];
        if let Some(date) = &self.date {
            validate_month(date)?;
            params.push(("date", date.clone()));
        }
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            params.push(("query", query.to_string()));
        }
        Ok(params)
    }
}

fn validate_month(date: &str) -> Result<(), ResolveError> {
    let invalid = || ResolveError::invalid_query(format!("date '{date}' is not in YYYY-m form"));

    let (year, month) = date.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if month.is_empty() || month.len() > 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match month.parse::<u8>() {
        Ok(1..=12) => Ok(()),
        _ => Err(invalid()),
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoPage {
    #[serde(default)]
    pub results: Vec<VideoSummary>,
    /// Total matches across all pages.
    #[serde(default)]
    pub count: u64,
}

/// A listed video.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub num_views: u64,
    #[serde(default)]
    pub num_likes: u64,
    #[serde(default, deserialize_with = "file_size")]
    #[serde(rename = "file")]
    pub file_size: Option<u64>,
}

fn file_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct File {
        #[serde(default)]
        size: Option<u64>,
    }
    let file = Option::<File>::deserialize(deserializer)?;
    Ok(file.and_then(|f| f.size))
}
