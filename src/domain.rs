use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Maximum number of rows the backend is asked to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Limit(u32);

impl Limit {
    pub fn new(value: i64) -> Result<Self, SearchError> {
        if (1..=i64::from(MAX_LIMIT)).contains(&value) {
            Ok(Self(value as u32))
        } else {
            Err(SearchError::InvalidLimit(value))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

impl TryFrom<i64> for Limit {
    type Error = SearchError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Limit> for u32 {
    fn from(limit: Limit) -> Self {
        limit.0
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Limit {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = value
            .trim()
            .parse::<i64>()
            .map_err(|_| SearchError::InvalidFilter(format!("limit: {value}")))?;
        Self::new(parsed)
    }
}

/// Ordered set of selected file type tags.
///
/// Adding a tag that is already selected is a no-op, so the encoded query
/// never carries the same `type` twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TypeSelection(Vec<String>);

impl TypeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if tag.is_empty() || self.0.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|selected| selected != tag);
        before != self.0.len()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|selected| selected == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TypeSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selection = Self::new();
        for tag in iter {
            selection.add(tag);
        }
        selection
    }
}

impl From<Vec<String>> for TypeSelection {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<TypeSelection> for Vec<String> {
    fn from(selection: TypeSelection) -> Self {
        selection.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub id: Option<i64>,
    pub job_id: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub types: TypeSelection,
    #[serde(default)]
    pub limit: Limit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialUsageFilters {
    pub job_id: Option<String>,
    pub name: Option<String>,
    pub xb_type: Option<String>,
    pub thickness: Option<String>,
    pub size: Option<String>,
    pub units_up: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub depth: Option<i64>,
    #[serde(default)]
    pub limit: Limit,
}

/// One row returned by `/search` or `/material_usage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub id: i64,
    pub job_id: String,
    pub resource_type: String,
    pub abs_path: String,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}
