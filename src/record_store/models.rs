use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RecordStoreError;

/// One catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub artist: String,
    pub album: String,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub store: Option<String>,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Writable part of a [`Record`], used by create and edit.
///
/// On edit, a `None` filename keeps the image already attached to the record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub artist: String,
    pub album: String,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub store: Option<String>,
    pub filename: Option<String>,
}

/// Trims a free-form input, mapping blank values to `None`.
pub fn non_blank<S: AsRef<str>>(value: Option<S>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.as_ref().trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl RecordFields {
    /// Trims every field and drops blank optional values.
    pub fn normalized(self) -> Self {
        Self {
            artist: self.artist.trim().to_string(),
            album: self.album.trim().to_string(),
            genre: non_blank(self.genre),
            year: non_blank(self.year),
            store: non_blank(self.store),
            filename: non_blank(self.filename),
        }
    }

    pub fn validate(&self) -> Result<(), RecordStoreError> {
        if self.artist.trim().is_empty() {
            return Err(RecordStoreError::Validation("artist is required".to_string()));
        }
        if self.album.trim().is_empty() {
            return Err(RecordStoreError::Validation("album is required".to_string()));
        }
        Ok(())
    }
}

/// The two recency-tracked lookup lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceCategory {
    Genre,
    Store,
}

impl ChoiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceCategory::Genre => "genre",
            ChoiceCategory::Store => "store",
        }
    }

    pub(super) fn table_name(&self) -> &'static str {
        match self {
            ChoiceCategory::Genre => "genres",
            ChoiceCategory::Store => "stores",
        }
    }
}

impl fmt::Display for ChoiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChoiceCategory {
    type Err = RecordStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "genre" => Ok(ChoiceCategory::Genre),
            "store" => Ok(ChoiceCategory::Store),
            other => Err(RecordStoreError::UnknownCategory(other.to_string())),
        }
    }
}

/// A previously used genre or store name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChoiceEntry {
    pub name: String,
    /// Epoch milliseconds of the latest use.
    pub last_used: i64,
}
