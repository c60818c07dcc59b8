use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A group of files as listed on the index page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Numeric id scraped from the header's class attribute
    pub id: u32,

    /// Visible header text
    pub title: String,
}

impl Category {
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// Represents one dataset entry and how far its retrieval has progressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Opaque id used to request the file
    pub id: String,

    /// Category the entry was listed under
    pub category: Arc<Category>,

    /// Display name from the index page
    pub title: String,

    /// Direct download URL, once resolved through the relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// File name on disk, decoded from the last segment of `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,

    /// Set once the bytes have been written under `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,

    /// Lowercase hex SHA-1 of the persisted bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1sum: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Cause of the last failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stages a file moves through while it is being archived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalState {
    Discovered,
    UrlResolved,
    Downloaded,
    Failed,
}

impl FileDescriptor {
    /// Create a freshly discovered entry
    pub fn new(id: impl Into<String>, category: Arc<Category>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            title: title.into(),
            url: None,
            name: None,
            last_modified_at: None,
            received_at: None,
            sha1sum: None,
            size: None,
            error: None,
        }
    }

    /// Whether the bytes have been fetched and written
    pub fn is_received(&self) -> bool {
        self.received_at.is_some()
    }

    /// Received with no outstanding failure; such entries are skipped on resume
    pub fn is_complete(&self) -> bool {
        self.is_received() && self.error.is_none()
    }

    /// The furthest stage the persisted fields show
    pub fn state(&self) -> RetrievalState {
        if self.error.is_some() {
            RetrievalState::Failed
        } else if self.is_received() {
            RetrievalState::Downloaded
        } else if self.url.is_some() {
            RetrievalState::UrlResolved
        } else {
            RetrievalState::Discovered
        }
    }
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Files in the manifest
    pub total: usize,
    /// Files handed to the retrieval workflow
    pub attempted: usize,
    pub archived: usize,
    pub unpacked: usize,
    /// Files left with a URL but no content (dry run)
    pub resolved_only: usize,
    /// Files in the window that were already complete
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}
