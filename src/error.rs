//! Error types for the archiver
//!
//! Errors fall in two groups:
//! - fatal errors ([`ArchiverError`]) that abort the run, such as failing to
//!   fetch the index or to write the manifest
//! - per-file errors ([`RetrievalError`]) that are recorded on the file's
//!   manifest entry while the run moves on to the next file

use std::path::PathBuf;
use thiserror::Error;

/// Fatal error for a whole archiving run
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// The index page could not be retrieved
    #[error("failed to fetch index page: {0}")]
    IndexFetch(#[source] TransportError),

    /// The index page could not be turned into a work list
    #[error("failed to parse index page: {0}")]
    Index(#[from] IndexError),

    /// Progress could not be loaded or persisted
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be set up
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Failure of a single HTTP exchange
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Index markup that does not describe a usable work list
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("file '{file}' refers to unknown category {category:?}")]
    UnknownCategory {
        file: String,
        category: Option<u32>,
    },
}

/// Failure reading or writing the manifest file
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Corrupt archive content or a failed write during extraction
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive: {0}")]
    Invalid(#[from] zip::result::ZipError),

    #[error("entry '{0}' escapes the destination directory")]
    UnsafePath(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking extraction task did not run to completion
    #[error("extraction aborted: {0}")]
    Aborted(String),
}

/// Per-file failure; its message is what ends up in the manifest's `error` field
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("resolution failed: {0}")]
    Resolution(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("unpack failed: {0}")]
    Archive(#[from] ArchiveError),
}
