use crate::error::ArchiverError;
use crate::parsers::index::IndexSelectors;
use crate::unpack::UnpackMode;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for an archiving run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Page listing the downloadable files
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Endpoint the download request form is posted to
    #[serde(default = "default_download_url")]
    pub download_url: String,

    /// Relay mailbox that receives the download e-mails
    #[serde(default)]
    pub mailbox: Option<String>,

    /// Domain of the relay's e-mail addresses
    #[serde(default = "default_relay_domain")]
    pub relay_domain: String,

    /// Base URL under which the relay renders a mailbox's latest message
    #[serde(default = "default_relay_base_url")]
    pub relay_base_url: String,

    /// Seconds to wait between requesting a file and reading the relay
    #[serde(default)]
    pub relay_delay_secs: u64,

    /// Maximum number of files to process (all when unset)
    #[serde(default)]
    pub max_docs: Option<usize>,

    /// Index into the file list to start from
    #[serde(default)]
    pub start_offset: usize,

    /// Resolve URLs but do not fetch any content
    #[serde(default)]
    pub skip_download: bool,

    /// Root directory for downloaded files, unpacked trees and the manifest
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Manifest file name inside `archive_dir`
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// When downloaded content is unpacked
    #[serde(default)]
    pub unpack: UnpackMode,

    /// Re-read the index on resume and append newly listed files
    #[serde(default)]
    pub refresh_index: bool,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Selectors used to read the index page
    #[serde(default)]
    pub selectors: IndexSelectors,
}

/// Default value for index_url
fn default_index_url() -> String {
    "http://gis.epa.ie/GetData/Download".to_string()
}

/// Default value for download_url
fn default_download_url() -> String {
    "http://gis.epa.ie/getdata/downloaddata".to_string()
}

fn default_relay_domain() -> String {
    "mail.mailback.io".to_string()
}

fn default_relay_base_url() -> String {
    "http://mailback.io/go".to_string()
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("archive")
}

fn default_manifest_file() -> String {
    "manifest.json".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            download_url: default_download_url(),
            mailbox: None,
            relay_domain: default_relay_domain(),
            relay_base_url: default_relay_base_url(),
            relay_delay_secs: 0,
            max_docs: None,
            start_offset: 0,
            skip_download: false,
            archive_dir: default_archive_dir(),
            manifest_file: default_manifest_file(),
            unpack: UnpackMode::default(),
            refresh_index: false,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            selectors: IndexSelectors::default(),
        }
    }
}

impl ArchiverConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Box<dyn Error>> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Reject settings that cannot produce a working run
    pub fn validate(&self) -> Result<(), ArchiverError> {
        for (key, value) in [
            ("index_url", &self.index_url),
            ("download_url", &self.download_url),
            ("relay_base_url", &self.relay_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ArchiverError::Config(format!("{key} '{value}' is not a URL: {e}")))?;
        }

        if let Some(mailbox) = &self.mailbox {
            if mailbox.is_empty() || mailbox.contains('@') {
                return Err(ArchiverError::Config(format!(
                    "mailbox '{mailbox}' must be a bare relay mailbox name"
                )));
            }
        }

        if self.manifest_file.is_empty() {
            return Err(ArchiverError::Config("manifest_file is empty".to_string()));
        }

        Ok(())
    }

    /// Location of the manifest file
    pub fn manifest_path(&self) -> PathBuf {
        self.archive_dir.join(&self.manifest_file)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn relay_delay(&self) -> Duration {
        Duration::from_secs(self.relay_delay_secs)
    }
}
