use clap::Parser;
use mailback_archiver::ArchiverConfig;
use mailback_archiver::unpack::UnpackMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mailback-archiver")]
#[command(about = "Archives dataset files that are only delivered by e-mail")]
#[command(version)]
pub struct Args {
    /// JSON configuration file; flags and environment variables override it
    #[arg(short, long, env = "SCRAPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Page listing the downloadable files
    #[arg(long, env = "SCRAPER_INDEX_URL")]
    pub index_url: Option<String>,

    /// Endpoint the download request form is posted to
    #[arg(long, env = "SCRAPER_DOWNLOAD_URL")]
    pub download_url: Option<String>,

    /// Relay mailbox that receives the download e-mails
    #[arg(short, long, env = "SCRAPER_MAILBACK_MAILBOX")]
    pub mailbox: Option<String>,

    /// Maximum number of files to process
    #[arg(short = 'n', long, env = "SCRAPER_MAX_DOCS")]
    pub max_docs: Option<usize>,

    /// Index into the file list to start from
    #[arg(long, env = "SCRAPER_START_OFFSET")]
    pub start_offset: Option<usize>,

    /// Resolve download URLs without fetching any content
    #[arg(long, env = "SCRAPER_SKIP_DOWNLOAD")]
    pub skip_download: bool,

    /// Directory for downloads, unpacked archives and the manifest
    #[arg(short, long, env = "SCRAPER_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    /// When to unpack downloaded content (auto, always, never)
    #[arg(long, env = "SCRAPER_UNPACK")]
    pub unpack: Option<UnpackMode>,

    /// Seconds to wait before reading the relay after each request
    #[arg(long, env = "SCRAPER_RELAY_DELAY")]
    pub relay_delay: Option<u64>,

    /// Re-read the index on resume and append newly listed files
    #[arg(long, env = "SCRAPER_REFRESH_INDEX")]
    pub refresh_index: bool,
}

impl Args {
    /// Merge the flags over the configuration file (or the defaults)
    pub fn into_config(self) -> Result<ArchiverConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ArchiverConfig::from_file(path)?,
            None => ArchiverConfig::default(),
        };

        if let Some(index_url) = self.index_url {
            config.index_url = index_url;
        }
        if let Some(download_url) = self.download_url {
            config.download_url = download_url;
        }
        if self.mailbox.is_some() {
            config.mailbox = self.mailbox;
        }
        if self.max_docs.is_some() {
            config.max_docs = self.max_docs;
        }
        if let Some(start_offset) = self.start_offset {
            config.start_offset = start_offset;
        }
        if let Some(archive_dir) = self.archive_dir {
            config.archive_dir = archive_dir;
        }
        if let Some(unpack) = self.unpack {
            config.unpack = unpack;
        }
        if let Some(relay_delay) = self.relay_delay {
            config.relay_delay_secs = relay_delay;
        }
        config.skip_download |= self.skip_download;
        config.refresh_index |= self.refresh_index;

        Ok(config)
    }
}
