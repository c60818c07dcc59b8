use crate::descriptor::FileDescriptor;
use crate::error::{ArchiveError, RetrievalError};
use crate::layout::ArchiveLayout;
use crate::parsers::relay::file_name_from_url;
use crate::resolver::UrlResolver;
use crate::transport::Transport;
use crate::unpack::{UnpackMode, is_archive, unpack};
use crate::utils::{sanitize_id, sha1_hex};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// How a file's pass through the workflow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Content stored; it was not an archive
    Archived,
    /// Content stored and its archive unpacked
    Unpacked,
    /// URL known, content deliberately not fetched
    Resolved,
    /// Already complete before this pass
    Skipped,
    /// A stage failed; the cause is in the file's `error`
    Failed,
}

/// Settings for the retrieval workflow
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub skip_download: bool,
    pub unpack: UnpackMode,
}

/// Moves one file at a time from discovered to stored (and unpacked)
pub struct Retriever {
    resolver: Option<Arc<dyn UrlResolver>>,
    transport: Arc<dyn Transport>,
    layout: ArchiveLayout,
    options: RetrievalOptions,
}

impl Retriever {
    pub fn new(
        resolver: Option<Arc<dyn UrlResolver>>,
        transport: Arc<dyn Transport>,
        layout: ArchiveLayout,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            resolver,
            transport,
            layout,
            options,
        }
    }

    /// Runs the remaining stages for `file`, recording any failure on it
    ///
    /// Never fails: a stage error is stored in `file.error` and reported as
    /// [`Outcome::Failed`] so the caller can move on to the next file.
    pub async fn process(&mut self, file: &mut FileDescriptor) -> Outcome {
        if file.is_complete() {
            ::log::debug!("{} is already archived", file.id);
            return Outcome::Skipped;
        }

        match self.advance(file).await {
            Ok(outcome) => {
                file.error = None;
                outcome
            }
            Err(e) => {
                ::log::warn!("{} failed: {}", file.id, e);
                file.error = Some(e.to_string());
                Outcome::Failed
            }
        }
    }

    async fn advance(&mut self, file: &mut FileDescriptor) -> Result<Outcome, RetrievalError> {
        self.resolve(file).await?;

        if self.options.skip_download && !file.is_received() {
            ::log::info!("Skipping download of {}", file.id);
            return Ok(Outcome::Resolved);
        }

        let wanted = file.name.clone().unwrap_or_else(|| sanitize_id(&file.id));
        let name = self.layout.claim_name(&file.id, &wanted);
        let path = self.layout.root().join(&name);
        file.name = Some(name.clone());

        let bytes = if file.is_received() {
            if name != wanted {
                forget_content(file);
                return Err(RetrievalError::Download(format!(
                    "{wanted} belongs to another file"
                )));
            }
            self.read_stored(file, &path).await?
        } else {
            self.download(file, &path).await?
        };

        if !is_archive(&name, &bytes, self.options.unpack) {
            return Ok(Outcome::Archived);
        }

        let dest = self.layout.unpack_dir(&file.id);
        ::log::info!("Unpacking {} into {}", name, dest.display());
        let report = tokio::task::spawn_blocking(move || unpack(&bytes, &dest))
            .await
            .map_err(|e| ArchiveError::Aborted(e.to_string()))??;
        ::log::info!("Unpacked {} files from {}", report.files.len(), name);

        Ok(Outcome::Unpacked)
    }

    /// URL_RESOLVED: ask the relay for the download link unless it is known
    async fn resolve(&mut self, file: &mut FileDescriptor) -> Result<(), RetrievalError> {
        if file.url.is_some() {
            return Ok(());
        }

        let resolver = self.resolver.as_ref().ok_or_else(|| {
            RetrievalError::Resolution("no relay mailbox configured".to_string())
        })?;

        let url = resolver.resolve(file).await?;
        let wanted = file_name_from_url(&url).unwrap_or_else(|| sanitize_id(&file.id));
        file.name = Some(self.layout.claim_name(&file.id, &wanted));
        ::log::info!("Resolved {} to {}", file.id, url);
        file.url = Some(url);
        Ok(())
    }

    /// DOWNLOADED: fetch, hash and persist the content
    async fn download(
        &self,
        file: &mut FileDescriptor,
        path: &Path,
    ) -> Result<Vec<u8>, RetrievalError> {
        let url = file
            .url
            .as_deref()
            .ok_or_else(|| RetrievalError::Download("no download URL".to_string()))?;

        ::log::info!("Downloading {}", url);
        let fetched = self
            .transport
            .get_bytes(url)
            .await
            .map_err(|e| RetrievalError::Download(e.to_string()))?;

        let sha1sum = sha1_hex(&fetched.bytes);
        write_file(path, &fetched.bytes).await?;

        file.last_modified_at = fetched.last_modified;
        file.received_at = Some(Utc::now());
        file.size = Some(fetched.bytes.len() as u64);
        file.sha1sum = Some(sha1sum);

        ::log::info!(
            "Stored {} ({} bytes, sha1 {})",
            path.display(),
            fetched.bytes.len(),
            file.sha1sum.as_deref().unwrap_or_default()
        );
        Ok(fetched.bytes)
    }

    /// Content of a file fetched on an earlier pass, checked against its digest
    ///
    /// A missing or altered file loses its received marker so the next run
    /// downloads it again.
    async fn read_stored(
        &self,
        file: &mut FileDescriptor,
        path: &Path,
    ) -> Result<Vec<u8>, RetrievalError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                forget_content(file);
                return Err(RetrievalError::Download(format!(
                    "{} is missing from the archive",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(RetrievalError::Download(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        if let Some(expected) = &file.sha1sum {
            if *expected != sha1_hex(&bytes) {
                forget_content(file);
                return Err(RetrievalError::Download(format!(
                    "{} does not match its recorded sha1",
                    path.display()
                )));
            }
        }
        Ok(bytes)
    }
}

/// Writes `bytes` to `path` and waits until they reach the disk
async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), RetrievalError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RetrievalError::Download(format!("cannot create {}: {e}", parent.display())))?;
    }

    let write = async {
        let mut out = tokio::fs::File::create(path).await?;
        out.write_all(bytes).await?;
        out.sync_all().await
    };
    write
        .await
        .map_err(|e| RetrievalError::Download(format!("cannot write {}: {e}", path.display())))
}

fn forget_content(file: &mut FileDescriptor) {
    file.received_at = None;
    file.last_modified_at = None;
    file.sha1sum = None;
    file.size = None;
}
