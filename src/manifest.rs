use crate::descriptor::FileDescriptor;
use crate::error::ManifestError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Durable record of every file's progress, rewritten after each processed file
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previously saved entries, or `None` when no manifest exists yet
    pub async fn load(&self) -> Result<Option<Vec<FileDescriptor>>, ManifestError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                ::log::debug!("No manifest at {}", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(ManifestError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let files: Vec<FileDescriptor> =
            serde_json::from_str(&contents).map_err(|source| ManifestError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        ::log::debug!(
            "Loaded {} entries from {}",
            files.len(),
            self.path.display()
        );
        Ok(Some(files))
    }

    /// Replaces the manifest with `files`
    ///
    /// The JSON is written and synced next to the manifest, then renamed
    /// over it, so a reader never sees a half-written file.
    pub async fn save(&self, files: &[FileDescriptor]) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(files).map_err(ManifestError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }

        let tmp = self.tmp_path();
        let mut out = fs::File::create(&tmp).await.map_err(|e| self.io_error(e))?;
        out.write_all(json.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        out.sync_all().await.map_err(|e| self.io_error(e))?;
        drop(out);
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        ::log::trace!("Saved {} entries to {}", files.len(), self.path.display());
        Ok(())
    }

    /// Sibling the manifest is written to before it replaces the manifest
    pub fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> ManifestError {
        ManifestError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
