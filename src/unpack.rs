use crate::error::ArchiveError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

/// Local file header signature that starts every ZIP archive
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// When downloaded content is treated as an archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnpackMode {
    /// By `.zip` extension or ZIP signature
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for UnpackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown unpack mode '{other}'")),
        }
    }
}

/// Whether content should be handed to [`unpack`]
pub fn is_archive(name: &str, bytes: &[u8], mode: UnpackMode) -> bool {
    match mode {
        UnpackMode::Always => true,
        UnpackMode::Never => false,
        UnpackMode::Auto => {
            name.to_ascii_lowercase().ends_with(".zip") || bytes.starts_with(ZIP_MAGIC)
        }
    }
}

/// What an extraction wrote
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnpackReport {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Recreates the tree stored in a ZIP archive beneath `dest`
///
/// Entries are visited one at a time in the order the archive stores them.
/// Whatever was written before a failing entry is left in place.
pub fn unpack(bytes: &[u8], dest: &Path) -> Result<UnpackReport, ArchiveError> {
    ::log::debug!("Unpacking {} bytes into {}", bytes.len(), dest.display());

    create_dir(dest)?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut report = UnpackReport::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(ArchiveError::UnsafePath(name));
        };
        let target = dest.join(relative);

        if name.ends_with('/') {
            create_dir(&target)?;
            report.directories.push(target);
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        let mut out = fs::File::create(&target).map_err(|source| ArchiveError::Write {
            path: target.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|source| ArchiveError::Write {
            path: target.clone(),
            source,
        })?;

        ::log::trace!("Unpacked {}", target.display());
        report.files.push(target);
    }

    ::log::debug!(
        "Unpacked {} files and {} directories",
        report.files.len(),
        report.directories.len()
    );
    Ok(report)
}

fn create_dir(path: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(path).map_err(|source| ArchiveError::Write {
        path: path.to_path_buf(),
        source,
    })
}
