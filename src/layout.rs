//! Where each file's content lands below the archive root
//!
//! Every manifest entry owns one stored file and, for archives, one unpack
//! directory. A name another entry already owns, or one the manifest lives
//! at, gets a numbered variant instead so no download replaces another.

use crate::descriptor::FileDescriptor;
use crate::utils::sanitize_id;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Ownership of the names directly below the archive root
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
    reserved: HashSet<PathBuf>,
    stored: HashMap<PathBuf, String>,
    unpacked: HashMap<PathBuf, String>,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reserved: HashSet::new(),
            stored: HashMap::new(),
            unpacked: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keeps the entry below the root that contains `path` away from all files
    pub fn reserve(mut self, path: &Path) -> Self {
        let top = path
            .strip_prefix(&self.root)
            .ok()
            .and_then(|rel| rel.components().next());
        if let Some(Component::Normal(name)) = top {
            self.reserved.insert(self.root.join(name));
        }
        self
    }

    /// Registers the names manifest entries already use; earlier entries win
    pub fn track(mut self, files: &[FileDescriptor]) -> Self {
        for file in files {
            if let Some(name) = &file.name {
                let path = self.root.join(name);
                if !self.reserved.contains(&path) {
                    self.stored.entry(path).or_insert_with(|| file.id.clone());
                }
            }
        }
        for file in files {
            let dir = self.root.join(sanitize_id(&file.id));
            if self.dir_free(&file.id, &dir) {
                self.unpacked.insert(dir, file.id.clone());
            }
        }
        self
    }

    /// Name `id` stores its content under: `wanted`, or a numbered variant
    /// of it when that is taken
    pub fn claim_name(&mut self, id: &str, wanted: &str) -> String {
        let mut n = 0;
        let name = loop {
            let name = numbered(wanted, n);
            if self.name_free(id, &self.root.join(&name)) {
                break name;
            }
            n += 1;
        };

        if n > 0 {
            ::log::warn!("{} is taken, storing {} as {}", wanted, id, name);
        }
        self.stored.retain(|_, owner| owner.as_str() != id);
        self.stored.insert(self.root.join(&name), id.to_string());
        name
    }

    /// Directory the archive of `id` unpacks into
    pub fn unpack_dir(&mut self, id: &str) -> PathBuf {
        if let Some((dir, _)) = self.unpacked.iter().find(|(_, owner)| *owner == id) {
            return dir.clone();
        }

        let base = sanitize_id(id);
        let mut n = 0;
        let dir = loop {
            let name = match n {
                0 => base.clone(),
                1 => format!("{base}.d"),
                _ => format!("{base}.d{n}"),
            };
            let dir = self.root.join(name);
            if self.dir_free(id, &dir) {
                break dir;
            }
            n += 1;
        };

        self.unpacked.insert(dir.clone(), id.to_string());
        dir
    }

    fn name_free(&self, id: &str, path: &Path) -> bool {
        !self.reserved.contains(path)
            && !self.unpacked.contains_key(path)
            && self.stored.get(path).is_none_or(|owner| owner == id)
    }

    fn dir_free(&self, id: &str, path: &Path) -> bool {
        !self.reserved.contains(path)
            && !self.stored.contains_key(path)
            && self.unpacked.get(path).is_none_or(|owner| owner == id)
    }
}

/// `data.csv`, `data-1.csv`, `data-2.csv`, ...
fn numbered(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{n}.{ext}"),
        _ => format!("{name}-{n}"),
    }
}
