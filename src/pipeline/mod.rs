use crate::config::ArchiverConfig;
use crate::descriptor::{FileDescriptor, RunSummary};
use crate::error::ArchiverError;
use crate::layout::ArchiveLayout;
use crate::manifest::ManifestStore;
use crate::parsers::index;
use crate::queue::{Task, enqueue};
use crate::resolver::UrlResolver;
use crate::transport::Transport;
use crate::workflow::{Outcome, RetrievalOptions, Retriever};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Archives every file listed on the index page, resuming from the manifest
///
/// # Arguments
///
/// * `config` - settings for this run
/// * `transport` - HTTP access for the index page and file downloads
/// * `resolver` - relay lookup; only needed while some file lacks a URL
pub async fn run(
    config: &ArchiverConfig,
    transport: Arc<dyn Transport>,
    resolver: Option<Arc<dyn UrlResolver>>,
) -> Result<RunSummary, ArchiverError> {
    let started = Instant::now();
    let store = ManifestStore::new(config.manifest_path());

    let files = work_list(config, transport.as_ref(), &store).await?;
    let total = files.len();

    let window = window(total, config.start_offset, config.max_docs);
    let (skipped, pending): (Vec<usize>, Vec<usize>) =
        window.partition(|&i| files[i].is_complete());

    ::log::info!(
        "{} files listed, {} to process, {} already archived",
        total,
        pending.len(),
        skipped.len()
    );

    if resolver.is_none() && pending.iter().any(|&i| files[i].url.is_none()) {
        return Err(ArchiverError::Config(
            "a relay mailbox is required to request files".to_string(),
        ));
    }

    let layout = ArchiveLayout::new(&config.archive_dir)
        .reserve(store.path())
        .reserve(&store.tmp_path())
        .track(&files);
    let retriever = Retriever::new(
        resolver,
        transport,
        layout,
        RetrievalOptions {
            skip_download: config.skip_download,
            unpack: config.unpack,
        },
    );

    let mut task = ArchiveTask {
        files,
        store,
        retriever,
        done: 0,
        pending: pending.len(),
    };
    let outcomes = enqueue(pending, &mut task).await?;

    let mut summary = RunSummary {
        total,
        attempted: outcomes.len(),
        skipped: skipped.len(),
        elapsed: started.elapsed(),
        ..RunSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Archived => summary.archived += 1,
            Outcome::Unpacked => {
                summary.archived += 1;
                summary.unpacked += 1;
            }
            Outcome::Resolved => summary.resolved_only += 1,
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }

    ::log::info!(
        "Processed {} of {} files in {:.2} seconds ({} failed)",
        summary.attempted,
        summary.total,
        summary.elapsed.as_secs_f64(),
        summary.failed
    );
    Ok(summary)
}

/// The manifest's entries, or a fresh list from the index page
async fn work_list(
    config: &ArchiverConfig,
    transport: &dyn Transport,
    store: &ManifestStore,
) -> Result<Vec<FileDescriptor>, ArchiverError> {
    let files = match store.load().await? {
        Some(mut files) => {
            ::log::info!(
                "Resuming from {} ({} entries)",
                store.path().display(),
                files.len()
            );
            if !config.refresh_index {
                return Ok(files);
            }
            let added = merge_new(&mut files, discover(config, transport).await?);
            ::log::info!("Index lists {} new files", added);
            files
        }
        None => discover(config, transport).await?,
    };

    store.save(&files).await?;
    Ok(files)
}

/// Fetches the index page and extracts its files
async fn discover(
    config: &ArchiverConfig,
    transport: &dyn Transport,
) -> Result<Vec<FileDescriptor>, ArchiverError> {
    ::log::info!("Fetching index {}", config.index_url);
    let html = transport
        .get_text(&config.index_url)
        .await
        .map_err(ArchiverError::IndexFetch)?;

    let files = index::extract(&html, &config.selectors)?;
    ::log::info!("Got {} files from the index", files.len());
    Ok(files)
}

/// Appends files whose ids are not in `files` yet; returns how many were added
fn merge_new(files: &mut Vec<FileDescriptor>, discovered: Vec<FileDescriptor>) -> usize {
    let known: HashSet<String> = files.iter().map(|f| f.id.clone()).collect();
    let before = files.len();
    files.extend(discovered.into_iter().filter(|f| !known.contains(&f.id)));
    files.len() - before
}

/// Indices selected by the start offset and the file limit
fn window(total: usize, start_offset: usize, max_docs: Option<usize>) -> std::ops::Range<usize> {
    let start = start_offset.min(total);
    let end = match max_docs {
        Some(max) => start.saturating_add(max).min(total),
        None => total,
    };
    start..end
}

/// Processes one manifest entry and persists the manifest afterwards
struct ArchiveTask {
    files: Vec<FileDescriptor>,
    store: ManifestStore,
    retriever: Retriever,
    done: usize,
    pending: usize,
}

#[async_trait]
impl Task<usize> for ArchiveTask {
    type Output = Outcome;
    type Error = ArchiverError;

    async fn run(&mut self, index: usize) -> Result<Outcome, ArchiverError> {
        self.done += 1;
        let file = &mut self.files[index];
        ::log::info!(
            "[{}/{}] {} ({} / {})",
            self.done,
            self.pending,
            file.id,
            file.category.title,
            file.title
        );

        let outcome = self.retriever.process(file).await;
        self.store.save(&self.files).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests;
