use super::*;
use crate::resolver::{MailbackResolver, RelaySettings};
use crate::test_helpers::{FakeResolver, FakeTransport, discovered, zip_bytes};
use crate::utils::sha1_hex;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

const INDEX_URL: &str = "http://site.test/GetData/Download";

fn config(dir: &TempDir) -> ArchiverConfig {
    ArchiverConfig {
        index_url: INDEX_URL.to_string(),
        download_url: "http://site.test/getdata/downloaddata".to_string(),
        mailbox: Some("box".to_string()),
        relay_base_url: "http://relay.test/go".to_string(),
        archive_dir: dir.path().to_path_buf(),
        ..ArchiverConfig::default()
    }
}

fn index_page(ids: &[&str]) -> String {
    let inputs: String = ids
        .iter()
        .map(|id| {
            format!(r#"<p class="grp-7"><label><input class="SelectedFile" value="{id}"> Title {id}</label></p>"#)
        })
        .collect();
    format!(r#"<html><body><h3 class="CategoryHeader c7">Water</h3>{inputs}</body></html>"#)
}

/// Index listing `ids`, each resolving to `http://site.test/dl/<id>.csv`
fn fixtures(ids: &[&str]) -> (FakeTransport, FakeResolver) {
    let mut transport = FakeTransport::default();
    transport
        .pages
        .insert(INDEX_URL.to_string(), index_page(ids));

    let urls: Vec<(String, String)> = ids
        .iter()
        .map(|id| (id.to_string(), format!("http://site.test/dl/{id}.csv")))
        .collect();
    for (id, url) in &urls {
        transport.serve_file(url, format!("content of {id}").as_bytes());
    }

    let resolver = FakeResolver {
        urls: urls.into_iter().collect(),
        ..FakeResolver::default()
    };
    (transport, resolver)
}

async fn run_with(
    config: &ArchiverConfig,
    transport: &Arc<FakeTransport>,
    resolver: &Arc<FakeResolver>,
) -> Result<RunSummary, ArchiverError> {
    run(config, transport.clone(), Some(resolver.clone())).await
}

fn received(id: &str, name: &str) -> FileDescriptor {
    let mut file = discovered(id);
    file.url = Some(format!("http://site.test/dl/{name}"));
    file.name = Some(name.to_string());
    file.received_at = Some(Utc::now());
    file
}

#[test]
fn test_window() {
    assert_eq!(window(5, 0, Some(2)), 0..2);
    assert_eq!(window(5, 3, Some(2)), 3..5);
    assert_eq!(window(5, 4, Some(2)), 4..5);
    assert_eq!(window(5, 7, Some(2)), 5..5);
    assert_eq!(window(5, 1, None), 1..5);
    assert_eq!(window(5, 0, Some(usize::MAX)), 0..5);
}

#[test]
fn test_merge_new_keeps_existing_entries() {
    let mut existing = vec![discovered("A")];
    existing[0].error = Some("download failed: timeout".to_string());

    let added = merge_new(&mut existing, vec![discovered("A"), discovered("B")]);

    assert_eq!(added, 1);
    assert_eq!(existing.len(), 2);
    assert!(existing[0].error.is_some());
    assert_eq!(existing[1].id, "B");
}

#[tokio::test]
async fn test_fresh_run_archives_everything() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let (transport, resolver) = fixtures(&["A", "B", "C"]);
    let (transport, resolver) = (Arc::new(transport), Arc::new(resolver));

    let summary = run_with(&config, &transport, &resolver).await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.archived, 3);
    assert_eq!(summary.failed, 0);

    let manifest = ManifestStore::new(config.manifest_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manifest.len(), 3);
    for file in &manifest {
        assert!(file.is_complete());
        assert_eq!(file.category.title, "Water");
        assert_eq!(file.title, format!("Title {}", file.id));

        // The recorded digest matches what is on disk
        let name = file.name.as_deref().unwrap();
        let on_disk = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(file.sha1sum.as_deref(), Some(sha1_hex(&on_disk).as_str()));
        assert_eq!(file.size, Some(on_disk.len() as u64));
    }
}

#[tokio::test]
async fn test_max_docs_limits_the_window() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.max_docs = Some(2);
    let (transport, resolver) = fixtures(&["A", "B", "C", "D", "E"]);
    let (transport, resolver) = (Arc::new(transport), Arc::new(resolver));

    let summary = run_with(&config, &transport, &resolver).await.unwrap();
    assert_eq!(summary.total, 5);
    assert_eq!(summary.attempted, 2);
    assert_eq!(resolver.calls(), vec!["A", "B"]);

    config.start_offset = 2;
    run_with(&config, &transport, &resolver).await.unwrap();
    assert_eq!(resolver.calls(), vec!["A", "B", "C", "D"]);

    let manifest = ManifestStore::new(config.manifest_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manifest.len(), 5);
    assert!(manifest[3].is_complete());
    assert!(manifest[4].received_at.is_none());
}

#[tokio::test]
async fn test_resume_retries_only_the_failed_file() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    let mut failed = discovered("B");
    failed.error = Some("resolution failed: no link in relay notification".to_string());
    let store = ManifestStore::new(config.manifest_path());
    store
        .save(&[received("A", "A.csv"), failed, received("C", "C.csv")])
        .await
        .unwrap();

    let (transport, resolver) = fixtures(&["A", "B", "C"]);
    let (transport, resolver) = (Arc::new(transport), Arc::new(resolver));

    let summary = run_with(&config, &transport, &resolver).await.unwrap();

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(resolver.calls(), vec!["B"]);
    // The manifest replaces the index; it is not fetched again
    assert_eq!(transport.calls(), vec!["GET http://site.test/dl/B.csv"]);

    let manifest = store.load().await.unwrap().unwrap();
    assert!(manifest[1].is_complete());
    assert!(manifest[1].error.is_none());
}

#[tokio::test]
async fn test_received_file_is_never_requested_again() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = ManifestStore::new(config.manifest_path());
    store
        .save(&[received("X", "X.csv"), discovered("Y")])
        .await
        .unwrap();

    let mut transport = FakeTransport::default();
    transport.pages.insert(
        "http://relay.test/go/box-Y".to_string(),
        r#"<a href="http://site.test/dl/Y.csv">Y</a>"#.to_string(),
    );
    transport.serve_file("http://site.test/dl/Y.csv", b"y");
    let transport = Arc::new(transport);
    let resolver = MailbackResolver::new(
        transport.clone(),
        RelaySettings {
            download_url: config.download_url.clone(),
            mailbox: "box".to_string(),
            relay_domain: config.relay_domain.clone(),
            relay_base_url: config.relay_base_url.clone(),
            delay: Duration::ZERO,
        },
    );

    run(&config, transport.clone(), Some(Arc::new(resolver)))
        .await
        .unwrap();

    assert_eq!(
        transport.calls(),
        vec![
            "POST http://site.test/getdata/downloaddata",
            "GET http://relay.test/go/box-Y",
            "GET http://site.test/dl/Y.csv",
        ]
    );
    let forms = transport.forms.lock().unwrap();
    assert_eq!(forms.len(), 1);
    assert!(forms[0].contains(&("SelectedFile".to_string(), "Y".to_string())));
}

#[tokio::test]
async fn test_file_without_relay_link_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let (transport, mut resolver) = fixtures(&["A", "B"]);
    resolver.urls.remove("A");
    let (transport, resolver) = (Arc::new(transport), Arc::new(resolver));

    let summary = run_with(&config, &transport, &resolver).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.archived, 1);

    let manifest = ManifestStore::new(config.manifest_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        manifest[0].error.as_deref(),
        Some("resolution failed: no link in relay notification")
    );
    assert!(manifest[0].url.is_none());
    assert!(manifest[0].received_at.is_none());
    assert!(manifest[1].is_complete());
}

#[tokio::test]
async fn test_index_fetch_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let transport = Arc::new(FakeTransport::default());
    let resolver = Arc::new(FakeResolver::default());

    let result = run_with(&config, &transport, &resolver).await;

    assert!(matches!(result, Err(ArchiverError::IndexFetch(_))));
    assert!(!config.manifest_path().exists());
}

#[tokio::test]
async fn test_empty_index_is_a_valid_run() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let (transport, resolver) = fixtures(&[]);
    let (transport, resolver) = (Arc::new(transport), Arc::new(resolver));

    let summary = run_with(&config, &transport, &resolver).await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.attempted, 0);
    assert!(config.manifest_path().exists());
}

#[tokio::test]
async fn test_missing_mailbox_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let (transport, _) = fixtures(&["A"]);

    let result = run(&config, Arc::new(transport), None).await;
    assert!(matches!(result, Err(ArchiverError::Config(_))));
}

#[tokio::test]
async fn test_dry_run_records_urls_only() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.skip_download = true;
    let (transport, resolver) = fixtures(&["A", "B"]);
    let (transport, resolver) = (Arc::new(transport), Arc::new(resolver));

    let summary = run_with(&config, &transport, &resolver).await.unwrap();
    assert_eq!(summary.resolved_only, 2);
    assert_eq!(transport.calls(), vec![format!("GET {INDEX_URL}")]);

    let manifest = ManifestStore::new(config.manifest_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manifest[0].name.as_deref(), Some("A.csv"));
    assert!(manifest[0].received_at.is_none());

    // A later real run downloads without asking the relay again
    config.skip_download = false;
    run_with(&config, &transport, &resolver).await.unwrap();
    assert_eq!(resolver.calls(), vec!["A", "B"]);
    assert!(dir.path().join("B.csv").exists());
}

#[tokio::test]
async fn test_refresh_index_appends_new_files() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.refresh_index = true;
    ManifestStore::new(config.manifest_path())
        .save(&[received("A", "A.csv")])
        .await
        .unwrap();
    let (transport, resolver) = fixtures(&["A", "B"]);
    let (transport, resolver) = (Arc::new(transport), Arc::new(resolver));

    let summary = run_with(&config, &transport, &resolver).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(resolver.calls(), vec!["B"]);
}

/// Resolver that reports how many files the manifest on disk shows as received
struct ManifestPeek {
    store: ManifestStore,
    inner: FakeResolver,
    seen: Mutex<Vec<usize>>,
}

#[async_trait]
impl UrlResolver for ManifestPeek {
    async fn resolve(&self, file: &FileDescriptor) -> Result<String, crate::error::RetrievalError> {
        let received = self
            .store
            .load()
            .await
            .unwrap()
            .unwrap()
            .iter()
            .filter(|f| f.is_received())
            .count();
        self.seen.lock().unwrap().push(received);
        self.inner.resolve(file).await
    }
}

#[tokio::test]
async fn test_manifest_is_saved_after_every_file() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let (transport, inner) = fixtures(&["A", "B", "C"]);
    let peek = Arc::new(ManifestPeek {
        store: ManifestStore::new(config.manifest_path()),
        inner,
        seen: Mutex::default(),
    });

    run(&config, Arc::new(transport), Some(peek.clone()))
        .await
        .unwrap();

    assert_eq!(*peek.seen.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_zip_files_are_unpacked_under_their_id() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let mut transport = FakeTransport::default();
    transport.pages.insert(INDEX_URL.to_string(), index_page(&["AQ 1"]));
    transport.serve_file(
        "http://site.test/dl/AQ%201.zip",
        &zip_bytes(&[("stations/list.csv", b"id\n1\n")]),
    );
    let resolver = Arc::new(FakeResolver::with(&[(
        "AQ 1",
        "http://site.test/dl/AQ%201.zip",
    )]));

    let summary = run_with(&config, &Arc::new(transport), &resolver)
        .await
        .unwrap();

    assert_eq!(summary.unpacked, 1);
    assert!(dir.path().join("AQ 1.zip").exists());
    assert_eq!(
        std::fs::read(dir.path().join("AQ-201/stations/list.csv")).unwrap(),
        b"id\n1\n"
    );
}

#[tokio::test]
async fn test_files_with_the_same_name_keep_their_own_content() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let mut transport = FakeTransport::default();
    transport.pages.insert(INDEX_URL.to_string(), index_page(&["A", "B", "C"]));
    transport.serve_file("http://site.test/a/data.csv", b"AAAA");
    transport.serve_file("http://site.test/b/data.csv", b"BB");
    transport.serve_file("http://site.test/c/manifest.json", b"not the manifest");
    let resolver = Arc::new(FakeResolver::with(&[
        ("A", "http://site.test/a/data.csv"),
        ("B", "http://site.test/b/data.csv"),
        ("C", "http://site.test/c/manifest.json"),
    ]));

    let summary = run_with(&config, &Arc::new(transport), &resolver)
        .await
        .unwrap();
    assert_eq!(summary.archived, 3);

    let manifest = ManifestStore::new(config.manifest_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    let names: Vec<_> = manifest.iter().map(|f| f.name.as_deref().unwrap()).collect();
    assert_eq!(names, vec!["data.csv", "data-1.csv", "manifest-1.json"]);

    for file in &manifest {
        assert!(file.is_complete());
        let on_disk = std::fs::read(dir.path().join(file.name.as_deref().unwrap())).unwrap();
        assert_eq!(file.sha1sum.as_deref(), Some(sha1_hex(&on_disk).as_str()));
        assert_eq!(file.size, Some(on_disk.len() as u64));
    }
}

#[tokio::test]
async fn test_relative_relay_link_is_downloaded_from_the_relay_host() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let mut transport = FakeTransport::default();
    transport.pages.insert(INDEX_URL.to_string(), index_page(&["Y"]));
    transport.pages.insert(
        "http://relay.test/go/box-Y".to_string(),
        r#"<a href="/dl/Y.csv">Y</a>"#.to_string(),
    );
    transport.serve_file("http://relay.test/dl/Y.csv", b"y");
    let transport = Arc::new(transport);
    let resolver = MailbackResolver::new(
        transport.clone(),
        RelaySettings {
            download_url: config.download_url.clone(),
            mailbox: "box".to_string(),
            relay_domain: config.relay_domain.clone(),
            relay_base_url: config.relay_base_url.clone(),
            delay: Duration::ZERO,
        },
    );

    let summary = run(&config, transport.clone(), Some(Arc::new(resolver)))
        .await
        .unwrap();
    assert_eq!(summary.failed, 0);

    let manifest = ManifestStore::new(config.manifest_path())
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manifest[0].url.as_deref(), Some("http://relay.test/dl/Y.csv"));
    assert_eq!(manifest[0].name.as_deref(), Some("Y.csv"));
    assert!(manifest[0].is_complete());
}
