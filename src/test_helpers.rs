//! Shared fakes for tests that exercise the pipeline without a network

use crate::descriptor::{Category, FileDescriptor};
use crate::error::{RetrievalError, TransportError};
use crate::resolver::UrlResolver;
use crate::transport::{Fetched, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

/// In-memory transport that serves canned pages and records every call
#[derive(Default)]
pub(crate) struct FakeTransport {
    pub pages: HashMap<String, String>,
    pub files: HashMap<String, Fetched>,
    pub calls: Mutex<Vec<String>>,
    pub forms: Mutex<Vec<Vec<(String, String)>>>,
}

impl FakeTransport {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn serve_file(&mut self, url: &str, bytes: &[u8]) {
        self.files.insert(
            url.to_string(),
            Fetched {
                bytes: bytes.to_vec(),
                last_modified: None,
            },
        );
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(format!("GET {url}"));
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(format!("POST {url}"));
        self.forms.lock().unwrap().push(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        Ok(())
    }

    async fn get_bytes(&self, url: &str) -> Result<Fetched, TransportError> {
        self.calls.lock().unwrap().push(format!("GET {url}"));
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Resolver with a fixed id → URL table; unknown ids fail like an empty relay
#[derive(Default)]
pub(crate) struct FakeResolver {
    pub urls: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            urls: entries
                .iter()
                .map(|(id, url)| (id.to_string(), url.to_string()))
                .collect(),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UrlResolver for FakeResolver {
    async fn resolve(&self, file: &FileDescriptor) -> Result<String, RetrievalError> {
        self.calls.lock().unwrap().push(file.id.clone());
        self.urls.get(&file.id).cloned().ok_or_else(|| {
            RetrievalError::Resolution("no link in relay notification".to_string())
        })
    }
}

/// A freshly discovered file in a shared test category
pub(crate) fn discovered(id: &str) -> FileDescriptor {
    FileDescriptor::new(id, Arc::new(Category::new(1, "Air")), format!("File {id}"))
}

/// ZIP archive holding the given files
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
