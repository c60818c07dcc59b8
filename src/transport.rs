use crate::error::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use std::time::Duration;

/// Raw content of a downloaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// Parsed `Last-Modified` header, if the server sent a valid one
    pub last_modified: Option<DateTime<Utc>>,
}

/// The HTTP exchanges the archiver needs
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a page and decode it as text
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;

    /// POST an urlencoded form, discarding the response body
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<(), TransportError>;

    /// GET raw bytes without any text decoding
    async fn get_bytes(&self, url: &str) -> Result<Fetched, TransportError>;
}

/// [`Transport`] over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        let response = request.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        ::log::debug!("GET {}", url);
        let response = self.send(url, self.client.get(url)).await?;
        response.text().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<(), TransportError> {
        ::log::debug!("POST {} ({} fields)", url, fields.len());
        self.send(url, self.client.post(url).form(fields)).await?;
        Ok(())
    }

    async fn get_bytes(&self, url: &str) -> Result<Fetched, TransportError> {
        ::log::debug!("GET {} (binary)", url);
        let response = self.send(url, self.client.get(url)).await?;

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        let bytes = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        Ok(Fetched {
            bytes: bytes.to_vec(),
            last_modified,
        })
    }
}

/// Parses an HTTP-date such as `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
