use crate::descriptor::FileDescriptor;
use crate::error::RetrievalError;
use crate::parsers::relay::first_link;
use crate::transport::Transport;
use crate::utils::sanitize_id;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Turns a file id into a direct download URL
#[async_trait]
pub trait UrlResolver: Send + Sync {
    async fn resolve(&self, file: &FileDescriptor) -> Result<String, RetrievalError>;
}

/// Where the mail relay lives and which mailbox it should use
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Endpoint the download request form is posted to
    pub download_url: String,
    pub mailbox: String,
    pub relay_domain: String,
    pub relay_base_url: String,
    /// Pause between the request and reading the relay
    pub delay: Duration,
}

impl RelaySettings {
    /// Per-file relay address, so one mailbox can serve many requests
    pub fn address(&self, file_id: &str) -> String {
        format!("{}-{}", self.mailbox, sanitize_id(file_id))
    }

    pub fn email(&self, file_id: &str) -> String {
        format!("{}@{}", self.address(file_id), self.relay_domain)
    }

    /// Page on which the relay renders the e-mail sent to the file's address
    pub fn notification_url(&self, file_id: &str) -> String {
        format!(
            "{}/{}",
            self.relay_base_url.trim_end_matches('/'),
            self.address(file_id)
        )
    }
}

/// Requests a file by e-mail and reads the link back from the mail relay
pub struct MailbackResolver {
    transport: Arc<dyn Transport>,
    settings: RelaySettings,
}

impl MailbackResolver {
    pub fn new(transport: Arc<dyn Transport>, settings: RelaySettings) -> Self {
        Self {
            transport,
            settings,
        }
    }
}

#[async_trait]
impl UrlResolver for MailbackResolver {
    async fn resolve(&self, file: &FileDescriptor) -> Result<String, RetrievalError> {
        let email = self.settings.email(&file.id);
        let form = [
            ("SelectedFile", file.id.as_str()),
            ("Email", email.as_str()),
            ("reEmail", email.as_str()),
            ("X-Requested-With", "XMLHttpRequest"),
        ];

        self.transport
            .post_form(&self.settings.download_url, &form)
            .await
            .map_err(|e| RetrievalError::Resolution(format!("download request rejected: {e}")))?;
        ::log::info!("Submitted request for {} to {}", file.id, email);

        if !self.settings.delay.is_zero() {
            tokio::time::sleep(self.settings.delay).await;
        }

        let notification_url = self.settings.notification_url(&file.id);
        let page = self
            .transport
            .get_text(&notification_url)
            .await
            .map_err(|e| RetrievalError::Resolution(format!("relay unavailable: {e}")))?;

        let link = first_link(&page).ok_or_else(|| {
            RetrievalError::Resolution("no link in relay notification".to_string())
        })?;
        absolute_link(&notification_url, &link)
    }
}

/// `link` as found on the page at `page_url`, made absolute
fn absolute_link(page_url: &str, link: &str) -> Result<String, RetrievalError> {
    let url = Url::parse(page_url)
        .and_then(|base| base.join(link))
        .map_err(|e| {
            RetrievalError::Resolution(format!("invalid link '{link}' in relay notification: {e}"))
        })?;

    match url.scheme() {
        "http" | "https" => Ok(url.into()),
        scheme => Err(RetrievalError::Resolution(format!(
            "unsupported {scheme} link in relay notification"
        ))),
    }
}
