// Re-export modules
pub mod config;
pub mod descriptor;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod parsers;
pub mod pipeline;
pub mod queue;
pub mod resolver;
pub mod transport;
pub mod unpack;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types for convenience
pub use config::ArchiverConfig;
pub use descriptor::{Category, FileDescriptor, RunSummary};
pub use error::ArchiverError;

use resolver::{MailbackResolver, RelaySettings, UrlResolver};
use std::sync::Arc;
use transport::{HttpTransport, Transport};

/// Main builder for an archiving run
pub struct Archiver {
    config: ArchiverConfig,
    transport: Option<Arc<dyn Transport>>,
    resolver: Option<Arc<dyn UrlResolver>>,
}

impl Archiver {
    /// Create a new Archiver with the given configuration
    pub fn new(config: ArchiverConfig) -> Self {
        Self {
            config,
            transport: None,
            resolver: None,
        }
    }

    /// Load configuration from a JSON file
    pub fn from_config_file(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(ArchiverConfig::from_file(path)?))
    }

    /// Use a custom transport instead of the default HTTP client
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom URL resolver instead of the mail relay
    pub fn with_resolver(mut self, resolver: Arc<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    /// Run the pipeline until every selected file has been processed
    pub async fn run(self) -> Result<RunSummary, ArchiverError> {
        self.config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                self.config.timeout(),
                &self.config.user_agent,
            )?),
        };

        // Without a mailbox the relay cannot be asked; the pipeline rejects the
        // run only if some file still needs a URL
        let resolver = self.resolver.or_else(|| {
            self.config.mailbox.as_ref().map(|mailbox| {
                Arc::new(MailbackResolver::new(
                    Arc::clone(&transport),
                    RelaySettings {
                        download_url: self.config.download_url.clone(),
                        mailbox: mailbox.clone(),
                        relay_domain: self.config.relay_domain.clone(),
                        relay_base_url: self.config.relay_base_url.clone(),
                        delay: self.config.relay_delay(),
                    },
                )) as Arc<dyn UrlResolver>
            })
        });

        pipeline::run(&self.config, transport, resolver).await
    }
}
