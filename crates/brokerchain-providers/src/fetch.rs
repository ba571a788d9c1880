//! Page fetching for the crawler.

use async_trait::async_trait;
use reqwest::header::USER_AGENT;

use crate::ProviderError;
use crate::http::{self, send_text};
use crate::retry::{RetryPolicy, retry_with_backoff};

pub const CRAWLER_USER_AGENT: &str = "BrokerChainCrawler/1.0 (+contact@brokerchain.business)";

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Raw body of `url`.
    async fn fetch(&self, url: &str) -> Result<String, ProviderError>;
}

/// Plain GET with the shared timeout and retry policy.
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            client: http::client(),
            retry,
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        retry_with_backoff(&self.retry, "crawler.fetch", || {
            let request = self.client.get(url).header(USER_AGENT, CRAWLER_USER_AGENT);
            send_text("crawler", request)
        })
        .await
    }
}
