use anyhow::Result;
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Duration;
use url::Url;

/// Result of fetching one URL. The transfer itself succeeded; whatever the
/// status code says is the caller's business.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub final_url: Url,
}

/// The crawler's narrow view of HTTP transport. An error means the transfer
/// failed (connect timeout, reset, deadline exceeded), which the crawl
/// treats as noise, never as fatal.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// `timeout` bounds each request end to end; a stalled fetch must not
    /// block its task forever.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("wikirec/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok(FetchResponse {
            status,
            body,
            final_url,
        })
    }
}
