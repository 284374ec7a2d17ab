#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use url::Url;
use wikirec_crawler::{Fetch, FetchResponse};

/// In-memory site standing in for HTTP transport. URLs without a registered
/// page fail the way a connect timeout would.
pub struct StubFetcher {
    pages: HashMap<String, (u16, String)>,
    hits: Mutex<HashMap<String, usize>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn page(mut self, url: &str, status: u16, body: String) -> Self {
        self.pages.insert(url.to_string(), (status, body));
        self
    }

    pub fn hit_count(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        *self.hits.lock().entry(url.to_string()).or_insert(0) += 1;
        match self.pages.get(url.as_str()) {
            Some((status, body)) => Ok(FetchResponse {
                status: *status,
                body: body.clone(),
                final_url: url.clone(),
            }),
            None => Err(anyhow!("connect timeout")),
        }
    }
}

pub fn article(title: &str, text: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{link}">link</a>"#))
        .collect();
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <h1>{title}</h1>
        <div id="bodyContent"><p>{text}</p>{anchors}</div>
        </body></html>"#
    )
}
