pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod vector;

pub use crawl::{crawl, CrawlConfig, CrawlStats};
pub use extract::{extract, url_key, CrawlScope, PageContent};
pub use fetch::{Fetch, FetchResponse, HttpFetcher};
pub use vector::page_vector;
