use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use url::Url;

lazy_static! {
    static ref HEADING_SEL: Selector = Selector::parse("h1").expect("valid selector");
    static ref TITLE_SEL: Selector = Selector::parse("title").expect("valid selector");
    static ref ANCHOR_SEL: Selector = Selector::parse("a[href]").expect("valid selector");
}

/// Which part of a site counts as the corpus: pages on one host whose path
/// starts with the article prefix, read out of one content container.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    origin: Url,
    article_prefix: String,
    content_selector: Selector,
}

impl CrawlScope {
    pub fn new(seed: &Url, article_prefix: &str, content_selector: &str) -> Result<Self> {
        let mut origin = seed.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        let content_selector = Selector::parse(content_selector)
            .map_err(|e| anyhow!("invalid content selector: {e}"))?;
        Ok(Self {
            origin,
            article_prefix: article_prefix.to_string(),
            content_selector,
        })
    }

    /// Resolve a raw href to an in-corpus article URL. None when the link
    /// leaves the corpus: another host, a non-article path, or a namespaced
    /// page (a colon in the path tail).
    fn article_url(&self, base: &Url, href: &str) -> Option<Url> {
        // Fragments never distinguish pages.
        let raw = href.split('#').next().unwrap_or("");
        if raw.is_empty() {
            return None;
        }
        let joined = base.join(raw).ok()?;
        if joined.host_str() != self.origin.host_str() {
            return None;
        }
        let tail = joined.path().strip_prefix(&self.article_prefix)?;
        if tail.is_empty() || tail.contains(':') {
            return None;
        }
        let mut url = joined;
        url.set_fragment(None);
        Some(url)
    }
}

/// A page reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub title: String,
    pub text: String,
    pub links: Vec<Url>,
}

/// Pull the article out of a fetched page. None when the scope's content
/// container is missing, which callers treat as "skip this page, expand no
/// links".
pub fn extract(html: &str, base: &Url, scope: &CrawlScope) -> Option<PageContent> {
    let document = Html::parse_document(html);
    let content = document.select(&scope.content_selector).next()?;

    let title = document
        .select(&HEADING_SEL)
        .next()
        .or_else(|| document.select(&TITLE_SEL).next())
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| base.path().to_string());

    let text = content.text().collect::<String>();

    let mut links = Vec::new();
    for anchor in content.select(&ANCHOR_SEL) {
        if let Some(href) = anchor.value().attr("href") {
            if let Some(url) = scope.article_url(base, href) {
                links.push(url);
            }
        }
    }

    Some(PageContent { title, text, links })
}

/// The canonical string form a URL is deduplicated under: fragment stripped,
/// everything else kept.
pub fn url_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.to_string()
}
