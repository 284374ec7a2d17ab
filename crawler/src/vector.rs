use crate::extract::{extract, CrawlScope};
use crate::fetch::Fetch;
use anyhow::{anyhow, Result};
use url::Url;
use wikirec_core::index::InvertedIndex;
use wikirec_core::text;

/// Weight vector for a page that may live outside the persisted corpus. The
/// page goes through the same fetch, extraction, and text pipeline as an
/// indexed document; terms unknown to the corpus contribute nothing, so the
/// result always lines up with the materialized matrix columns.
///
/// weight = count * idf / max_count_in_this_document
pub async fn page_vector<F: Fetch>(
    fetcher: &F,
    url: &Url,
    scope: &CrawlScope,
    index: &InvertedIndex,
) -> Result<Vec<f64>> {
    let response = fetcher.fetch(url).await?;
    let page = extract(&response.body, url, scope)
        .ok_or_else(|| anyhow!("no content container in {url}"))?;

    let counts = text::term_frequencies(&text::normalize(&page.text));
    let max_count = counts.values().copied().max().unwrap_or(1);

    let mut vector = vec![0.0; index.term_dimensions()?];
    for (term, count) in counts {
        if let Some((term_id, idf)) = index.term_idf(&term)? {
            vector[term_id as usize] = count as f64 * idf / max_count as f64;
        }
    }
    Ok(vector)
}
