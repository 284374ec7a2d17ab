mod common;

use common::{article, StubFetcher};
use crossbeam_channel::bounded;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wikirec_core::Document;
use wikirec_crawler::{crawl, CrawlConfig, CrawlScope};

const SEED: &str = "https://wiki.test/wiki/A";

fn seed_url() -> Url {
    Url::parse(SEED).unwrap()
}

fn scope() -> CrawlScope {
    CrawlScope::new(&seed_url(), "/wiki/", "#bodyContent").unwrap()
}

fn config(quota: usize, concurrency: usize) -> CrawlConfig {
    CrawlConfig {
        page_quota: quota,
        concurrency,
        first_doc_id: 0,
    }
}

/// A -> B, C; B -> C, D; C -> A; D -> nothing.
fn site() -> StubFetcher {
    StubFetcher::new()
        .page(SEED, 200, article("A", "alpha text", &["/wiki/B", "/wiki/C"]))
        .page(
            "https://wiki.test/wiki/B",
            200,
            article("B", "beta text", &["/wiki/C", "/wiki/D"]),
        )
        .page(
            "https://wiki.test/wiki/C",
            200,
            article("C", "gamma text", &["/wiki/A"]),
        )
        .page("https://wiki.test/wiki/D", 200, article("D", "delta text", &[]))
}

#[tokio::test]
async fn bfs_visits_every_reachable_page_exactly_once() {
    let fetcher = Arc::new(site());
    let (sink, source) = bounded(64);

    let stats = crawl(
        Arc::clone(&fetcher),
        sink,
        seed_url(),
        HashSet::new(),
        scope(),
        config(100, 3),
    )
    .await
    .unwrap();

    assert_eq!(stats.pages_extracted, 4);
    assert_eq!(stats.fetch_failures, 0);

    let docs: Vec<Document> = source.try_iter().collect();
    assert_eq!(docs.len(), 4);

    let mut urls: Vec<&str> = docs.iter().map(|d| d.url.as_str()).collect();
    urls.sort_unstable();
    assert_eq!(
        urls,
        vec![
            SEED,
            "https://wiki.test/wiki/B",
            "https://wiki.test/wiki/C",
            "https://wiki.test/wiki/D",
        ]
    );
    for url in urls {
        assert_eq!(fetcher.hit_count(url), 1, "{url} fetched more than once");
    }

    let mut ids: Vec<u32> = docs.iter().map(|d| d.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn zero_quota_terminates_without_extracting() {
    let fetcher = Arc::new(site());
    let (sink, source) = bounded(64);

    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        crawl(fetcher, sink, seed_url(), HashSet::new(), scope(), config(0, 4)),
    )
    .await
    .expect("crawl must terminate")
    .unwrap();

    // Within the documented overshoot bound for quota 0.
    assert!(stats.pages_extracted <= 3);
    assert_eq!(source.try_iter().count(), 0);
}

#[tokio::test]
async fn quota_overshoot_stays_within_bound() {
    let fetcher = Arc::new(site());
    let (sink, source) = bounded(64);
    let quota = 2;
    let concurrency = 3;

    let stats = crawl(
        fetcher,
        sink,
        seed_url(),
        HashSet::new(),
        scope(),
        config(quota, concurrency),
    )
    .await
    .unwrap();

    assert!(stats.pages_extracted >= quota);
    assert!(stats.pages_extracted <= quota + concurrency - 1);
    assert!(source.try_iter().count() <= quota + concurrency - 1);
}

#[tokio::test]
async fn transport_failures_are_logged_and_skipped() {
    let fetcher = Arc::new(
        StubFetcher::new()
            .page(SEED, 200, article("A", "alpha", &["/wiki/Broken", "/wiki/B"]))
            .page("https://wiki.test/wiki/B", 200, article("B", "beta", &[])),
    );
    let (sink, source) = bounded(64);

    let stats = crawl(
        Arc::clone(&fetcher),
        sink,
        seed_url(),
        HashSet::new(),
        scope(),
        config(100, 2),
    )
    .await
    .unwrap();

    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(stats.pages_extracted, 2);
    assert_eq!(source.try_iter().count(), 2);
    // Failed fetches are not retried.
    assert_eq!(fetcher.hit_count("https://wiki.test/wiki/Broken"), 1);
}

#[tokio::test]
async fn non_200_pages_are_still_extracted() {
    let fetcher = Arc::new(StubFetcher::new().page(
        SEED,
        503,
        article("A", "degraded but present", &[]),
    ));
    let (sink, source) = bounded(64);

    let stats = crawl(fetcher, sink, seed_url(), HashSet::new(), scope(), config(10, 1))
        .await
        .unwrap();

    assert_eq!(stats.pages_extracted, 1);
    let docs: Vec<Document> = source.try_iter().collect();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.contains("degraded but present"));
}

#[tokio::test]
async fn pages_without_content_container_are_dropped() {
    let fetcher = Arc::new(
        StubFetcher::new()
            .page(SEED, 200, article("A", "alpha", &["/wiki/Bare"]))
            .page(
                "https://wiki.test/wiki/Bare",
                200,
                "<html><body><p>no container</p></body></html>".to_string(),
            ),
    );
    let (sink, source) = bounded(64);

    let stats = crawl(fetcher, sink, seed_url(), HashSet::new(), scope(), config(10, 2))
        .await
        .unwrap();

    // Both fetches count as extracted, but only A becomes a Document.
    assert_eq!(stats.pages_extracted, 2);
    let docs: Vec<Document> = source.try_iter().collect();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].url, SEED);
}

#[tokio::test]
async fn seeded_seen_urls_are_never_fetched() {
    let fetcher = Arc::new(site());
    let (sink, source) = bounded(64);
    let seen: HashSet<String> = HashSet::from(["https://wiki.test/wiki/B".to_string()]);

    crawl(
        Arc::clone(&fetcher),
        sink,
        seed_url(),
        seen.clone(),
        scope(),
        config(100, 2),
    )
    .await
    .unwrap();

    assert_eq!(fetcher.hit_count("https://wiki.test/wiki/B"), 0);
    let docs: Vec<Document> = source.try_iter().collect();
    // D is only reachable through B, so the session sees A and C.
    let mut urls: Vec<&str> = docs.iter().map(|d| d.url.as_str()).collect();
    urls.sort_unstable();
    assert_eq!(urls, vec![SEED, "https://wiki.test/wiki/C"]);
    for doc in &docs {
        assert!(!seen.contains(&doc.url));
    }
}

#[tokio::test]
#[should_panic(expected = "seed URL was already crawled")]
async fn seed_already_in_seen_set_is_a_caller_bug() {
    let (sink, _source) = bounded(4);
    let seen: HashSet<String> = HashSet::from([SEED.to_string()]);
    let _ = crawl(
        Arc::new(StubFetcher::new()),
        sink,
        seed_url(),
        seen,
        scope(),
        config(1, 1),
    )
    .await;
}
