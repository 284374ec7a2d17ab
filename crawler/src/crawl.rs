use crate::extract::{extract, url_key, CrawlScope};
use crate::fetch::Fetch;
use anyhow::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;
use wikirec_core::{DocId, Document};

/// Tuning for one crawl invocation.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Stop fetching once this many pages have been extracted. The gate is
    /// checked after each fetch, so concurrent tasks can overshoot by up to
    /// concurrency - 1 pages.
    pub page_quota: usize,
    /// Number of concurrently in-flight fetch tasks.
    pub concurrency: usize,
    /// First document id to issue; resumed sessions continue the stored
    /// sequence.
    pub first_doc_id: DocId,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_quota: 1000,
            concurrency: 30,
            first_doc_id: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlStats {
    pub pages_extracted: usize,
    pub fetch_failures: usize,
    pub urls_seen: usize,
}

struct Frontier {
    queue: VecDeque<Url>,
    seen: HashSet<String>,
}

struct CrawlState {
    frontier: Mutex<Frontier>,
    extracted: AtomicUsize,
    failures: AtomicUsize,
    /// Tasks currently between claiming a URL and finishing its page; idle
    /// tasks may only exit once the frontier is empty AND this is zero.
    busy: AtomicUsize,
    next_doc_id: AtomicU32,
    quota: usize,
    scope: CrawlScope,
    sink: Sender<Document>,
}

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Breadth-first crawl from `seed_url`, bounded by the page quota. Fetched
/// pages are emitted into `sink` as Documents; discovered in-corpus links
/// feed the frontier. `seen_urls` carries URLs fetched in earlier sessions.
///
/// The seed must not already be in `seen_urls` - that is a caller bug, not a
/// runtime condition.
pub async fn crawl<F: Fetch + 'static>(
    fetcher: Arc<F>,
    sink: Sender<Document>,
    seed_url: Url,
    seen_urls: HashSet<String>,
    scope: CrawlScope,
    config: CrawlConfig,
) -> Result<CrawlStats> {
    assert!(
        !seen_urls.contains(&url_key(&seed_url)),
        "seed URL was already crawled"
    );

    let state = Arc::new(CrawlState {
        frontier: Mutex::new(Frontier {
            queue: VecDeque::from([seed_url]),
            seen: seen_urls,
        }),
        extracted: AtomicUsize::new(0),
        failures: AtomicUsize::new(0),
        busy: AtomicUsize::new(0),
        next_doc_id: AtomicU32::new(config.first_doc_id),
        quota: config.page_quota,
        scope,
        sink,
    });

    let started = Instant::now();
    let mut tasks = JoinSet::new();
    for worker in 0..config.concurrency.max(1) {
        let fetcher = Arc::clone(&fetcher);
        let state = Arc::clone(&state);
        tasks.spawn(async move { fetch_task(worker, fetcher, state).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined?;
    }

    let stats = CrawlStats {
        pages_extracted: state.extracted.load(Ordering::Relaxed),
        fetch_failures: state.failures.load(Ordering::Relaxed),
        urls_seen: state.frontier.lock().seen.len(),
    };
    info!(
        pages_extracted = stats.pages_extracted,
        fetch_failures = stats.fetch_failures,
        urls_seen = stats.urls_seen,
        elapsed_s = started.elapsed().as_secs_f64(),
        "crawl finished"
    );
    Ok(stats)
}

async fn fetch_task<F: Fetch>(worker: usize, fetcher: Arc<F>, state: Arc<CrawlState>) {
    loop {
        let url = {
            let mut frontier = state.frontier.lock();
            match frontier.queue.pop_front() {
                Some(url) => {
                    if !frontier.seen.insert(url_key(&url)) {
                        // Claimed by an earlier pop; drop it.
                        continue;
                    }
                    // Mark busy before releasing the lock so idle tasks
                    // cannot observe a false quiescence.
                    state.busy.fetch_add(1, Ordering::SeqCst);
                    url
                }
                None => {
                    if state.busy.load(Ordering::SeqCst) == 0 {
                        debug!(worker, "frontier drained, task exiting");
                        return;
                    }
                    drop(frontier);
                    tokio::time::sleep(IDLE_POLL).await;
                    continue;
                }
            }
        };

        let outcome = visit(fetcher.as_ref(), &state, url).await;
        state.busy.fetch_sub(1, Ordering::SeqCst);
        if matches!(outcome, Visit::Stop) {
            debug!(worker, "quota reached, abandoning frontier");
            return;
        }
    }
}

enum Visit {
    Continue,
    Stop,
}

async fn visit<F: Fetch>(fetcher: &F, state: &CrawlState, url: Url) -> Visit {
    debug!(%url, "fetching");
    let response = match fetcher.fetch(&url).await {
        Ok(response) => response,
        Err(error) => {
            // Transport failure: the URL stays marked seen and is never
            // retried, and nothing is expanded from it.
            warn!(%url, %error, "fetch failed");
            state.failures.fetch_add(1, Ordering::Relaxed);
            return Visit::Continue;
        }
    };

    if response.status != 200 {
        // The body may still carry usable content; keep going.
        warn!(%url, status = response.status, "non-200 response");
    }

    // Racy by design: concurrent tasks can pass the gate together, so the
    // final count may exceed the quota by up to concurrency - 1.
    if state.extracted.load(Ordering::Relaxed) >= state.quota {
        return Visit::Stop;
    }
    state.extracted.fetch_add(1, Ordering::Relaxed);

    let Some(page) = extract(&response.body, &url, &state.scope) else {
        warn!(%url, "content container missing, skipping page");
        return Visit::Continue;
    };

    let id = state.next_doc_id.fetch_add(1, Ordering::Relaxed);
    let document = Document {
        id,
        url: url_key(&url),
        title: page.title,
        text: page.text,
    };
    if state.sink.send(document).is_err() {
        warn!(%url, "document sink disconnected, stopping");
        return Visit::Stop;
    }

    let mut frontier = state.frontier.lock();
    for link in page.links {
        if !frontier.seen.contains(&url_key(&link)) {
            frontier.queue.push_back(link);
        }
    }
    info!(
        %url,
        extracted = state.extracted.load(Ordering::Relaxed),
        frontier = frontier.queue.len(),
        "page extracted"
    );
    Visit::Continue
}
