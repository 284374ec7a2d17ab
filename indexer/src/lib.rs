use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use wikirec_core::index::{BuildStats, InvertedIndex};
use wikirec_core::text::{normalize, term_frequencies};
use wikirec_core::{Document, PostingMap};

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub workers: usize,
    /// How long a worker waits on an empty queue before treating the
    /// pipeline as finished. There is no explicit done token: too short
    /// risks exiting under a stalled crawler, too long just delays
    /// shutdown.
    pub pop_timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            pop_timeout: Duration::from_secs(3),
        }
    }
}

/// Drain `source` with a pool of worker threads, aggregate term counts into
/// one shared posting map, then hand the map wholesale to the index builder.
///
/// A panicking worker aborts the run: per-document tokenization is not
/// expected to fail, so anything that does is structural.
pub fn index_documents(
    source: Receiver<Document>,
    index: &InvertedIndex,
    config: &IndexerConfig,
) -> Result<BuildStats> {
    let map = Arc::new(Mutex::new(PostingMap::new()));

    let workers: Vec<_> = (0..config.workers.max(1))
        .map(|worker| {
            let source = source.clone();
            let map = Arc::clone(&map);
            let pop_timeout = config.pop_timeout;
            thread::spawn(move || drain(worker, source, map, pop_timeout))
        })
        .collect();

    let mut indexed = 0usize;
    for handle in workers {
        match handle.join() {
            Ok(count) => indexed += count,
            Err(_) => bail!("indexing worker panicked"),
        }
    }
    info!(documents = indexed, "indexing workers finished");

    let map = Arc::try_unwrap(map)
        .map_err(|_| anyhow!("posting map still shared after workers joined"))?
        .into_inner();
    index.build_from_postings(map)
}

fn drain(
    worker: usize,
    source: Receiver<Document>,
    map: Arc<Mutex<PostingMap>>,
    pop_timeout: Duration,
) -> usize {
    let mut indexed = 0usize;
    loop {
        let document = match source.recv_timeout(pop_timeout) {
            Ok(document) => document,
            Err(RecvTimeoutError::Timeout) => {
                debug!(worker, "queue idle past timeout, worker exiting");
                return indexed;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!(worker, "queue closed, worker exiting");
                return indexed;
            }
        };

        // Tokenize outside the lock; only the fold is exclusive.
        let counts = term_frequencies(&normalize(&document.text));
        let url = document.url.clone();
        map.lock().fold(document, counts);
        indexed += 1;
        debug!(worker, %url, "indexed document");
    }
}
