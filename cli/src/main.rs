use anyhow::{anyhow, ensure, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::bounded;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;
use wikirec_core::index::InvertedIndex;
use wikirec_core::recommend::{cosine_similarity, jaccard_similarity, k_nearest_to_centroid};
use wikirec_crawler::{crawl, page_vector, url_key, CrawlConfig, CrawlScope, HttpFetcher};
use wikirec_indexer::{index_documents, IndexerConfig};

#[derive(Parser)]
#[command(name = "wikirec")]
#[command(about = "Crawl a wiki-style corpus, build a TF-IDF index, recommend similar pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from a seed URL and index the fetched pages
    Crawl(CrawlArgs),
    /// Recommend indexed pages similar to the given URLs
    Recommend(RecommendArgs),
    /// Print index statistics
    Stats(StatsArgs),
}

#[derive(Args)]
struct CrawlArgs {
    /// Seed URL for the breadth-first expansion
    #[arg(long)]
    seed: String,
    /// Index database path
    #[arg(long, default_value = "./wikirec.db")]
    db: String,
    /// Stop after roughly this many pages; concurrent fetches may overshoot
    /// by up to fetchers - 1
    #[arg(long, default_value_t = 1000)]
    quota: usize,
    /// Concurrently in-flight fetch tasks
    #[arg(long, default_value_t = 30)]
    fetchers: usize,
    /// Indexing worker threads
    #[arg(long, default_value_t = 10)]
    workers: usize,
    /// Skip URLs already present in the index database
    #[arg(long, default_value_t = false)]
    resume: bool,
    /// Capacity of the crawler-to-indexer hand-off queue; a full queue
    /// blocks the crawler
    #[arg(long, default_value_t = 512)]
    queue_capacity: usize,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    #[command(flatten)]
    scope: ScopeArgs,
}

#[derive(Args)]
struct RecommendArgs {
    #[arg(long, default_value = "./wikirec.db")]
    db: String,
    /// Pages to recommend against; out-of-corpus URLs are fetched and
    /// vectorized live
    #[arg(long = "url", required = true)]
    urls: Vec<String>,
    /// How many recommendations to return
    #[arg(short, default_value_t = 5)]
    k: usize,
    #[arg(long, value_enum, default_value_t = SimilarityArg::Cosine)]
    similarity: SimilarityArg,
    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    #[command(flatten)]
    scope: ScopeArgs,
}

#[derive(Args)]
struct StatsArgs {
    #[arg(long, default_value = "./wikirec.db")]
    db: String,
}

#[derive(Args)]
struct ScopeArgs {
    /// Path prefix that marks an in-corpus article
    #[arg(long, default_value = "/wiki/")]
    article_prefix: String,
    /// CSS selector for the page's content container
    #[arg(long, default_value = "#bodyContent")]
    content_selector: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum SimilarityArg {
    Cosine,
    Jaccard,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Crawl(args) => run_crawl(args),
        Commands::Recommend(args) => run_recommend(args),
        Commands::Stats(args) => run_stats(args),
    }
}

fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn run_crawl(args: CrawlArgs) -> Result<()> {
    let seed: Url = args.seed.parse().context("invalid seed URL")?;
    let scope = CrawlScope::new(&seed, &args.scope.article_prefix, &args.scope.content_selector)?;
    let index = InvertedIndex::open(&args.db)?;

    let seen = if args.resume {
        let seen = index.document_urls()?;
        tracing::info!(known_urls = seen.len(), "seeding seen set from the index");
        seen
    } else {
        HashSet::new()
    };
    ensure!(
        !seen.contains(&url_key(&seed)),
        "seed {} is already indexed; pick a seed outside the corpus or drop --resume",
        seed
    );

    let first_doc_id = index.next_document_id()?;
    let (sink, source) = bounded(args.queue_capacity);

    let indexer_index = index.clone();
    let indexer_config = IndexerConfig {
        workers: args.workers,
        ..IndexerConfig::default()
    };
    let indexer = thread::spawn(move || index_documents(source, &indexer_index, &indexer_config));

    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(args.timeout_secs))?);
    let config = CrawlConfig {
        page_quota: args.quota,
        concurrency: args.fetchers,
        first_doc_id,
    };
    let stats = current_thread_runtime()?.block_on(crawl(fetcher, sink, seed, seen, scope, config))?;

    let build = indexer
        .join()
        .map_err(|_| anyhow!("indexer thread panicked"))??;

    println!(
        "crawl: pages_extracted={} fetch_failures={} urls_seen={}",
        stats.pages_extracted, stats.fetch_failures, stats.urls_seen
    );
    println!(
        "index: +{} documents, +{} postings across {} terms",
        build.documents, build.postings, build.terms
    );
    Ok(())
}

#[derive(Serialize)]
struct Hit {
    doc_id: u32,
    score: f64,
    url: String,
    title: String,
}

fn run_recommend(args: RecommendArgs) -> Result<()> {
    let index = InvertedIndex::open(&args.db)?;
    let matrix = index.matrix()?;
    ensure!(matrix.rows() > 0, "index at {} is empty; crawl first", args.db);

    let fetcher = HttpFetcher::new(Duration::from_secs(args.timeout_secs))?;
    let runtime = current_thread_runtime()?;

    let mut given = Vec::with_capacity(args.urls.len());
    for raw in &args.urls {
        let url: Url = raw.parse().with_context(|| format!("invalid URL {raw}"))?;
        match index.document_id(&url_key(&url))? {
            Some(id) => given.push(matrix.row(id as usize).to_vec()),
            None => {
                tracing::info!(%url, "not in corpus, computing query vector live");
                let scope =
                    CrawlScope::new(&url, &args.scope.article_prefix, &args.scope.content_selector)?;
                given.push(runtime.block_on(page_vector(&fetcher, &url, &scope, &index))?);
            }
        }
    }

    let nearest = match args.similarity {
        SimilarityArg::Cosine => k_nearest_to_centroid(&given, &matrix, args.k, cosine_similarity),
        SimilarityArg::Jaccard => k_nearest_to_centroid(&given, &matrix, args.k, jaccard_similarity),
    };

    let mut hits = Vec::with_capacity(nearest.len());
    for (doc_id, score) in nearest {
        let doc = index
            .document(doc_id)?
            .ok_or_else(|| anyhow!("posting references missing document {doc_id}"))?;
        hits.push(Hit {
            doc_id,
            score,
            url: doc.url,
            title: doc.title,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        for hit in &hits {
            println!("{:>8.4}  {}  ({})", hit.score, hit.url, hit.title);
        }
    }
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    let index = InvertedIndex::open(&args.db)?;
    let stats = index.stats()?;
    println!(
        "documents={} terms={} postings={}",
        stats.documents, stats.terms, stats.postings
    );
    Ok(())
}
