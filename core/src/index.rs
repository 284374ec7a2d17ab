use crate::matrix::Matrix;
use crate::{DocId, Posting, PostingMap, TermId};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// A document row as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocRecord {
    pub id: DocId,
    pub url: String,
    pub title: String,
}

/// Rows actually written by one build; keyed inserts that hit existing rows
/// are not counted.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStats {
    pub documents: u64,
    pub terms: u64,
    pub postings: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub documents: u64,
    pub terms: u64,
    pub postings: u64,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id    INTEGER PRIMARY KEY,
    url   TEXT UNIQUE NOT NULL,
    title TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS terms (
    id   INTEGER PRIMARY KEY,
    term TEXT UNIQUE NOT NULL,
    idf  REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS postings (
    document_id INTEGER NOT NULL,
    term_id     INTEGER NOT NULL,
    count       INTEGER NOT NULL,
    tf          REAL NOT NULL,
    tf_idf      REAL NOT NULL,
    PRIMARY KEY (document_id, term_id)
);
";

/// TF-IDF inverted index backed by a single SQLite file. One writer at a
/// time; readers may run concurrently with no writer.
#[derive(Clone)]
pub struct InvertedIndex {
    conn: Arc<Mutex<Connection>>,
}

impl InvertedIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open index at {}", path.as_ref().display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Compute idf/tf/tf-idf for the aggregated postings and persist them in
    /// one transaction. Every insert is keyed, so rebuilding from the same
    /// map is a no-op per document, term, and (document, term) pair.
    ///
    /// idf = ln(N / df) with N = distinct documents in the map and df the
    /// term's posting-list length; df >= 1 holds by construction because a
    /// term only enters the map through a document that contains it.
    pub fn build_from_postings(&self, map: PostingMap) -> Result<BuildStats> {
        let PostingMap { postings, documents } = map;
        let total_docs = documents.len();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut stats = BuildStats::default();

        {
            let mut insert_doc = tx.prepare(
                "INSERT OR IGNORE INTO documents (id, url, title) VALUES (?1, ?2, ?3)",
            )?;
            let mut ids: Vec<DocId> = documents.keys().copied().collect();
            ids.sort_unstable();
            for id in ids {
                let meta = &documents[&id];
                stats.documents += insert_doc.execute(params![id, meta.url, meta.title])? as u64;
            }
        }

        let mut next_term_id: TermId =
            tx.query_row("SELECT COALESCE(MAX(id) + 1, 0) FROM terms", [], |row| {
                row.get(0)
            })?;

        // Sorted term order keeps id assignment, and therefore the matrix,
        // deterministic for a given corpus.
        let mut terms: Vec<(String, Vec<Posting>)> = postings.into_iter().collect();
        terms.sort_by(|a, b| a.0.cmp(&b.0));

        {
            let mut find_term = tx.prepare("SELECT id FROM terms WHERE term = ?1")?;
            let mut upsert_term = tx.prepare(
                "INSERT INTO terms (id, term, idf) VALUES (?1, ?2, ?3)
                 ON CONFLICT(term) DO UPDATE SET idf = excluded.idf",
            )?;
            let mut insert_posting = tx.prepare(
                "INSERT OR IGNORE INTO postings (document_id, term_id, count, tf, tf_idf)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for (term, posting_list) in terms {
                let df = posting_list.len();
                let idf = (total_docs as f64 / df as f64).ln();

                let term_id: TermId = match find_term
                    .query_row(params![term], |row| row.get(0))
                    .optional()?
                {
                    Some(id) => id,
                    None => {
                        let id = next_term_id;
                        next_term_id += 1;
                        id
                    }
                };
                upsert_term.execute(params![term_id, term, idf])?;
                stats.terms += 1;

                let max_count = posting_list.iter().map(|p| p.count).max().unwrap_or(1);
                for posting in posting_list {
                    let tf = posting.count as f64 / max_count as f64;
                    stats.postings += insert_posting.execute(params![
                        posting.doc_id,
                        term_id,
                        posting.count,
                        tf,
                        tf * idf
                    ])? as u64;
                }
            }
        }

        tx.commit()?;
        tracing::info!(
            documents = stats.documents,
            terms = stats.terms,
            postings = stats.postings,
            "index build committed"
        );
        Ok(stats)
    }

    /// Materialize the dense document-term weight matrix from the persisted
    /// postings. Dimensions come from the highest stored ids, so ids always
    /// index rows and columns directly even if a run left gaps.
    pub fn matrix(&self) -> Result<Matrix> {
        let conn = self.conn.lock();
        let rows: i64 = conn.query_row(
            "SELECT COALESCE(MAX(id) + 1, 0) FROM documents",
            [],
            |row| row.get(0),
        )?;
        let cols: i64 =
            conn.query_row("SELECT COALESCE(MAX(id) + 1, 0) FROM terms", [], |row| {
                row.get(0)
            })?;
        let mut matrix = Matrix::zeros(rows as usize, cols as usize);

        let mut stmt = conn.prepare("SELECT document_id, term_id, tf_idf FROM postings")?;
        let mut rows_iter = stmt.query([])?;
        while let Some(row) = rows_iter.next()? {
            let doc_id: i64 = row.get(0)?;
            let term_id: i64 = row.get(1)?;
            let tf_idf: f64 = row.get(2)?;
            matrix.set(doc_id as usize, term_id as usize, tf_idf);
        }
        Ok(matrix)
    }

    pub fn document_id(&self, url: &str) -> Result<Option<DocId>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id FROM documents WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn term_id(&self, term: &str) -> Result<Option<TermId>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id FROM terms WHERE term = ?1",
                params![term],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn term_idf(&self, term: &str) -> Result<Option<(TermId, f64)>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id, idf FROM terms WHERE term = ?1",
                params![term],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    pub fn document(&self, id: DocId) -> Result<Option<DocRecord>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id, url, title FROM documents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DocRecord {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        title: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// All persisted document URLs, used to seed the crawler's seen set so a
    /// later session never re-fetches what it already has.
    pub fn document_urls(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT url FROM documents")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;
        Ok(urls)
    }

    /// Next free document id; a resumed crawl continues the stored sequence
    /// instead of colliding with persisted rows.
    pub fn next_document_id(&self) -> Result<DocId> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT COALESCE(MAX(id) + 1, 0) FROM documents",
            [],
            |row| row.get(0),
        )?)
    }

    /// Number of term dimensions a weight vector needs to line up with the
    /// materialized matrix.
    pub fn term_dimensions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let cols: i64 =
            conn.query_row("SELECT COALESCE(MAX(id) + 1, 0) FROM terms", [], |row| {
                row.get(0)
            })?;
        Ok(cols as usize)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let documents: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
        let terms: i64 = conn.query_row("SELECT COUNT(*) FROM terms", [], |r| r.get(0))?;
        let postings: i64 = conn.query_row("SELECT COUNT(*) FROM postings", [], |r| r.get(0))?;
        Ok(StoreStats {
            documents: documents as u64,
            terms: terms as u64,
            postings: postings as u64,
        })
    }
}
