use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> =
        include_str!("stopwords.txt").split_whitespace().collect();
}

/// Split text into lowercase alphanumeric tokens after an NFKC fold.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = text.nfkc().collect::<String>().to_lowercase();
    TOKEN_RE
        .find_iter(&folded)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn remove_stopwords(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .filter(|token| !STOPWORDS.contains(token.as_str()))
        .collect()
}

/// Snowball stemming stands in for dictionary lemmatization; what matters is
/// that corpus and queries go through the same reduction.
pub fn lemmatize(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .map(|token| STEMMER.stem(&token).to_string())
        .collect()
}

/// The full pipeline: tokenize, drop stopwords, then stem. Index builds and
/// query-vector computation must both go through this one entry point, in
/// this order, or similarity scores silently degrade.
pub fn normalize(text: &str) -> Vec<String> {
    lemmatize(remove_stopwords(tokenize(text)))
}

pub fn term_frequencies(tokens: &[String]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    counts
}
