//! BM25 relevance filtering of page markdown.
//!
//! The markdown is split into blocks (runs of lines separated by blank
//! lines). Each block is scored against the query with Okapi BM25, using the
//! page's own blocks as the corpus, and blocks scoring below the threshold are
//! dropped. Surviving blocks keep their original order.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashMap;

pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"][content], meta[property="og:description"][content]"#)
        .unwrap()
});
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "or", "she", "that", "the", "to", "was", "were", "will", "with",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    threshold: f32,
}

impl RelevanceFilter {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Keep the blocks of `markdown` relevant to `query`.
    ///
    /// A query with no usable terms, or a non-positive threshold, keeps
    /// everything.
    pub fn filter(&self, markdown: &str, query: &str) -> String {
        let terms: Vec<String> = tokenize(query).into_iter().unique().collect();
        if terms.is_empty() || self.threshold <= 0.0 {
            return markdown.trim().to_string();
        }

        let blocks = split_blocks(markdown);
        let scores = bm25_scores(&blocks, &terms);
        blocks
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score >= self.threshold)
            .map(|(block, _)| *block)
            .join("\n\n")
    }
}

/// BM25 score of every block against `terms`, with the blocks as the corpus.
pub fn bm25_scores(blocks: &[&str], terms: &[String]) -> Vec<f32> {
    if blocks.is_empty() {
        return Vec::new();
    }

    let docs: Vec<HashMap<String, usize>> = blocks.iter().map(|b| tokenize(b).into_iter().counts()).collect();
    let lengths: Vec<usize> = docs.iter().map(|d| d.values().sum()).collect();
    let n = docs.len() as f32;
    let avg_len = (lengths.iter().sum::<usize>() as f32 / n).max(1.0);

    let idf: Vec<f32> = terms
        .iter()
        .map(|t| {
            let containing = docs.iter().filter(|d| d.contains_key(t)).count() as f32;
            ((n - containing + 0.5) / (containing + 0.5) + 1.0).ln()
        })
        .collect();

    docs.iter()
        .zip(&lengths)
        .map(|(doc, &len)| {
            let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * len as f32 / avg_len);
            terms
                .iter()
                .zip(&idf)
                .map(|(term, idf)| {
                    let tf = doc.get(term).copied().unwrap_or(0) as f32;
                    idf * tf * (BM25_K1 + 1.0) / (tf + norm)
                })
                .sum()
        })
        .collect()
}

/// A query describing the page, for when the caller gave none: its title,
/// meta description and first `h1`.
pub fn derive_query(document: &Html) -> Option<String> {
    let text_of = |selector: &Selector| {
        document
            .select(selector)
            .next()
            .map(|el| el.text().collect::<String>())
    };
    let description = document
        .select(&DESCRIPTION)
        .find_map(|el| el.value().attr("content"))
        .map(str::to_string);

    let query = [text_of(&TITLE), description, text_of(&H1)]
        .into_iter()
        .flatten()
        .map(|s| s.split_whitespace().join(" "))
        .filter(|s| !s.is_empty())
        .join(" ");
    (!query.is_empty()).then_some(query)
}

fn split_blocks(markdown: &str) -> Vec<&str> {
    markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}
