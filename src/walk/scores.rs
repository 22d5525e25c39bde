use serde::Serialize;
use std::collections::HashMap;

/// Whether [`FeedScores::add`] saw the URL for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    First,
    Repeat,
}

/// One row of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeed {
    pub url: String,
    pub score: f64,
}

/// Accumulated score per feed URL for one traversal.
///
/// URLs are compared as raw strings. Insertion order is remembered so that
/// [`ranked`](Self::ranked) can break ties by first encounter.
#[derive(Debug, Clone, Default)]
pub struct FeedScores {
    index: HashMap<String, usize>,
    entries: Vec<(String, f64)>,
}

impl FeedScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<f64> {
        self.index.get(url).map(|&i| self.entries[i].1)
    }

    /// Adds `weight` to `url`'s score, inserting it if absent.
    pub fn add(&mut self, url: &str, weight: f64) -> Visit {
        if let Some(&i) = self.index.get(url) {
            self.entries[i].1 += weight;
            return Visit::Repeat;
        }

        self.index.insert(url.to_owned(), self.entries.len());
        self.entries.push((url.to_owned(), weight));
        Visit::First
    }

    /// Entries in first-encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(url, score)| (url.as_str(), *score))
    }

    /// Entries by descending score; equal scores keep first-encounter order.
    pub fn ranked(&self) -> Vec<RankedFeed> {
        let mut ranked: Vec<RankedFeed> = self
            .iter()
            .map(|(url, score)| RankedFeed {
                url: url.to_owned(),
                score,
            })
            .collect();
        // sort_by is stable
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}
