//! Ranked output of a crawl.
use crate::feed::OpmlFeed;
use crate::walk::Crawl;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFeed {
    pub url: String,
    /// The title the feed itself declares, else the first outline title seen
    /// for this URL in any visited blogroll.
    pub title: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitedBlogroll {
    pub url: String,
    pub depth: usize,
    pub feeds: usize,
}

/// Everything printed at the end of a run, in printable/serializable form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub seed: String,
    pub seed_title: Option<String>,
    /// Descending score, ties in first-encounter order.
    pub scores: Vec<ScoredFeed>,
    /// Visitation order, root first.
    pub blogrolls: Vec<VisitedBlogroll>,
}

impl Report {
    pub fn from_crawl(crawl: &Crawl) -> Self {
        let mut titles: HashMap<&str, &str> = HashMap::new();
        for node in crawl.tree.nodes() {
            for feed in &node.blogroll.feeds {
                if let Some(title) = feed.title.as_deref() {
                    titles.entry(feed.xml_url.as_str()).or_insert(title);
                }
            }
        }

        let scores = crawl
            .scores
            .ranked()
            .into_iter()
            .map(|ranked| ScoredFeed {
                title: crawl
                    .tree
                    .feed_title(&ranked.url)
                    .or_else(|| titles.get(ranked.url.as_str()).copied())
                    .map(str::to_string),
                url: ranked.url,
                score: ranked.score,
            })
            .collect();

        let blogrolls = crawl
            .tree
            .nodes()
            .iter()
            .map(|node| VisitedBlogroll {
                url: node.blogroll.url.clone(),
                depth: node.depth,
                feeds: node.blogroll.feeds.len(),
            })
            .collect();

        Self {
            seed: crawl.seed.url.clone(),
            seed_title: crawl.seed.title.clone(),
            scores,
            blogrolls,
        }
    }

    /// The `n` highest-ranked feeds.
    pub fn top(&self, n: usize) -> &[ScoredFeed] {
        &self.scores[..n.min(self.scores.len())]
    }

    /// The ranking as OPML outlines, best first.
    pub fn to_opml_feeds(&self) -> Vec<OpmlFeed> {
        self.scores
            .iter()
            .map(|feed| OpmlFeed {
                title: feed.title.clone(),
                xml_url: feed.url.clone(),
            })
            .collect()
    }

    /// Human-readable listing: ranked scores, then the blogroll tree indented by depth.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        match &self.seed_title {
            Some(title) => {
                let _ = writeln!(out, "Seed: {} ({})", title, self.seed);
            }
            None => {
                let _ = writeln!(out, "Seed: {}", self.seed);
            }
        }

        let _ = writeln!(out, "\nSorted Feed Scores:");
        for feed in &self.scores {
            let _ = write!(out, "{:>8.4}  {}", feed.score, feed.url);
            if let Some(title) = &feed.title {
                let _ = write!(out, "  ({title})");
            }
            out.push('\n');
        }

        let _ = writeln!(out, "\nBlogroll Tree:");
        for node in &self.blogrolls {
            let _ = writeln!(
                out,
                "{:indent$}{} [{} feeds]",
                "",
                node.url,
                node.feeds,
                indent = 2 * (node.depth + 1)
            );
        }

        out
    }
}
