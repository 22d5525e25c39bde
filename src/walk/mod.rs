//! Depth-bounded blogroll traversal.
//!
//! Starting from a root blogroll, every listed feed is scored with
//! `1 / (depth + 1)`. The first time a feed URL is scored, its own blogroll
//! is walked one level deeper; later references only add to the score. A
//! blogroll already walked in this traversal (the root included) is not
//! walked again, even when reached through a different feed.
//!
//! The walk runs on an explicit stack of frames rather than recursion, so
//! adversarial graphs cannot exhaust the call stack. Visitation order is the
//! same as a depth-first recursive walk: a feed's whole subtree is finished
//! before the next sibling feed is scored.

mod scores;

pub use scores::{FeedScores, RankedFeed, Visit};

use crate::feed::{Blogroll, BlogrollLoadError, FeedRef};
use std::collections::{HashMap, HashSet};

/// Resolves feed URLs to [`FeedRef`]s, loading any blogroll they advertise.
///
/// [`crate::feed::HttpSource`] is the network implementation. Failing to
/// find a blogroll is not an error; failing to load one that was found is.
#[allow(async_fn_in_trait)]
pub trait BlogrollSource {
    async fn resolve_feed(&self, feed_url: &str) -> Result<FeedRef, BlogrollLoadError>;
}

/// A visited blogroll and the depth it was reached at (root = 0).
#[derive(Debug, Clone, PartialEq)]
pub struct BlogrollNode {
    pub depth: usize,
    pub blogroll: Blogroll,
}

/// Every blogroll visited by one traversal, root first, in visitation order.
///
/// A blogroll reached at the depth limit is recorded but not expanded, so it
/// can appear again at a shallower depth if another path leads to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlogrollTree {
    nodes: Vec<BlogrollNode>,
    /// Title each scored feed declared when it was resolved.
    titles: HashMap<String, String>,
}

impl BlogrollTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[BlogrollNode] {
        &self.nodes
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.blogroll.url.as_str())
    }

    /// Title the feed at `url` declared itself, if it was resolved and had one.
    pub fn feed_title(&self, url: &str) -> Option<&str> {
        self.titles.get(url).map(String::as_str)
    }
}

/// Weight of one reference found in a blogroll at `depth`.
pub fn weight_at(depth: usize) -> f64 {
    1.0 / (depth as f64 + 1.0)
}

struct Frame {
    depth: usize,
    feeds: std::vec::IntoIter<FeedRef>,
}

/// Walks `root` and everything reachable from it, down to `max_depth`.
///
/// `root` is treated as being at `depth`; a blogroll at `max_depth` or
/// deeper is recorded in the tree but its feeds are neither resolved nor
/// scored. `scores` is updated in place and should start empty for a fresh
/// traversal.
///
/// # Errors
///
/// The first [`BlogrollLoadError`] from the source aborts the walk.
pub async fn walk<S>(
    source: &S,
    root: Blogroll,
    depth: usize,
    max_depth: usize,
    scores: &mut FeedScores,
) -> Result<BlogrollTree, BlogrollLoadError>
where
    S: BlogrollSource + ?Sized,
{
    let mut tree = BlogrollTree::default();
    let mut expanded = HashSet::new();
    let mut stack = Vec::new();

    if let Some(frame) = enter(source, root, depth, max_depth, &mut tree, &mut expanded).await? {
        stack.push(frame);
    }

    while let Some(frame) = stack.last_mut() {
        let depth = frame.depth;
        let Some(feed) = frame.feeds.next() else {
            stack.pop();
            tracing::debug!(depth, scored = scores.len(), "Finished blogroll");
            continue;
        };

        if scores.add(&feed.url, weight_at(depth)) == Visit::Repeat {
            continue;
        }

        let FeedRef {
            url,
            title,
            blogroll,
        } = feed;
        if let Some(title) = title {
            tree.titles.insert(url.clone(), title);
        }

        let Some(blogroll) = blogroll else {
            continue;
        };
        if expanded.contains(&blogroll.url) {
            tracing::debug!(feed = %url, blogroll = %blogroll.url, "Blogroll already walked");
            continue;
        }

        if let Some(child) =
            enter(source, blogroll, depth + 1, max_depth, &mut tree, &mut expanded).await?
        {
            stack.push(child);
        }
    }

    Ok(tree)
}

/// Records `blogroll` in the tree and, below the depth limit, resolves its
/// feeds into a frame ready to be scored.
async fn enter<S>(
    source: &S,
    blogroll: Blogroll,
    depth: usize,
    max_depth: usize,
    tree: &mut BlogrollTree,
    expanded: &mut HashSet<String>,
) -> Result<Option<Frame>, BlogrollLoadError>
where
    S: BlogrollSource + ?Sized,
{
    if depth >= max_depth {
        tracing::debug!(url = %blogroll.url, depth, "Depth limit reached");
        tree.nodes.push(BlogrollNode { depth, blogroll });
        return Ok(None);
    }

    expanded.insert(blogroll.url.clone());

    tracing::info!(url = %blogroll.url, depth, feeds = blogroll.feeds.len(), "Walking blogroll");
    let mut feeds = Vec::with_capacity(blogroll.feeds.len());
    for url in blogroll.feed_urls() {
        feeds.push(source.resolve_feed(url).await?);
    }

    tree.nodes.push(BlogrollNode { depth, blogroll });
    Ok(Some(Frame {
        depth,
        feeds: feeds.into_iter(),
    }))
}

/// Result of crawling outward from a seed feed.
#[derive(Debug, Clone)]
pub struct Crawl {
    pub seed: FeedRef,
    pub tree: BlogrollTree,
    pub scores: FeedScores,
}

/// Resolves `seed_url` and walks its blogroll with a fresh score table.
///
/// Returns `Ok(None)` when the seed advertises no blogroll. The returned
/// seed has its blogroll moved into the tree's root node.
pub async fn crawl<S>(
    source: &S,
    seed_url: &str,
    max_depth: usize,
) -> Result<Option<Crawl>, BlogrollLoadError>
where
    S: BlogrollSource + ?Sized,
{
    let mut seed = source.resolve_feed(seed_url).await?;
    let Some(blogroll) = seed.blogroll.take() else {
        tracing::info!(url = %seed_url, "Seed feed has no blogroll");
        return Ok(None);
    };

    let mut scores = FeedScores::new();
    let tree = walk(source, blogroll, 0, max_depth, &mut scores).await?;
    tracing::info!(
        blogrolls = tree.len(),
        feeds = scores.len(),
        "Blogroll walk complete"
    );

    Ok(Some(Crawl { seed, tree, scores }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchError, OpmlFeed};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory feed graph: feed URL -> the feed URLs its blogroll lists.
    #[derive(Default)]
    struct StubSource {
        blogrolls: HashMap<String, Vec<String>>,
        /// Overrides the default `<feed>.opml` blogroll location.
        roll_urls: HashMap<String, String>,
        broken: Vec<String>,
        resolved: RefCell<HashMap<String, usize>>,
    }

    impl StubSource {
        fn with(mut self, feed: &str, listed: &[&str]) -> Self {
            self.blogrolls.insert(
                feed.to_string(),
                listed.iter().map(|s| s.to_string()).collect(),
            );
            self
        }

        fn roll_at(mut self, feed: &str, roll_url: &str) -> Self {
            self.roll_urls.insert(feed.to_string(), roll_url.to_string());
            self
        }

        fn broken(mut self, feed: &str) -> Self {
            self.broken.push(feed.to_string());
            self
        }

        fn blogroll_of(&self, feed: &str) -> Option<Blogroll> {
            let url = self
                .roll_urls
                .get(feed)
                .cloned()
                .unwrap_or_else(|| blogroll_url(feed));
            self.blogrolls
                .get(feed)
                .map(|listed| roll(&url, listed.as_slice()))
        }

        fn resolve_count(&self, feed: &str) -> usize {
            self.resolved.borrow().get(feed).copied().unwrap_or(0)
        }
    }

    impl BlogrollSource for StubSource {
        async fn resolve_feed(&self, feed_url: &str) -> Result<FeedRef, BlogrollLoadError> {
            *self
                .resolved
                .borrow_mut()
                .entry(feed_url.to_string())
                .or_default() += 1;

            if self.broken.iter().any(|b| b == feed_url) {
                return Err(BlogrollLoadError::Fetch {
                    url: blogroll_url(feed_url),
                    source: FetchError::HttpStatus(500),
                });
            }

            Ok(match self.blogroll_of(feed_url) {
                Some(blogroll) => FeedRef::with_blogroll(feed_url, blogroll),
                None => FeedRef::leaf(feed_url),
            })
        }
    }

    fn blogroll_url(feed: &str) -> String {
        format!("{feed}.opml")
    }

    fn roll<S: AsRef<str>>(url: &str, listed: &[S]) -> Blogroll {
        Blogroll::new(
            url,
            listed
                .iter()
                .map(|u| OpmlFeed {
                    title: None,
                    xml_url: u.as_ref().to_string(),
                })
                .collect(),
        )
    }

    fn score_map(scores: &FeedScores) -> Vec<(String, f64)> {
        scores.iter().map(|(u, s)| (u.to_string(), s)).collect()
    }

    #[tokio::test]
    async fn test_leaf_feeds_scored_once_each() {
        let source = StubSource::default();
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("root.opml", &["X", "Y"]), 0, 10, &mut scores)
            .await
            .unwrap();

        assert_eq!(tree.urls().collect::<Vec<_>>(), vec!["root.opml"]);
        assert_eq!(
            score_map(&scores),
            vec![("X".to_string(), 1.0), ("Y".to_string(), 1.0)]
        );
    }

    #[tokio::test]
    async fn test_two_cycle_back_to_seed_terminates() {
        // The root blogroll belongs to "seed"; X's blogroll lists "seed" again.
        let source = StubSource::default()
            .with("seed", &["X"])
            .with("X", &["seed"]);
        let root = source.blogroll_of("seed").unwrap();
        let mut scores = FeedScores::new();

        let tree = walk(&source, root, 0, 10, &mut scores).await.unwrap();

        assert_eq!(
            score_map(&scores),
            vec![("X".to_string(), 1.0), ("seed".to_string(), 0.5)]
        );
        assert_eq!(
            tree.urls().collect::<Vec<_>>(),
            vec!["seed.opml", "X.opml"]
        );
    }

    #[tokio::test]
    async fn test_zero_max_depth_only_records_root() {
        let source = StubSource::default().with("X", &["Y"]);
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("root.opml", &["X", "Y"]), 0, 0, &mut scores)
            .await
            .unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nodes()[0].depth, 0);
        assert!(scores.is_empty());
        assert_eq!(source.resolve_count("X"), 0);
    }

    #[tokio::test]
    async fn test_depth_limit_stops_expansion() {
        let source = StubSource::default()
            .with("A", &["B"])
            .with("B", &["C"])
            .with("C", &["D"]);
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("root.opml", &["A"]), 0, 2, &mut scores)
            .await
            .unwrap();

        let depths: Vec<(&str, usize)> = tree
            .nodes()
            .iter()
            .map(|n| (n.blogroll.url.as_str(), n.depth))
            .collect();
        assert_eq!(depths, vec![("root.opml", 0), ("A.opml", 1), ("B.opml", 2)]);
        // B.opml sits at the limit: its feeds are never resolved or scored
        assert_eq!(
            score_map(&scores),
            vec![("A".to_string(), 1.0), ("B".to_string(), 0.5)]
        );
        assert_eq!(source.resolve_count("C"), 0);
    }

    #[tokio::test]
    async fn test_diamond_expands_shared_feed_once() {
        let source = StubSource::default()
            .with("A", &["C"])
            .with("B", &["C"])
            .with("C", &["D"]);
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("root.opml", &["A", "B"]), 0, 10, &mut scores)
            .await
            .unwrap();

        assert_eq!(
            tree.urls().collect::<Vec<_>>(),
            vec!["root.opml", "A.opml", "C.opml", "B.opml"]
        );
        assert_eq!(scores.get("C"), Some(1.0));
        assert_eq!(scores.get("D"), Some(1.0 / 3.0));
        // D is only listed by C's blogroll, which was walked exactly once
        assert_eq!(source.resolve_count("D"), 1);
    }

    #[tokio::test]
    async fn test_blogroll_capped_deep_is_still_walked_when_reached_shallower() {
        // A (depth 1) and B (depth 0) own the same blogroll. Reached through A
        // it sits at the limit; reached through B it must still be walked.
        let source = StubSource::default()
            .with("P", &["A"])
            .with("A", &["Z"])
            .with("B", &["Z"])
            .roll_at("A", "shared.opml")
            .roll_at("B", "shared.opml");
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("root.opml", &["P", "B"]), 0, 2, &mut scores)
            .await
            .unwrap();

        let depths: Vec<(&str, usize)> = tree
            .nodes()
            .iter()
            .map(|n| (n.blogroll.url.as_str(), n.depth))
            .collect();
        assert_eq!(
            depths,
            vec![
                ("root.opml", 0),
                ("P.opml", 1),
                ("shared.opml", 2),
                ("shared.opml", 1),
            ]
        );
        assert_eq!(
            score_map(&scores),
            vec![
                ("P".to_string(), 1.0),
                ("A".to_string(), 0.5),
                ("B".to_string(), 1.0),
                ("Z".to_string(), 0.5),
            ]
        );
    }

    #[tokio::test]
    async fn test_expanded_blogroll_not_walked_twice() {
        let source = StubSource::default()
            .with("A", &["Z"])
            .with("B", &["Z"])
            .roll_at("A", "shared.opml")
            .roll_at("B", "shared.opml");
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("root.opml", &["A", "B"]), 0, 10, &mut scores)
            .await
            .unwrap();

        assert_eq!(
            tree.urls().collect::<Vec<_>>(),
            vec!["root.opml", "shared.opml"]
        );
        assert_eq!(scores.get("Z"), Some(0.5));
        assert_eq!(source.resolve_count("Z"), 1);
    }

    #[tokio::test]
    async fn test_repeated_references_add_weights() {
        // X appears at depth 0 twice and again at depth 1 via A's blogroll
        let source = StubSource::default().with("A", &["X", "X"]);
        let mut scores = FeedScores::new();

        walk(&source, roll("root.opml", &["X", "A", "X"]), 0, 10, &mut scores)
            .await
            .unwrap();

        let expected = 1.0 + 0.5 + 0.5 + 1.0;
        assert!((scores.get("X").unwrap() - expected).abs() < 1e-12);
        assert_eq!(scores.get("A"), Some(1.0));
    }

    #[tokio::test]
    async fn test_visitation_order_is_depth_first() {
        let source = StubSource::default()
            .with("A", &["A1"])
            .with("A1", &["A2"])
            .with("B", &["B1"]);
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("root.opml", &["A", "B"]), 0, 10, &mut scores)
            .await
            .unwrap();

        assert_eq!(
            tree.urls().collect::<Vec<_>>(),
            vec!["root.opml", "A.opml", "A1.opml", "B.opml"]
        );
        let order: Vec<&str> = scores.iter().map(|(u, _)| u).collect();
        assert_eq!(order, vec!["A", "A1", "A2", "B", "B1"]);
    }

    #[tokio::test]
    async fn test_walk_from_nonzero_depth_uses_its_weights() {
        let source = StubSource::default();
        let mut scores = FeedScores::new();

        let tree = walk(&source, roll("mid.opml", &["X"]), 3, 10, &mut scores)
            .await
            .unwrap();

        assert_eq!(tree.nodes()[0].depth, 3);
        assert_eq!(scores.get("X"), Some(0.25));
    }

    #[tokio::test]
    async fn test_load_error_aborts_walk() {
        let source = StubSource::default().with("A", &["B"]).broken("B");
        let mut scores = FeedScores::new();

        let err = walk(&source, roll("root.opml", &["A"]), 0, 10, &mut scores)
            .await
            .unwrap_err();

        assert_eq!(err.url(), "B.opml");
    }

    #[tokio::test]
    async fn test_crawl_without_seed_blogroll_is_none() {
        let source = StubSource::default();
        let crawl = crawl(&source, "lonely", 10).await.unwrap();
        assert!(crawl.is_none());
    }

    #[tokio::test]
    async fn test_crawl_uses_fresh_scores_each_time() {
        let source = StubSource::default().with("seed", &["X", "Y"]);

        let first = crawl(&source, "seed", 10).await.unwrap().unwrap();
        let second = crawl(&source, "seed", 10).await.unwrap().unwrap();

        assert_eq!(score_map(&first.scores), score_map(&second.scores));
        assert_eq!(second.scores.get("X"), Some(1.0));
        assert!(second.seed.blogroll.is_none());
        assert_eq!(second.tree.urls().collect::<Vec<_>>(), vec!["seed.opml"]);
    }

    fn feed(i: usize) -> String {
        format!("https://feed{i}.example/rss")
    }

    fn graph_source(graph: &[Vec<usize>]) -> StubSource {
        let mut source = StubSource::default();
        for (i, listed) in graph.iter().enumerate() {
            source
                .blogrolls
                .insert(feed(i), listed.iter().map(|&j| feed(j)).collect());
        }
        source
    }

    proptest! {
        #[test]
        fn prop_walk_is_bounded_and_scores_add_up(
            graph in (1usize..7).prop_flat_map(|n| {
                prop::collection::vec(prop::collection::vec(0..n, 0..5), n)
            }),
            max_depth in 0usize..6,
        ) {
            let source = graph_source(&graph);
            let root = source.blogroll_of(&feed(0)).unwrap();
            let mut scores = FeedScores::new();

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let tree = runtime
                .block_on(walk(&source, root, 0, max_depth, &mut scores))
                .unwrap();

            // No node deeper than the limit
            prop_assert!(tree.nodes().iter().all(|n| n.depth <= max_depth));

            // Each blogroll expanded at most once
            let urls: Vec<&str> = tree
                .nodes()
                .iter()
                .filter(|n| n.depth < max_depth)
                .map(|n| n.blogroll.url.as_str())
                .collect();
            let unique: HashSet<&str> = urls.iter().copied().collect();
            prop_assert_eq!(urls.len(), unique.len());

            // Every listing in an expanded blogroll contributes 1/(depth+1)
            let expected: f64 = tree
                .nodes()
                .iter()
                .filter(|n| n.depth < max_depth)
                .map(|n| n.blogroll.feeds.len() as f64 * weight_at(n.depth))
                .sum();
            let total: f64 = scores.iter().map(|(_, s)| s).sum();
            prop_assert!((expected - total).abs() < 1e-9);

            // Only expanded blogrolls had their feeds resolved
            for (i, _) in graph.iter().enumerate() {
                let listed_in_expanded = tree
                    .nodes()
                    .iter()
                    .filter(|n| n.depth < max_depth)
                    .any(|n| n.blogroll.feed_urls().any(|u| u == feed(i)));
                if !listed_in_expanded {
                    prop_assert_eq!(source.resolve_count(&feed(i)), 0);
                }
            }
        }
    }
}
