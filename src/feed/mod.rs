//! Feed resolution and blogroll loading.
//!
//! - [`discovery`] - finds the blogroll a feed advertises (`source:blogroll` or
//!   `<link rel="blogroll">` on the feed's origin)
//! - [`opml`] - OPML parsing and export
//! - [`source`] - [`HttpSource`], the network-backed [`crate::walk::BlogrollSource`]
//! - [`fetcher`] - bounded HTTP GET shared by all of the above, and the crawl client
//!   whose redirects stay inside the URL policy
//!
//! # Example
//!
//! ```ignore
//! let policy = UrlPolicy::default();
//! let source = HttpSource::new(Fetcher::new(crawl_client(policy)?, policy, DEFAULT_TIMEOUT));
//! let seed = source.resolve_feed("https://example.com/feed.xml").await?;
//! if let Some(blogroll) = seed.blogroll {
//!     let mut scores = FeedScores::new();
//!     let tree = walk(&source, blogroll, 0, 10, &mut scores).await?;
//! }
//! ```

pub mod discovery;
pub mod fetcher;
mod model;
pub mod opml;
pub mod source;

pub use discovery::{discover_blogroll, DiscoveredFeed};
pub use fetcher::{crawl_client, FetchError, Fetcher, RedirectError, DEFAULT_TIMEOUT};
pub use model::{Blogroll, FeedRef};
pub use opml::{export_opml, export_to_file, OpmlError, OpmlFeed};
pub use source::{BlogrollLoadError, HttpSource};
