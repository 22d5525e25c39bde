use super::discovery::discover_blogroll;
use super::fetcher::{FetchError, Fetcher};
use super::model::{Blogroll, FeedRef};
use super::opml::OpmlError;
use crate::walk::BlogrollSource;
use thiserror::Error;

/// Loading a blogroll document failed. Unlike discovery, this is not
/// downgraded to "absent": it aborts the traversal that needed it.
#[derive(Debug, Error)]
pub enum BlogrollLoadError {
    #[error("failed to fetch blogroll {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to parse blogroll {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: OpmlError,
    },
}

impl BlogrollLoadError {
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch { url, .. } | Self::Parse { url, .. } => url,
        }
    }
}

/// Resolves feeds and loads blogrolls over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    fetcher: Fetcher,
}

impl HttpSource {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches and parses the OPML document at `blogroll_url`.
    pub async fn load_blogroll(&self, blogroll_url: &str) -> Result<Blogroll, BlogrollLoadError> {
        let bytes = self
            .fetcher
            .get(blogroll_url)
            .await
            .map_err(|source| BlogrollLoadError::Fetch {
                url: blogroll_url.to_owned(),
                source,
            })?;

        let content = String::from_utf8_lossy(&bytes);
        let blogroll =
            Blogroll::from_opml(blogroll_url, &content).map_err(|source| BlogrollLoadError::Parse {
                url: blogroll_url.to_owned(),
                source,
            })?;

        tracing::debug!(url = %blogroll_url, feeds = blogroll.feeds.len(), "Loaded blogroll");
        Ok(blogroll)
    }
}

impl BlogrollSource for HttpSource {
    async fn resolve_feed(&self, feed_url: &str) -> Result<FeedRef, BlogrollLoadError> {
        let discovered = discover_blogroll(&self.fetcher, feed_url).await;

        let blogroll = match discovered.blogroll_url {
            Some(ref blogroll_url) => Some(self.load_blogroll(blogroll_url).await?),
            None => None,
        };

        Ok(FeedRef {
            url: feed_url.to_owned(),
            title: discovered.title,
            blogroll,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::fetcher::DEFAULT_TIMEOUT;
    use crate::util::UrlPolicy;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_source() -> HttpSource {
        HttpSource::new(Fetcher::new(
            reqwest::Client::new(),
            UrlPolicy {
                allow_private_hosts: true,
            },
            DEFAULT_TIMEOUT,
        ))
    }

    #[tokio::test]
    async fn test_load_blogroll_lists_feeds_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roll.opml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<opml version="2.0"><body>
                    <outline xmlUrl="https://b.example/feed"/>
                    <outline xmlUrl="https://a.example/feed"/>
                </body></opml>"#,
            ))
            .mount(&server)
            .await;

        let url = format!("{}/roll.opml", server.uri());
        let blogroll = local_source().load_blogroll(&url).await.unwrap();

        assert_eq!(blogroll.url, url);
        assert_eq!(
            blogroll.feed_urls().collect::<Vec<_>>(),
            vec!["https://b.example/feed", "https://a.example/feed"]
        );
    }

    #[tokio::test]
    async fn test_load_unreachable_blogroll_is_error() {
        let server = MockServer::start().await;
        let url = format!("{}/missing.opml", server.uri());

        let err = local_source().load_blogroll(&url).await.unwrap_err();
        assert!(matches!(
            err,
            BlogrollLoadError::Fetch {
                source: FetchError::HttpStatus(404),
                ..
            }
        ));
        assert_eq!(err.url(), url);
    }

    #[tokio::test]
    async fn test_load_malformed_blogroll_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = local_source()
            .load_blogroll(&format!("{}/roll.opml", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogrollLoadError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_resolve_feed_without_blogroll() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0"><channel><title>Lonely</title></channel></rss>"#,
            ))
            .mount(&server)
            .await;

        let url = format!("{}/feed.xml", server.uri());
        let feed = local_source().resolve_feed(&url).await.unwrap();

        assert_eq!(feed.url, url);
        assert_eq!(feed.title.as_deref(), Some("Lonely"));
        assert!(feed.blogroll.is_none());
    }

    #[tokio::test]
    async fn test_resolve_feed_with_broken_blogroll_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0" xmlns:source="http://source.scripting.com/"><channel>
                    <title>Broken</title><source:blogroll>/roll.opml</source:blogroll>
                </channel></rss>"#,
            ))
            .mount(&server)
            .await;

        let result = local_source()
            .resolve_feed(&format!("{}/feed.xml", server.uri()))
            .await;
        assert!(matches!(result, Err(BlogrollLoadError::Fetch { .. })));
    }
}
