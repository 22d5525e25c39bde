use super::opml::{parse_opml_content, OpmlError, OpmlFeed};

/// A parsed blogroll: an OPML document listing recommended feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Blogroll {
    /// Where the document was fetched from.
    pub url: String,
    /// Every feed outline in document order, duplicates included.
    pub feeds: Vec<OpmlFeed>,
}

impl Blogroll {
    pub fn new(url: impl Into<String>, feeds: Vec<OpmlFeed>) -> Self {
        Self {
            url: url.into(),
            feeds,
        }
    }

    pub fn from_opml(url: impl Into<String>, content: &str) -> Result<Self, OpmlError> {
        Ok(Self::new(url, parse_opml_content(content)?))
    }

    pub fn feed_urls(&self) -> impl Iterator<Item = &str> {
        self.feeds.iter().map(|f| f.xml_url.as_str())
    }
}

/// A resolved feed. The blogroll link is fixed at resolution time and never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRef {
    pub url: String,
    pub title: Option<String>,
    pub blogroll: Option<Blogroll>,
}

impl FeedRef {
    /// A feed that advertises no blogroll.
    pub fn leaf(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            blogroll: None,
        }
    }

    pub fn with_blogroll(url: impl Into<String>, blogroll: Blogroll) -> Self {
        Self {
            url: url.into(),
            title: None,
            blogroll: Some(blogroll),
        }
    }
}
