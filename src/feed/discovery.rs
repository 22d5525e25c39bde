use super::fetcher::Fetcher;
use crate::util::{clean_title, origin_of, resolve_url};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

/// Namespace of the `source:blogroll` channel element.
pub const SOURCE_NAMESPACE: &str = "http://source.scripting.com/";

/// What resolving a feed URL found out about it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredFeed {
    /// Feed title, if the feed parsed and had one.
    pub title: Option<String>,
    /// Absolute URL of the feed's blogroll, if one is advertised.
    pub blogroll_url: Option<String>,
}

/// Looks for the blogroll a feed advertises.
///
/// Tried in order, first hit wins:
///
/// 1. a channel-level `<source:blogroll>` element in the feed itself
/// 2. a `<link rel="blogroll">` in the HTML served at the feed's origin
///
/// Relative references are resolved against the feed URL (1) or the
/// origin (2). Nothing here fails: an unreachable feed, an unparsable feed,
/// a non-2xx origin page or a network error all mean "no blogroll".
pub async fn discover_blogroll(fetcher: &Fetcher, feed_url: &str) -> DiscoveredFeed {
    tracing::info!(url = %feed_url, "Checking feed for blogroll link");
    let mut discovered = DiscoveredFeed::default();

    match fetcher.get(feed_url).await {
        Ok(bytes) => match feed_rs::parser::parse(bytes.as_slice()) {
            Ok(feed) => {
                discovered.title = feed
                    .title
                    .map(|t| clean_title(&t.content))
                    .filter(|t| !t.is_empty());

                if let Some(href) = find_blogroll_in_feed(&bytes) {
                    let blogroll_url = resolve_url(&href, feed_url);
                    tracing::debug!(url = %feed_url, blogroll = %blogroll_url, "Blogroll declared in feed");
                    discovered.blogroll_url = Some(blogroll_url);
                    return discovered;
                }
            }
            Err(e) => {
                tracing::debug!(url = %feed_url, error = %e, "Not a parsable RSS/Atom feed");
            }
        },
        Err(e) => {
            tracing::debug!(url = %feed_url, error = %e, "Failed to fetch feed");
        }
    }

    let Some(origin) = url::Url::parse(feed_url).ok().as_ref().and_then(origin_of) else {
        tracing::debug!(url = %feed_url, "Feed URL has no origin to check for a blogroll link");
        return discovered;
    };

    tracing::info!(origin = %origin, "Blogroll not in feed, checking HTML link tags");
    match fetcher.get(&origin).await {
        Ok(bytes) => {
            let html = String::from_utf8_lossy(&bytes);
            discovered.blogroll_url = find_blogroll_link_in_html(&html, &origin);
            if discovered.blogroll_url.is_none() {
                tracing::info!(origin = %origin, "No blogroll found");
            }
        }
        Err(e) => {
            tracing::info!(origin = %origin, error = %e, "No blogroll found");
        }
    }

    discovered
}

/// Extracts the text of the channel-level `source:blogroll` element.
///
/// The element counts when it is bound to [`SOURCE_NAMESPACE`] under any
/// prefix, or written literally as `source:blogroll` with the prefix left
/// undeclared. Elements inside `<item>`/`<entry>` are ignored.
pub fn find_blogroll_in_feed(bytes: &[u8]) -> Option<String> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entry_depth: usize = 0;
    let mut capture: Option<String> = None;

    loop {
        let (ns, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped scanning feed XML");
                return None;
            }
        };

        match event {
            Event::Start(e) => {
                let local = e.local_name();
                if matches!(local.as_ref(), b"item" | b"entry") {
                    entry_depth += 1;
                } else if entry_depth == 0
                    && capture.is_none()
                    && is_blogroll_element(&ns, local.as_ref(), e.name().as_ref())
                {
                    capture = Some(String::new());
                }
            }
            Event::Text(t) => {
                if let Some(text) = capture.as_mut() {
                    match t.unescape() {
                        Ok(value) => text.push_str(&value),
                        Err(e) => {
                            tracing::debug!(error = %e, "Ignoring undecodable blogroll text");
                        }
                    }
                }
            }
            Event::CData(c) => {
                if let Some(text) = capture.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                if matches!(local.as_ref(), b"item" | b"entry") {
                    entry_depth = entry_depth.saturating_sub(1);
                } else if local.as_ref() == b"blogroll" {
                    if let Some(text) = capture.take() {
                        let href = text.trim();
                        if !href.is_empty() {
                            return Some(href.to_owned());
                        }
                    }
                }
            }
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn is_blogroll_element(ns: &ResolveResult<'_>, local: &[u8], qname: &[u8]) -> bool {
    if local != b"blogroll" {
        return false;
    }
    match ns {
        ResolveResult::Bound(Namespace(uri)) => *uri == SOURCE_NAMESPACE.as_bytes(),
        _ => qname == b"source:blogroll",
    }
}

/// Scans HTML for the first `<link>` whose `rel` includes `blogroll`.
///
/// Uses simple string scanning (no HTML parser dependency). `rel` is treated
/// as a space-separated token list, so `rel="blogroll me"` matches. The
/// returned URL is resolved against `base_url`.
pub fn find_blogroll_link_in_html(html: &str, base_url: &str) -> Option<String> {
    let html_lower = html.to_ascii_lowercase();
    let mut search_from = 0;

    while let Some(link_start) = html_lower[search_from..].find("<link") {
        let abs_start = search_from + link_start;
        let remaining = &html_lower[abs_start..];

        let tag_end = find_tag_end(remaining)?;

        // `<linkfoo>` is not a link tag
        let after_name = remaining.as_bytes().get("<link".len()).copied();
        let is_link_tag = matches!(after_name, Some(b' ' | b'\t' | b'\n' | b'\r' | b'/'));

        if is_link_tag {
            // Slice the original HTML to preserve the href's case
            let tag = &html[abs_start..=abs_start + tag_end];
            let is_blogroll = extract_attr_value(tag, "rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("blogroll"))
            });
            if is_blogroll {
                if let Some(href) = extract_attr_value(tag, "href").filter(|h| !h.is_empty()) {
                    return Some(resolve_url(href, base_url));
                }
            }
        }

        search_from = abs_start + tag_end + 1;
    }

    None
}

/// Byte offset of the `>` closing the tag that starts `tag`, ignoring any
/// `>` inside quoted attribute values (`title="a>b"`).
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, b) in tag.bytes().enumerate() {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Extracts an attribute value from a tag string (case-preserving).
///
/// Accepts double-quoted, single-quoted and unquoted values. The attribute
/// name must be preceded by whitespace so `data-rel` does not match `rel`.
fn extract_attr_value<'a>(tag: &'a str, attr_name: &str) -> Option<&'a str> {
    let tag_lower = tag.to_ascii_lowercase();
    let bytes = tag_lower.as_bytes();
    let mut from = 0;

    while let Some(pos) = tag_lower[from..].find(attr_name) {
        let start = from + pos;
        from = start + attr_name.len();

        let preceded_by_space = start > 0 && bytes[start - 1].is_ascii_whitespace();
        if !preceded_by_space {
            continue;
        }

        let rest = tag[from..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();

        return match rest.as_bytes().first()? {
            quote @ (b'"' | b'\'') => {
                let inner = &rest[1..];
                let end = inner.find(*quote as char)?;
                Some(inner[..end].trim())
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                Some(rest[..end].trim_end_matches('/'))
            }
        };
    }

    None
}
