use crate::util::clean_title;
use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
/// Prevents stack overflow attacks from maliciously crafted deeply nested OPMLs.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur during OPML parsing.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Document parsed but has no `<opml>` root.
    #[error("not an OPML document")]
    NotOpml,
}

/// A feed subscription listed in an OPML document.
///
/// Represents a single `<outline>` element with a non-empty `xmlUrl` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct OpmlFeed {
    /// `title` attribute, falling back to `text`, with control characters removed.
    pub title: Option<String>,
    /// URL of the RSS/Atom feed, exactly as written in the document.
    pub xml_url: String,
}

/// Parses OPML content and returns every feed outline in document order.
///
/// Nested and flat structures are both accepted; category/folder outlines
/// (those without `xmlUrl`) are traversed but not returned. Duplicate URLs
/// are kept. URLs are not validated here: whether a listed feed may be
/// fetched is decided by the fetch layer.
pub fn parse_opml_content(content: &str) -> Result<Vec<OpmlFeed>, OpmlError> {
    // SEC-002: quick-xml (0.37) never parses <!ENTITY> declarations from DOCTYPE.
    // `decode_and_unescape_value()` only resolves the 5 XML builtins; custom
    // entities like &xxe; produce `EscapeError::UnrecognizedEntity`.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut buf = Vec::new();
    let mut saw_root = false;
    // SEC-003: Track nesting depth to prevent stack overflow from malicious OPMLs
    let mut depth: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"opml" => saw_root = true,
            Ok(Event::Empty(e)) if e.name().as_ref() == b"opml" => saw_root = true,
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                if let Some(feed) = parse_outline_attributes(&e, &reader)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                // Self-closing outline doesn't affect depth
                if let Some(feed) = parse_outline_attributes(&e, &reader)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(OpmlError::NotOpml);
    }

    Ok(feeds)
}

/// Returns `Some(OpmlFeed)` for outlines with a non-empty `xmlUrl`,
/// `None` for category/folder outlines.
fn parse_outline_attributes(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<OpmlFeed>, OpmlError> {
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = || {
            attr.decode_and_unescape_value(reader.decoder())
                .map(|v| v.trim().to_string())
                .map_err(|e| OpmlError::XmlParse(e.to_string()))
        };
        match attr.key.as_ref() {
            b"xmlUrl" => xml_url = Some(value()?),
            b"title" => title = Some(value()?),
            b"text" => text = Some(value()?),
            _ => {}
        }
    }

    Ok(xml_url.filter(|url| !url.is_empty()).map(|xml_url| OpmlFeed {
        title: title
            .into_iter()
            .chain(text)
            .map(|t| clean_title(&t))
            .find(|t| !t.is_empty()),
        xml_url,
    }))
}

/// Exports feeds as an OPML 2.0 document titled `title`.
///
/// Outlines carry `type="rss"`, `text`, `title` (falling back to the URL) and `xmlUrl`.
pub fn export_opml(title: &str, feeds: &[OpmlFeed]) -> Result<String> {
    use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText};
    use quick_xml::Writer;
    use std::io::Cursor;

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    writer
        .write_event(Event::Start(opml))
        .context("Failed to write opml element")?;

    writer
        .write_event(Event::Start(BytesStart::new("head")))
        .context("Failed to write head element")?;
    writer
        .write_event(Event::Start(BytesStart::new("title")))
        .context("Failed to write title element")?;
    writer
        .write_event(Event::Text(BytesText::new(title)))
        .context("Failed to write title text")?;
    writer
        .write_event(Event::End(BytesEnd::new("title")))
        .context("Failed to write title end")?;
    writer
        .write_event(Event::End(BytesEnd::new("head")))
        .context("Failed to write head end")?;

    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .context("Failed to write body element")?;

    for feed in feeds {
        let label = feed.title.as_deref().unwrap_or(&feed.xml_url);
        let mut outline = BytesStart::new("outline");
        outline.push_attribute(("type", "rss"));
        outline.push_attribute(("text", label));
        outline.push_attribute(("title", label));
        outline.push_attribute(("xmlUrl", feed.xml_url.as_str()));
        writer
            .write_event(Event::Empty(outline))
            .context("Failed to write outline element")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .context("Failed to write body end")?;
    writer
        .write_event(Event::End(BytesEnd::new("opml")))
        .context("Failed to write opml end")?;

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).context("Generated OPML contains invalid UTF-8")
}

/// Writes an OPML document to `path` atomically (temp file, sync, rename).
pub fn export_to_file(title: &str, feeds: &[OpmlFeed], path: &std::path::Path) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let content = export_opml(title, feeds)?;

    // SEC-009: Randomized temp filename to prevent TOCTOU race conditions
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    std::io::Write::write_all(&mut file, content.as_bytes()).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write OPML to temporary file '{}'",
            temp_path.display()
        )
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    drop(file);

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
