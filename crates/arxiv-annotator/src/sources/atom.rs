//! Streaming Atom feed parser for arXiv API responses.
//!
//! Elements are matched by local name so the `arxiv:` and `opensearch:`
//! namespaces need no special handling. Only the fields the pipeline keeps
//! are collected.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{ClientError, ClientResult};

/// A `<link>` element of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedLink {
    /// Target URL.
    pub href: String,
    /// Link relation (`alternate`, `related`, ...).
    pub rel: Option<String>,
    /// Link label (`pdf`, `doi`, ...).
    pub title: Option<String>,
    /// Media type.
    pub media_type: Option<String>,
}

/// One `<entry>` of the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    /// Entry id (the abstract page URL on arXiv).
    pub id: String,
    /// Title text.
    pub title: String,
    /// Abstract text.
    pub summary: String,
    /// Publication timestamp as sent.
    pub published: Option<String>,
    /// `<author><name>` values in order.
    pub author_names: Vec<String>,
    /// Text placed directly inside `<author>` when no `<name>` child is given.
    pub author_text: Option<String>,
    /// `term` attributes of `<category>` elements.
    pub categories: Vec<String>,
    /// Links in document order.
    pub links: Vec<FeedLink>,
}

impl FeedEntry {
    /// URL of the `alternate` link, falling back to the entry id.
    #[must_use]
    pub fn page_url(&self) -> &str {
        self.links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .map_or(self.id.as_str(), |l| l.href.as_str())
    }
}

/// A parsed feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    /// `opensearch:totalResults`, when present.
    pub total_results: Option<u64>,
    /// Entries in document order.
    pub entries: Vec<FeedEntry>,
}

#[derive(Default)]
struct AtomParser {
    feed: Feed,
    entry: Option<FeedEntry>,
    author_name: Option<String>,
    author_text: String,
    seen_feed: bool,
    stack: Vec<String>,
}

impl AtomParser {
    fn parent(&self) -> Option<&str> {
        self.stack.len().checked_sub(2).map(|i| self.stack[i].as_str())
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, empty: bool) {
        let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        match tag.as_str() {
            "feed" => self.seen_feed = true,
            "entry" => self.entry = Some(FeedEntry::default()),
            "author" if self.entry.is_some() => {
                self.author_name = None;
                self.author_text.clear();
            }
            "link" => {
                if let Some(entry) = self.entry.as_mut() {
                    if let Some(link) = read_link(e) {
                        entry.links.push(link);
                    }
                }
            }
            "category" => {
                if let Some(entry) = self.entry.as_mut() {
                    if let Some(term) = attribute(e, b"term").filter(|t| !t.trim().is_empty()) {
                        entry.categories.push(term);
                    }
                }
            }
            _ => {}
        }

        if !empty {
            self.stack.push(tag);
        }
    }

    fn handle_text(&mut self, text: &str) {
        let Some(current) = self.stack.last().map(String::as_str) else {
            return;
        };

        if current == "totalResults" {
            self.feed.total_results = text.trim().parse().ok();
            return;
        }

        let parent = self.parent().map(str::to_owned);
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        match (current, parent.as_deref()) {
            ("id", Some("entry")) => entry.id.push_str(text),
            ("title", Some("entry")) => entry.title.push_str(text),
            ("summary", Some("entry")) => entry.summary.push_str(text),
            ("published", Some("entry")) => {
                entry.published.get_or_insert_with(String::new).push_str(text);
            }
            ("name", Some("author")) => {
                self.author_name.get_or_insert_with(String::new).push_str(text);
            }
            ("author", _) => self.author_text.push_str(text),
            _ => {}
        }
    }

    fn handle_end(&mut self) {
        let Some(tag) = self.stack.pop() else {
            return;
        };

        match tag.as_str() {
            "author" => {
                if let Some(entry) = self.entry.as_mut() {
                    let name = self.author_name.take().map(|n| n.trim().to_string());
                    match name.filter(|n| !n.is_empty()) {
                        Some(name) => entry.author_names.push(name),
                        None => {
                            let text = self.author_text.trim();
                            if !text.is_empty() && entry.author_text.is_none() {
                                entry.author_text = Some(text.to_string());
                            }
                        }
                    }
                }
            }
            "entry" => {
                if let Some(mut entry) = self.entry.take() {
                    entry.id = entry.id.trim().to_string();
                    self.feed.entries.push(entry);
                }
            }
            _ => {}
        }
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn read_link(e: &BytesStart<'_>) -> Option<FeedLink> {
    let href = attribute(e, b"href")?;
    Some(FeedLink {
        href,
        rel: attribute(e, b"rel"),
        title: attribute(e, b"title"),
        media_type: attribute(e, b"type"),
    })
}

/// Parse an Atom document into its entries.
///
/// # Errors
///
/// Returns [`ClientError::Feed`] on malformed XML, a truncated document, or a
/// document without a `<feed>` root.
pub fn parse_feed(xml: &str) -> ClientResult<Feed> {
    let mut reader = Reader::from_str(xml);
    let mut parser = AtomParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e, false),
            Ok(Event::Empty(ref e)) => parser.handle_start(e, true),
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|err| ClientError::feed(err.to_string()))?;
                parser.handle_text(&text);
            }
            Ok(Event::CData(e)) => {
                let bytes = e.into_inner();
                parser.handle_text(&String::from_utf8_lossy(&bytes));
            }
            Ok(Event::End(_)) => parser.handle_end(),
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ClientError::feed(format!(
                    "at byte {}: {err}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    if !parser.seen_feed {
        return Err(ClientError::feed("document has no <feed> element"));
    }
    if !parser.stack.is_empty() {
        return Err(ClientError::feed("document ended inside an open element"));
    }

    Ok(parser.feed)
}
