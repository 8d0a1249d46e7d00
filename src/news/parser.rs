//! Streaming RSS/Atom item extraction
//!
//! Feeds are parsed event-by-event with quick-xml; the whole document is
//! never materialized as a DOM. Items missing a link or a parseable publish
//! date are dropped silently - a half-broken feed still contributes its
//! good items. A malformed document simply yields whatever items were
//! complete before the error.

use crate::types::NewsArticle;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Partially assembled item, finalized when its closing tag arrives
#[derive(Debug, Default)]
struct ItemDraft {
    title: String,
    link: String,
    description: String,
    date_raw: String,
    image_url: Option<String>,
}

impl ItemDraft {
    fn finalize(self, source: &str) -> Option<NewsArticle> {
        let url = self.link.trim().to_string();
        if url.is_empty() {
            return None;
        }
        let published_at = parse_date(self.date_raw.trim())?;

        let description = normalize_text(&self.description);
        let image_url = self
            .image_url
            .or_else(|| first_img_src(&self.description));

        Some(NewsArticle {
            title: normalize_text(&self.title).unwrap_or_default(),
            description,
            url,
            image_url,
            published_at,
            source: source.to_string(),
        })
    }
}

/// Parses one feed document into articles, attributing them to `source`
pub fn parse_feed(xml: &str, source: &str) -> Vec<NewsArticle> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();
    let mut draft: Option<ItemDraft> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                match name.as_str() {
                    "item" | "entry" => draft = Some(ItemDraft::default()),
                    _ if draft.is_some() => {
                        field = Field::for_tag(&name);
                        // Atom links carry the URL as an attribute
                        if name == "link" {
                            if let Some(href) = attribute(e, "href") {
                                if let Some(d) = draft.as_mut() {
                                    if d.link.is_empty() {
                                        d.link = href;
                                    }
                                }
                            }
                        }
                        apply_media_tag(e, &name, draft.as_mut());
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if draft.is_some() {
                    let name = local_name(e);
                    if name == "link" {
                        if let Some(href) = attribute(e, "href") {
                            if let Some(d) = draft.as_mut() {
                                if d.link.is_empty() {
                                    d.link = href;
                                }
                            }
                        }
                    }
                    apply_media_tag(e, &name, draft.as_mut());
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "item" || name == "entry" {
                    if let Some(article) = draft.take().and_then(|d| d.finalize(source)) {
                        articles.push(article);
                    }
                }
                field = None;
            }
            Ok(Event::Text(ref t)) => {
                if let (Some(d), Some(f)) = (draft.as_mut(), field) {
                    if let Ok(text) = t.unescape() {
                        f.append(d, &text);
                    }
                }
            }
            Ok(Event::CData(ref t)) => {
                if let (Some(d), Some(f)) = (draft.as_mut(), field) {
                    let text = String::from_utf8_lossy(t.as_ref()).to_string();
                    f.append(d, &text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(source, error = %e, "Feed parse aborted, keeping completed items");
                break;
            }
        }
    }

    articles
}

/// Item fields that accumulate character data
#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    Date,
}

impl Field {
    fn for_tag(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "link" => Some(Self::Link),
            "description" | "summary" => Some(Self::Description),
            "pubDate" | "published" | "updated" | "date" => Some(Self::Date),
            _ => None,
        }
    }

    fn append(self, draft: &mut ItemDraft, text: &str) {
        match self {
            Self::Title => draft.title.push_str(text),
            Self::Link => draft.link.push_str(text),
            Self::Description => draft.description.push_str(text),
            Self::Date => draft.date_raw.push_str(text),
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.local_name().as_ref() == key.as_bytes() {
            attr.unescape_value().ok().map(|v| v.to_string())
        } else {
            None
        }
    })
}

/// Captures an explicit image from `<enclosure>` or `media:content` /
/// `media:thumbnail` tags. An already captured image is never replaced, so
/// the explicit tag wins over anything found later.
fn apply_media_tag(e: &BytesStart<'_>, name: &str, draft: Option<&mut ItemDraft>) {
    let Some(draft) = draft else { return };
    if draft.image_url.is_some() {
        return;
    }

    match name {
        "enclosure" => {
            let is_image = attribute(e, "type").is_none_or(|t| t.starts_with("image/"));
            if is_image {
                draft.image_url = attribute(e, "url");
            }
        }
        "content" | "thumbnail" => {
            // media:content / media:thumbnail
            draft.image_url = attribute(e, "url");
        }
        _ => {}
    }
}

/// RSS dates are RFC 2822; Atom dates are RFC 3339. Anything else is
/// unparseable and drops the item.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Trims and strips markup remnants; empty results become `None`
fn normalize_text(raw: &str) -> Option<String> {
    let stripped = strip_tags(raw);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Removes HTML tags from description markup, keeping the text content
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// First `<img src="...">` URL inside description markup
fn first_img_src(html: &str) -> Option<String> {
    let img_at = html.find("<img")?;
    let rest = &html[img_at..];
    let tag_end = rest.find('>')?;
    let tag = &rest[..tag_end];

    let src_at = tag.find("src=")?;
    let after = &tag[src_at + 4..];
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let inner = &after[1..];
    let close = inner.find(quote)?;
    Some(inner[..close].to_string())
}
