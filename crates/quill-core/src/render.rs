//! Markdown rendering
//!
//! The index only talks to the `Renderer` trait. `MarkdownRenderer` is the
//! default implementation: pulldown-cmark plus a generated table of contents
//! placed in front of the body, which `extract_header` splits off again.

use std::sync::LazyLock;

use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use pulldown_cmark_escape::escape_html;
use regex::Regex;
use thiserror::Error;

use crate::models::Derived;

/// Closing markup of the generated table of contents
pub const HEADER_MARKER: &str = "</nav></div>";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Errors that can occur while rendering
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Markdown rendering failed: {0}")]
    Markdown(String),

    #[error("Invalid excerpt marker '{pattern}': {source}")]
    InvalidMarker {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Converts markdown to HTML and carves derived fields out of it
pub trait Renderer: Send + Sync {
    /// Render markdown to HTML
    fn to_html(&self, markdown: &str) -> Result<String, RenderError>;

    /// Split rendered HTML into (table of contents, remainder)
    fn extract_header<'a>(&self, html: &'a str) -> (Option<&'a str>, &'a str) {
        match html.find(HEADER_MARKER) {
            Some(pos) => {
                let end = pos + HEADER_MARKER.len();
                (Some(&html[..end]), &html[end..])
            }
            None => (None, html),
        }
    }

    /// Plain-text excerpt: everything before `marker`, or the first
    /// `fallback_len` characters when the marker is absent
    fn truncate_to_excerpt(&self, html: &str, marker: &Regex, fallback_len: usize) -> String {
        match marker.find(html) {
            Some(m) => strip_tags(&html[..m.start()]),
            None => strip_tags(html).chars().take(fallback_len).collect(),
        }
    }
}

/// Rules for computing `Derived` fields
#[derive(Debug, Clone)]
pub struct ExcerptRules {
    pub marker: Regex,
    pub length: usize,
    pub description_prefix: String,
}

impl ExcerptRules {
    pub fn new(
        marker: &str,
        length: usize,
        description_prefix: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let marker = Regex::new(marker).map_err(|source| RenderError::InvalidMarker {
            pattern: marker.to_string(),
            source,
        })?;
        Ok(Self {
            marker,
            length,
            description_prefix: description_prefix.into(),
        })
    }
}

/// Compute description, header, body and excerpt for an article's content
pub fn derive_fields(
    renderer: &dyn Renderer,
    content: &str,
    rules: &ExcerptRules,
) -> Result<Derived, RenderError> {
    let (description, body) = split_description(content, &rules.description_prefix);
    let rendered = renderer.to_html(body)?;
    let (header, html) = renderer.extract_header(&rendered);
    let excerpt = renderer.truncate_to_excerpt(html, &rules.marker, rules.length);

    Ok(Derived {
        description,
        header: header.map(str::to_string),
        html: html.to_string(),
        excerpt,
    })
}

/// Split a leading `prefix` line off the content
///
/// Returns the stripped description and the remaining markdown.
pub fn split_description<'a>(content: &'a str, prefix: &str) -> (Option<String>, &'a str) {
    if prefix.is_empty() {
        return (None, content);
    }
    let Some(rest) = content.strip_prefix(prefix) else {
        return (None, content);
    };

    let (line, body) = match rest.find('\n') {
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => (rest, ""),
    };
    let description = strip_tags(line.trim_end_matches('\r'));
    (Some(description), body)
}

/// Remove HTML tags and collapse whitespace
pub fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, "");
    SPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// pulldown-cmark renderer with a generated table of contents
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
    /// Deepest heading level listed in the table of contents
    toc_depth: HeadingLevel,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options.insert(Options::ENABLE_DEFINITION_LIST);
        Self {
            options,
            toc_depth: HeadingLevel::H3,
        }
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render without a table of contents
    pub fn render_body(&self, markdown: &str) -> String {
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, self.options));
        out
    }
}

struct TocEntry {
    level: HeadingLevel,
    id: String,
    text: String,
}

impl Renderer for MarkdownRenderer {
    fn to_html(&self, markdown: &str) -> Result<String, RenderError> {
        let mut events: Vec<Event> = Parser::new_ext(markdown, self.options).collect();
        let mut toc = Vec::new();
        let mut open: Option<usize> = None;

        // Give every listed heading an anchor and remember its text
        for i in 0..events.len() {
            match &mut events[i] {
                Event::Start(Tag::Heading { level, id, .. }) => {
                    if *level < HeadingLevel::H2 || *level > self.toc_depth {
                        continue;
                    }
                    let anchor = match id {
                        Some(existing) => existing.to_string(),
                        None => {
                            let generated = format!("toc-{}", toc.len());
                            *id = Some(CowStr::from(generated.clone()));
                            generated
                        }
                    };
                    toc.push(TocEntry {
                        level: *level,
                        id: anchor,
                        text: String::new(),
                    });
                    open = Some(toc.len() - 1);
                }
                Event::End(TagEnd::Heading(_)) => open = None,
                Event::Text(text) | Event::Code(text) => {
                    if let Some(entry) = open.and_then(|idx| toc.get_mut(idx)) {
                        entry.text.push_str(text);
                    }
                }
                _ => {}
            }
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        if !toc.is_empty() {
            out.push_str("<div class=\"toc\"><nav><ul>");
            for entry in &toc {
                let depth = if entry.level == HeadingLevel::H2 { 2 } else { 3 };
                out.push_str(&format!("<li class=\"toc-h{}\"><a href=\"#", depth));
                escape_html(&mut out, &entry.id).map_err(toc_error)?;
                out.push_str("\">");
                escape_html(&mut out, &entry.text).map_err(toc_error)?;
                out.push_str("</a></li>");
            }
            out.push_str("</ul>");
            out.push_str(HEADER_MARKER);
            out.push('\n');
        }

        html::push_html(&mut out, events.into_iter());
        Ok(out)
    }
}

fn toc_error(err: std::fmt::Error) -> RenderError {
    RenderError::Markdown(format!("failed to write table of contents: {}", err))
}
