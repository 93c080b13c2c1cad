//! Content file parsing.
//!
//! Each page directory holds one line-oriented content file: a header of
//! `key: value` lines, a `content:` sentinel, then the Markdown body.
//!
//! ```text
//! # comment lines ignored
//! title: My Page Title
//! date: 2024-03-01
//! tags: foo, bar
//! template: gallery
//! content:
//! Remaining lines are Markdown body.
//! ```
//!
//! Lines starting with `#` are dropped everywhere in the file, body included.
//! Header values are the rest of the line after the key, trimmed. Everything
//! after `content:` is body, even lines that look like headers.

use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header key that starts the body.
const BODY_SENTINEL: &str = "content";

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Parsed header fields and raw Markdown body of a content file.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFile {
    /// Header fields. Always contains `template` (`"default"` unless set).
    pub fields: BTreeMap<String, String>,
    /// Raw Markdown after the `content:` line. Empty when there is none.
    pub body: String,
}

impl Default for ContentFile {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("template".to_string(), "default".to_string());
        Self {
            fields,
            body: String::new(),
        }
    }
}

/// Parse content file text into header fields and body.
pub fn parse_content(text: &str) -> ContentFile {
    let mut parsed = ContentFile::default();
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim_end)
        .collect();

    for (i, line) in lines.iter().enumerate() {
        let Some(first) = line.split_whitespace().next() else {
            continue;
        };
        if !first.ends_with(':') {
            continue;
        }
        let key = first.trim_matches(':');
        if key == BODY_SENTINEL {
            parsed.body = lines[i + 1..].join("\n");
            return parsed;
        }
        if key.is_empty() {
            continue;
        }
        let value = line.trim_start()[first.len()..].trim();
        parsed.fields.insert(key.to_string(), value.to_string());
    }
    parsed
}

/// Read and parse a content file.
///
/// A missing file is not an error: it is logged and yields the default stub
/// (empty body, `default` template). Other read failures propagate.
pub fn read_content_file(path: &Path) -> Result<ContentFile, ContentError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_content(&text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "content file not found, using empty page");
            Ok(ContentFile::default())
        }
        Err(source) => Err(ContentError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Split a comma-separated `tags` value into an ordered set of trimmed,
/// non-empty tags. Duplicates keep their first position.
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Convert a Markdown body to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}
