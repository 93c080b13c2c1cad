//! Centralized parsing for the `<int>.<slug>` directory convention.
//!
//! Every content directory is named with a numeric ordering prefix followed
//! by a dot and a slug: `3.spring-trip`. The number orders siblings, the slug
//! becomes the URL segment. This module turns those names into URL paths:
//!
//! ```text
//! 1.journal/2.spring-trip        →  journal/spring-trip/
//! html_root = "/blog/"           →  /blog/journal/spring-trip/
//! ```
//!
//! Segments without a numeric prefix (`drafts`, `templates`, `img`) are not
//! pages. When they appear in the middle of a path they contribute nothing to
//! the URL, so `archive/4.old-post` publishes as `old-post/`.

use std::cmp::Ordering;

/// Result of parsing a numbered segment like `2.spring-trip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedName {
    /// Ordering prefix (`2` from `2.spring-trip`).
    pub index: u32,
    /// URL segment (`spring-trip`).
    pub slug: String,
}

/// Parse a single path segment following the `<int>.<slug>` convention.
///
/// - `"2.spring-trip"` → index=2, slug="spring-trip"
/// - `"0.blog-source"` → index=0, slug="blog-source"
/// - `"3.notes.old"` → index=3, slug="notes" (only the field after the first dot)
/// - `"drafts"`, `"x.drafts"`, `"3."` → `None`
pub fn parse_segment(name: &str) -> Option<NumberedName> {
    let mut fields = name.split('.');
    let index = fields.next()?.parse::<u32>().ok()?;
    let slug = fields.next()?;
    if slug.is_empty() {
        return None;
    }
    Some(NumberedName {
        index,
        slug: slug.to_string(),
    })
}

/// Ensure a URL prefix ends with exactly one trailing `/`.
pub fn with_trailing_slash(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

/// Relative URL path for a source path relative to the content root.
///
/// Numbered segments contribute their slug, unnumbered ones are dropped.
/// The result is either empty or ends with `/`.
///
/// ```text
/// 1.journal/2.spring-trip  →  "journal/spring-trip/"
/// archive/4.old-post       →  "old-post/"
/// ""                       →  ""
/// ```
pub fn html_rel_path(rel_path: &std::path::Path) -> String {
    let mut out = String::new();
    for component in rel_path.components() {
        let name = component.as_os_str().to_string_lossy();
        if let Some(parsed) = parse_segment(&name) {
            out.push_str(&parsed.slug);
            out.push('/');
        }
    }
    out
}

/// Every ancestor URL of a relative HTML path, outermost first, ending with
/// the path itself.
///
/// `("/blog/", "journal/spring-trip/")` →
/// `["/blog/journal/", "/blog/journal/spring-trip/"]`
pub fn breadcrumb_paths(html_root: &str, html_rel: &str) -> Vec<String> {
    let mut current = with_trailing_slash(html_root);
    html_rel
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|slug| {
            current.push_str(slug);
            current.push('/');
            current.clone()
        })
        .collect()
}

/// URL-escape a tag name for use as a path segment.
///
/// Form-style escaping: spaces become `+`, everything outside the
/// unreserved set is percent-encoded (`"rust & c"` → `"rust+%26+c"`).
/// Dots are unreserved, so a tag made only of dots (`..`) has them encoded
/// too; it must stay a directory under `tags/`.
pub fn tag_slug(tag: &str) -> String {
    if !tag.is_empty() && tag.chars().all(|c| c == '.') {
        return tag.replace('.', "%2E");
    }
    urlencoding::encode(tag).replace("%20", "+")
}

/// Tag ordering: case-insensitive, raw name as the tie-break.
pub fn tag_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
