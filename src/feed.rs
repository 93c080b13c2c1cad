//! Atom/RSS feed output.
//!
//! The feed is assembled from two templates rather than a feed library, so
//! its markup is entirely up to the site:
//!
//! ```text
//! feed_header   rendered once with the template globals
//! feed_entry    rendered per page with its render context, newest first
//! </feed>       appended verbatim
//! ```
//!
//! Missing templates skip the feed with an error log; the rest of the build
//! is unaffected. A page whose entry fails to render is logged and left out.

use crate::page::PageUnit;
use crate::tree::ContentTree;
use chrono::NaiveDate;
use minijinja::Value;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub const HEADER_TEMPLATE: &str = "feed_header";
pub const ENTRY_TEMPLATE: &str = "feed_entry";
const FEED_CLOSE: &str = "</feed>\n";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("template error rendering feed header: {0}")]
    Header(#[source] minijinja::Error),
    #[error("IO error writing feed {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// The page's `date` as a sortable value. Empty and unparseable dates sort
/// as 1970-01-01.
pub fn sortable_date(page: &PageUnit) -> NaiveDate {
    let raw = page.date().trim();
    if raw.is_empty() {
        tracing::warn!(page = %page.html_path, "page has no date");
        return epoch();
    }
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => date,
        Err(e) => {
            tracing::error!(page = %page.html_path, date = %raw, error = %e, "unparseable date");
            epoch()
        }
    }
}

/// Real pages newest first, capped at `limit`. Equal dates keep walk order.
pub fn feed_entries(pages: &[PageUnit], limit: usize) -> Vec<&PageUnit> {
    let mut dated: Vec<(NaiveDate, &PageUnit)> =
        pages.iter().map(|p| (sortable_date(p), p)).collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.into_iter().take(limit).map(|(_, p)| p).collect()
}

/// Render the feed into `dest_root/<rss_file>`.
///
/// Returns the written path, or `None` when the feed was skipped: feed
/// templates missing, or an incremental run that changed nothing and
/// already has a feed on disk.
pub fn generate_feed(tree: &ContentTree) -> Result<Option<PathBuf>, FeedError> {
    let config = tree.config();
    let templates = tree.templates();
    if !templates.contains(HEADER_TEMPLATE) || !templates.contains(ENTRY_TEMPLATE) {
        tracing::error!("cannot generate feed: feed_header or feed_entry template not found");
        return Ok(None);
    }

    let path = config.dest_root.join(&config.rss_file);
    if config.incremental() && tree.updated.is_empty() && path.exists() {
        tracing::debug!(file = %path.display(), "nothing changed, keeping feed");
        return Ok(None);
    }

    let globals = Value::from_serialize(tree.globals());
    let mut xml = templates
        .render(HEADER_TEMPLATE, &globals)
        .map_err(FeedError::Header)?;

    for page in feed_entries(&tree.pages, config.rss_max_entries) {
        let entry = page
            .render_context(templates, config.expand_content)
            .and_then(|ctx| templates.render(ENTRY_TEMPLATE, &ctx));
        match entry {
            Ok(entry) => xml.push_str(&entry),
            Err(e) => {
                tracing::error!(page = %page.html_path, error = %e, "skipping feed entry");
            }
        }
    }
    xml.push_str(FEED_CLOSE);

    let io_err = |source: io::Error| FeedError::Io {
        path: path.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(&path, xml).map_err(io_err)?;
    tracing::info!(file = %path.display(), "wrote feed");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::test_helpers::capture_logs;
    use crate::templates::TemplateSet;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_page(root: &Path, rel: &str, text: &str) {
        let dir = root.join("content").join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.md"), text).unwrap();
    }

    fn feed_tree(tmp: &Path, templates: TemplateSet, max: usize) -> ContentTree {
        let config = SiteConfig {
            src_root: tmp.join("content"),
            dest_root: tmp.join("dist"),
            rss_max_entries: max,
            ..SiteConfig::default()
        };
        let mut tree = ContentTree::with_templates(config, templates);
        tree.walk().unwrap();
        tree.link().unwrap();
        tree
    }

    fn feed_templates() -> TemplateSet {
        TemplateSet::from_sources([
            ("leaf", "{{ title }}"),
            ("feed_header", "<feed host=\"{{ hostname }}\">\n"),
            ("feed_entry", "<entry>{{ title }}</entry>\n"),
        ])
    }

    #[test]
    fn entries_newest_first() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.old", "title: Old\ndate: 2024-01-01");
        write_page(tmp.path(), "2.new", "title: New\ndate: 2024-03-01");
        let tree = feed_tree(tmp.path(), feed_templates(), 20);

        let path = generate_feed(&tree).unwrap().unwrap();
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "<feed host=\"localhost\">\n<entry>New</entry>\n<entry>Old</entry>\n</feed>\n"
        );
    }

    #[test]
    fn bad_date_sorts_as_epoch() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.broken", "title: Broken\ndate: not-a-date");
        write_page(tmp.path(), "2.dated", "title: Dated\ndate: 2024-01-01");
        let tree = feed_tree(tmp.path(), feed_templates(), 20);

        assert_eq!(sortable_date(&tree.pages[0]), epoch());
        let path = generate_feed(&tree).unwrap().unwrap();
        let xml = fs::read_to_string(path).unwrap();
        assert!(xml.find("Dated").unwrap() < xml.find("Broken").unwrap());
    }

    #[test]
    fn date_problems_are_logged() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.broken", "title: Broken\ndate: 2024-13-45");
        write_page(tmp.path(), "2.blank", "title: Blank\ndate:");
        let tree = feed_tree(tmp.path(), feed_templates(), 20);

        let logs = capture_logs(|| sortable_date(&tree.pages[0]));
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("unparseable date"), "{logs}");
        assert!(logs.contains("2024-13-45"), "{logs}");

        let logs = capture_logs(|| sortable_date(&tree.pages[1]));
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("page has no date"), "{logs}");
        assert!(!logs.contains("ERROR"), "{logs}");
    }

    #[test]
    fn entry_body_is_expanded() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "title: A\ncontent:\nat {{ html_path }}");
        let templates = TemplateSet::from_sources([
            ("leaf", "{{ content_html }}"),
            ("feed_header", "<feed>\n"),
            ("feed_entry", "<entry>{{ content_html }}</entry>\n"),
        ]);
        let tree = feed_tree(tmp.path(), templates, 20);

        let xml = fs::read_to_string(generate_feed(&tree).unwrap().unwrap()).unwrap();
        assert!(xml.contains("<entry><p>at /a/</p>"), "{xml}");
        assert!(!xml.contains("{{"), "{xml}");
    }

    #[test]
    fn capped_at_max_entries() {
        let tmp = TempDir::new().unwrap();
        for day in 1..=5 {
            write_page(
                tmp.path(),
                &format!("{day}.p{day}"),
                &format!("title: P{day}\ndate: 2024-01-0{day}"),
            );
        }
        let tree = feed_tree(tmp.path(), feed_templates(), 2);
        let titles: Vec<&str> = feed_entries(&tree.pages, 2).iter().map(|p| p.title()).collect();
        assert_eq!(titles, vec!["P5", "P4"]);

        let xml = fs::read_to_string(generate_feed(&tree).unwrap().unwrap()).unwrap();
        assert_eq!(xml.matches("<entry>").count(), 2);
    }

    #[test]
    fn missing_templates_skip_feed() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "title: A");
        let tree = feed_tree(tmp.path(), TemplateSet::from_sources([("leaf", "x")]), 20);
        assert!(generate_feed(&tree).unwrap().is_none());
        assert!(!tmp.path().join("dist/feed.rss").exists());
    }

    #[test]
    fn broken_entry_is_skipped() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "title: A\nsummary: yes");
        write_page(tmp.path(), "2.b", "title: B");
        let templates = TemplateSet::from_sources([
            ("leaf", "x"),
            ("feed_header", "<feed>"),
            ("feed_entry", "<entry>{{ summary }}</entry>"),
        ]);
        let tree = feed_tree(tmp.path(), templates, 20);
        let xml = fs::read_to_string(generate_feed(&tree).unwrap().unwrap()).unwrap();
        assert_eq!(xml, "<feed><entry>yes</entry></feed>\n");
    }
}
