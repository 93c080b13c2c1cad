//! Shared test utilities for the stacey test suite.
//!
//! Provides fixture setup and lookup helpers that work with a linked
//! [`ContentTree`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let tree = linked_fixture_tree(tmp.path());
//!
//! let winter = find_page(&tree, "/blog/journal/winter/");
//! assert_eq!(winter.title(), "Winter");
//! assert_eq!(page_titles(&tree, &winter.parents), vec!["Journal", "Winter"]);
//! ```

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::config::{self, RunInfo, SiteConfig};
use crate::page::{PageId, PageUnit};
use crate::tree::ContentTree;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Load the fixture's `config.toml` with fixed run values.
pub fn fixture_config(root: &Path, incremental: bool) -> SiteConfig {
    config::load_config(&root.join("config.toml"))
        .unwrap()
        .with_run(RunInfo {
            incremental,
            update_time: "2024-06-01T12:00:00".into(),
            render_year: "2024".into(),
        })
}

/// Walk and link the fixture site.
pub fn linked_fixture_tree(root: &Path) -> ContentTree {
    let mut tree = ContentTree::new(fixture_config(root, false)).unwrap();
    tree.walk().unwrap();
    tree.link().unwrap();
    tree
}

// =========================================================================
// Tree lookups: panic with a clear message on miss
// =========================================================================

/// Find a real page by `html_path`. Panics if not found.
pub fn find_page<'a>(tree: &'a ContentTree, html_path: &str) -> &'a PageUnit {
    tree.find(html_path).unwrap_or_else(|| {
        let paths: Vec<&str> = tree.page_index.keys().map(String::as_str).collect();
        panic!("page '{html_path}' not found. Available: {paths:?}")
    })
}

/// Find a tag page by tag name. Panics if not found.
pub fn find_tag_page<'a>(tree: &'a ContentTree, tag: &str) -> &'a PageUnit {
    tree.tag_pages
        .iter()
        .find(|p| p.tag_name() == Some(tag))
        .unwrap_or_else(|| {
            let tags: Vec<&str> = tree.tag_pages.iter().filter_map(|p| p.tag_name()).collect();
            panic!("tag page '{tag}' not found. Available: {tags:?}")
        })
}

/// Titles of the given pages, in order.
pub fn page_titles<'a>(tree: &'a ContentTree, ids: &[PageId]) -> Vec<&'a str> {
    ids.iter().map(|id| tree.page(*id).title()).collect()
}

// =========================================================================
// Log capture
// =========================================================================

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return everything it logged,
/// one plain-text line per event (`WARN stacey::page: ...`).
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}

// =========================================================================
// Fixture smoke tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_tree_shape() {
        let tmp = setup_fixtures();
        let tree = linked_fixture_tree(tmp.path());

        assert_eq!(tree.pages.len(), 4);
        assert_eq!(page_titles(&tree, tree.level(1)), vec!["About", "Journal"]);
        assert_eq!(
            page_titles(&tree, tree.level(2)),
            vec!["Spring Trip", "Winter"]
        );

        let journal = find_page(&tree, "/blog/journal/");
        assert_eq!(page_titles(&tree, &journal.children), vec!["Spring Trip", "Winter"]);
        assert_eq!(journal.template, "gallery");

        let winter = find_page(&tree, "/blog/journal/winter/");
        assert_eq!(page_titles(&tree, &winter.parents), vec!["Journal", "Winter"]);
        assert_eq!(winter.thumbnail.as_deref(), Some("thumb.png"));
        assert_eq!(
            winter.permalink,
            "https://example.com/blog/journal/winter/index.html"
        );
    }

    #[test]
    fn fixture_tags_and_virtual_pages() {
        let tmp = setup_fixtures();
        let tree = linked_fixture_tree(tmp.path());

        let travel = find_tag_page(&tree, "travel");
        assert_eq!(travel.template, "tags");
        assert_eq!(page_titles(&tree, &travel.children), vec!["Spring Trip", "Winter"]);
        assert_eq!(
            page_titles(&tree, &find_tag_page(&tree, "notes").children),
            vec!["Journal", "Winter"]
        );

        let top = tree.top_page.as_ref().unwrap();
        assert_eq!(top.title(), "Field Notes");
        assert_eq!(top.html_path, "/blog/");
        assert_eq!(page_titles(&tree, &top.children), vec!["About", "Journal"]);
    }

    #[test]
    fn capture_logs_sees_events_by_level() {
        let logs = capture_logs(|| {
            tracing::warn!(page = "/a/", "something odd");
            tracing::debug!("detail");
        });
        assert!(logs.contains("WARN"));
        assert!(logs.contains("something odd"));
        assert!(logs.contains("/a/"));
        assert!(logs.contains("DEBUG"));
    }

    #[test]
    fn fixture_unnumbered_dir_has_no_page() {
        let tmp = setup_fixtures();
        let tree = linked_fixture_tree(tmp.path());
        assert!(tree.all_pages().all(|p| !p.html_path.contains("scratch")));
        assert!(tree.all_pages().all(|p| p.title() != "Not a page"));
    }
}
