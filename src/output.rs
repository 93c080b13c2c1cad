//! CLI output formatting for `check` and `build`.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every page leads with
//! its sibling index and title; URLs and source files follow as secondary
//! context. The inventory reads as a table of contents of the site while
//! still letting users trace each entry back to a directory.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Pages
//! 001 Journal (2 children) → /journal/
//!     Source: 1.journal/index.md
//!     002 Spring Trip → /journal/spring-trip/
//!         Source: 1.journal/2.spring-trip/index.md
//!     001 Winter → /journal/winter/
//!         Source: 1.journal/1.winter/index.md
//!
//! Tags
//!     travel (2 pages) → /tags/travel/
//!
//! Templates
//!     feed_entry, feed_header, gallery, leaf, tags, top
//! ```
//!
//! ## Build
//!
//! ```text
//! Rendered
//!     /journal/ → journal/index.html
//!     tag travel → tags/travel/index.html
//! Feed → feed.rss
//! Rendered 3 pages, 1 tag page; 5 files updated
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::page::{PageId, PageUnit};
use crate::tree::ContentTree;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format an index as 3-digit zero-padded.
fn format_index(pos: u32) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Format a page header: index + title, child count for galleries, URL.
///
/// ```text
/// 001 Journal (2 children) → /journal/
/// 002 About → /about/
/// ```
fn entity_header(page: &PageUnit) -> String {
    let index = page.index.map(format_index).unwrap_or_else(|| "---".into());
    let title = match page.children.len() {
        0 => page.title().to_string(),
        1 => format!("{} (1 child)", page.title()),
        n => format!("{} ({n} children)", page.title()),
    };
    format!("{index} {title} \u{2192} {}", page.html_path)
}

/// `path` relative to `root`, or unchanged when it lies elsewhere.
fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

struct TreeNode {
    depth: usize,
    id: PageId,
}

/// Depth-first walk from the level-1 pages along `children`.
fn walk_page_tree(tree: &ContentTree) -> Vec<TreeNode> {
    let mut nodes = Vec::new();
    walk_page_tree_recursive(tree, tree.level(1), 0, &mut nodes);
    nodes
}

fn walk_page_tree_recursive(
    tree: &ContentTree,
    ids: &[PageId],
    depth: usize,
    nodes: &mut Vec<TreeNode>,
) {
    for id in ids {
        nodes.push(TreeNode { depth, id: *id });
        walk_page_tree_recursive(tree, &tree.page(*id).children, depth + 1, nodes);
    }
}

// ============================================================================
// Check: content inventory
// ============================================================================

/// Format the inventory of a linked tree: pages, tags, templates.
pub fn format_check_output(tree: &ContentTree) -> Vec<String> {
    let src_root = &tree.config().src_root;
    let mut lines = vec!["Pages".to_string()];

    for node in walk_page_tree(tree) {
        let page = tree.page(node.id);
        let base = indent(node.depth);
        lines.push(format!("{base}{}", entity_header(page)));
        if let Some(file) = page.content_file() {
            lines.push(format!("{base}    Source: {}", relative(file, src_root).display()));
        }
        if !page.tags.is_empty() {
            lines.push(format!("{base}    Tags: {}", page.tags.join(", ")));
        }
    }

    if !tree.tag_pages.is_empty() {
        lines.push(String::new());
        lines.push("Tags".to_string());
        for page in &tree.tag_pages {
            lines.push(format!(
                "    {} ({}) \u{2192} {}",
                page.tag_name().unwrap_or_default(),
                plural(page.children.len(), "page"),
                page.html_path
            ));
        }
    }

    if let Some(top) = &tree.top_page {
        lines.push(String::new());
        lines.push(format!("Top \u{2192} {}", top.html_path));
    }

    lines.push(String::new());
    lines.push("Templates".to_string());
    lines.push(format!(
        "    {}",
        tree.templates().names().collect::<Vec<_>>().join(", ")
    ));

    lines
}

/// Print the inventory to stdout.
pub fn print_check_output(tree: &ContentTree) {
    for line in format_check_output(tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Build: render report
// ============================================================================

/// Format what a render pass wrote.
pub fn format_build_output(tree: &ContentTree, feed: Option<&Path>) -> Vec<String> {
    let dest_root = &tree.config().dest_root;
    let mut lines = Vec::new();

    let rendered: Vec<&PageUnit> = tree
        .all_pages()
        .filter(|p| p.modified.contains(&p.dest_file))
        .collect();
    if !rendered.is_empty() {
        lines.push("Rendered".to_string());
        for page in &rendered {
            let label = match page.tag_name() {
                Some(tag) => format!("tag {tag}"),
                None => page.html_path.clone(),
            };
            lines.push(format!(
                "    {label} \u{2192} {}",
                relative(&page.dest_file, dest_root).display()
            ));
        }
    }

    if let Some(feed) = feed {
        lines.push(format!("Feed \u{2192} {}", relative(feed, dest_root).display()));
    }

    let tag_count = rendered.iter().filter(|p| p.tag_name().is_some()).count();
    lines.push(format!(
        "Rendered {}, {}; {} updated",
        plural(tree.updated_pages.len(), "page"),
        plural(tag_count, "tag page"),
        plural(tree.updated.len() + usize::from(feed.is_some()), "file")
    ));
    lines
}

/// Print the render report to stdout.
pub fn print_build_output(tree: &ContentTree, feed: Option<&Path>) {
    for line in format_build_output(tree, feed) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
