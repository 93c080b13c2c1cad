//! # Stacey
//!
//! A static site generator for numbered content trees. Your filesystem is
//! the data source: directories named `<int>.<slug>` become pages, the number
//! orders siblings, the slug becomes the URL segment, and each directory's
//! content file supplies header fields plus a Markdown body.
//!
//! # Architecture: Walk, Link, Render
//!
//! ```text
//! 1. Walk    content/  →  pages + page_index      (one page per numbered dir)
//! 2. Link    pages     →  page graph               (children, parents, tags, levels)
//! 3. Render  graph     →  dist/ + feed             (full, or incremental by mtime)
//! ```
//!
//! Each phase finishes before the next starts, and the graph is rebuilt from
//! scratch on every run. Nothing is cached between runs except the output
//! itself: incremental mode compares modification times of sources against
//! what is already on disk.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`site`] | End-to-end `check` and `build` runs |
//! | [`tree`] | Walks the source root, links the page graph, drives rendering |
//! | [`page`] | One page: paths, header fields, template choice, context, render |
//! | [`feed`] | Atom feed from the `feed_header` / `feed_entry` templates |
//! | [`content`] | Content file header/body parsing and Markdown conversion |
//! | [`media`] | Media classification and copy-if-newer |
//! | [`templates`] | Template registry loaded once from the template directory |
//! | [`naming`] | `<int>.<slug>` segment parser and URL path helpers |
//! | [`config`] | `config.toml` loading, validation and template globals |
//! | [`output`] | CLI output formatting for `check` and `build` |
//!
//! # Design Decisions
//!
//! ## Runtime Templates
//!
//! Pages are rendered through [minijinja](https://docs.rs/minijinja) templates
//! read from a directory at startup, not compiled into the binary. A site's
//! look lives next to its content and can change without a rebuild of the
//! tool. Undefined variables are errors, so a typo in a template fails the
//! build instead of producing quietly broken pages.
//!
//! ## Arena Page Graph
//!
//! Pages are stored in one `Vec` and refer to each other by index
//! ([`page::PageId`]). Parent/child links are resolved by URL through a single
//! lookup table, so a page graph with cross references needs no shared
//! ownership. Templates receive flattened [`page::PageSummary`] values, not
//! the pages themselves.
//!
//! ## Modification Times, Not Hashes
//!
//! Freshness is decided by comparing modification times: a page re-renders
//! when its content file is strictly newer than its output, and media copies
//! carry over the source's mtime. Copies and renders that did not happen are
//! simply absent from the run's change list, which `--changed-list` hands to
//! upload tooling.

pub mod config;
pub mod content;
pub mod feed;
pub mod media;
pub mod naming;
pub mod output;
pub mod page;
pub mod site;
pub mod templates;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_helpers;
