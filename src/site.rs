//! End-to-end runs over a loaded configuration.
//!
//! `check` stops after linking; `build` renders and writes the feed. Both
//! rebuild the page graph from scratch.

use crate::config::SiteConfig;
use crate::feed::{self, FeedError};
use crate::tree::{ContentTree, TreeError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Result of a completed build.
#[derive(Debug)]
pub struct Build {
    pub tree: ContentTree,
    /// The feed file, when it was written in this run.
    pub feed: Option<PathBuf>,
}

impl Build {
    /// Every file written or copied in this run, feed included.
    pub fn changed_files(&self) -> Vec<PathBuf> {
        self.tree
            .updated
            .iter()
            .chain(self.feed.iter())
            .cloned()
            .collect()
    }
}

/// Walk and link without writing anything.
pub fn check(config: SiteConfig) -> Result<ContentTree, SiteError> {
    let mut tree = ContentTree::new(config)?;
    tree.walk()?;
    tree.link()?;
    Ok(tree)
}

/// Walk, link, render and write the feed.
pub fn build(config: SiteConfig) -> Result<Build, SiteError> {
    let mut tree = check(config)?;
    tree.render()?;
    let feed = feed::generate_feed(&tree)?;
    Ok(Build { tree, feed })
}
