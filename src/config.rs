//! Site configuration.
//!
//! A single TOML file describes where content lives, where output goes and
//! how URLs are formed. Every key is optional; unknown keys are rejected to
//! catch typos early.
//!
//! ```toml
//! src_root = "content"        # numbered content tree
//! dest_root = "dist"          # generated site
//! html_root = "/blog/"        # URL prefix of every page
//! html_top = "/blog/"         # URL of the top page
//! template_dir = "templates"  # *.html / *.xml templates
//! content_ext = ".md"         # content file extension
//! rss_file = "feed.rss"       # feed file name under dest_root
//! rss_max_entries = 20
//! hostname = "example.com"
//! scheme = "https"
//! index_file = "index.html"
//! warn_thumbnail = false
//! expand_content = true
//! title = "default_title"     # default page title
//! date = "1970-01-01"         # default page date
//!
//! [globals]                   # anything else templates should see
//! blog_title = "Field Notes"
//! name = "A. Author"
//! ```
//!
//! Relative paths resolve against the directory holding the config file.
//!
//! The loaded [`SiteConfig`] is immutable for the rest of the run. Templates
//! see it through [`SiteConfig::template_globals`], which each page copies
//! into its own context when it is created.

use crate::naming;
use minijinja::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Root of the numbered content tree.
    pub src_root: PathBuf,
    /// Root of the generated site.
    pub dest_root: PathBuf,
    /// URL prefix of every generated page, always ending in `/`.
    pub html_root: String,
    /// URL of the top-level aggregation page.
    pub html_top: String,
    /// Directory holding `*.html` / `*.xml` templates.
    pub template_dir: PathBuf,
    /// Extension (with the dot) that marks a directory's content file.
    pub content_ext: String,
    /// Feed file name, relative to `dest_root`.
    pub rss_file: String,
    /// Maximum number of feed entries.
    pub rss_max_entries: usize,
    /// Host used in permalinks.
    pub hostname: String,
    /// URL scheme used in permalinks.
    pub scheme: String,
    /// Output file name inside each page directory.
    pub index_file: String,
    /// Warn when a page directory has no `thumb.*`.
    pub warn_thumbnail: bool,
    /// Render page bodies as templates before inserting them.
    pub expand_content: bool,
    /// Default page title when a content file has none.
    pub title: String,
    /// Default page date when a content file has none.
    pub date: String,
    /// Free-form values exposed to every template.
    pub globals: BTreeMap<String, toml::Value>,
    /// Per-run values, never read from the file.
    #[serde(skip)]
    pub run: RunInfo,
}

/// Values fixed at the start of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunInfo {
    /// Only render pages whose sources changed.
    pub incremental: bool,
    /// Build timestamp, ISO-8601 without fractional seconds.
    pub update_time: String,
    /// Year of the build.
    pub render_year: String,
}

impl RunInfo {
    pub fn now(incremental: bool) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            incremental,
            update_time: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
            render_year: now.format("%Y").to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            src_root: PathBuf::from("content"),
            dest_root: PathBuf::from("dist"),
            html_root: "/".to_string(),
            html_top: "/".to_string(),
            template_dir: PathBuf::from("templates"),
            content_ext: ".md".to_string(),
            rss_file: "feed.rss".to_string(),
            rss_max_entries: 20,
            hostname: "localhost".to_string(),
            scheme: "http".to_string(),
            index_file: "index.html".to_string(),
            warn_thumbnail: false,
            expand_content: true,
            title: "default_title".to_string(),
            date: "1970-01-01".to_string(),
            globals: BTreeMap::new(),
            run: RunInfo::default(),
        }
    }
}

impl SiteConfig {
    /// Validate values that would otherwise produce broken paths or URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.content_ext.starts_with('.') || self.content_ext.len() < 2 {
            return Err(ConfigError::Validation(
                "content_ext must look like \".md\"".into(),
            ));
        }
        if !self.html_root.starts_with('/') {
            return Err(ConfigError::Validation(
                "html_root must start with '/'".into(),
            ));
        }
        if !self.html_top.starts_with('/') {
            return Err(ConfigError::Validation(
                "html_top must start with '/'".into(),
            ));
        }
        if self.index_file.is_empty() {
            return Err(ConfigError::Validation(
                "index_file must not be empty".into(),
            ));
        }
        if self.rss_file.is_empty() {
            return Err(ConfigError::Validation("rss_file must not be empty".into()));
        }
        if self.rss_max_entries == 0 {
            return Err(ConfigError::Validation(
                "rss_max_entries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths against `base` and normalize URL prefixes.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for path in [&mut self.src_root, &mut self.dest_root, &mut self.template_dir] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self.html_root = naming::with_trailing_slash(&self.html_root);
        self
    }

    /// Attach per-run values.
    pub fn with_run(mut self, run: RunInfo) -> Self {
        self.run = run;
        self
    }

    pub fn incremental(&self) -> bool {
        self.run.incremental
    }

    /// Extension of content files without the leading dot.
    pub fn content_extension(&self) -> &str {
        self.content_ext.trim_start_matches('.')
    }

    /// Every configuration value as a template variable.
    ///
    /// Config keys come first, then `[globals]` (which may shadow them),
    /// then the run values `incremental`, `update_time`, `render_year`.
    pub fn template_globals(&self) -> BTreeMap<String, Value> {
        let mut globals = BTreeMap::new();
        if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(self) {
            for (key, value) in fields {
                if key != "globals" {
                    globals.insert(key, Value::from_serialize(&value));
                }
            }
        }
        for (key, value) in &self.globals {
            globals.insert(key.clone(), Value::from_serialize(value));
        }
        globals.insert("incremental".into(), Value::from(self.run.incremental));
        globals.insert(
            "update_time".into(),
            Value::from(self.run.update_time.clone()),
        );
        globals.insert(
            "render_year".into(),
            Value::from(self.run.render_year.clone()),
        );
        globals
    }

    /// A `[globals]` value as a string, if present and a string.
    pub fn global_str(&self, key: &str) -> Option<&str> {
        self.globals.get(key).and_then(toml::Value::as_str)
    }
}

/// Parse config text without touching the filesystem.
pub fn parse_config(text: &str) -> Result<SiteConfig, ConfigError> {
    let config: SiteConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, resolving relative paths against its directory.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_paths(base))
}

/// Load the given config file, or stock defaults resolved against the
/// working directory when none is given.
pub fn load_or_default(path: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            tracing::debug!("no config file given, using defaults");
            let config = SiteConfig::default();
            config.validate()?;
            Ok(config.resolve_paths(Path::new(".")))
        }
    }
}

/// Returns a fully-commented stock config file with every key and its default.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Stacey Configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Relative paths resolve against the directory holding this file.
# Unknown keys cause an error.

# Numbered content tree: directories named <int>.<slug>, each holding
# one content file.
src_root = "content"

# Where the generated site is written.
dest_root = "dist"

# URL prefix of every generated page.
html_root = "/"

# URL of the top-level page (rendered only if a "top" template exists).
html_top = "/"

# Directory of *.html / *.xml templates, addressed by file stem.
template_dir = "templates"

# Extension of the content file in each page directory.
content_ext = ".md"

# Feed file name under dest_root, and how many entries it keeps.
rss_file = "feed.rss"
rss_max_entries = 20

# Permalinks are <scheme>://<hostname><page url><index_file>.
hostname = "localhost"
scheme = "http"
index_file = "index.html"

# Warn when a page directory has no thumb.* preview image.
warn_thumbnail = false

# Render page bodies as templates, so they can use {{ variables }}.
expand_content = true

# Defaults for pages whose content file leaves them out.
title = "default_title"
date = "1970-01-01"

# ---------------------------------------------------------------------------
# Free-form template variables
# ---------------------------------------------------------------------------
[globals]
# blog_title = "My Site"     # also used as the top page title
# name = "Your Name"
"##
}
