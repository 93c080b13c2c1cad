//! Template registry.
//!
//! Every `*.html` and `*.xml` file in the template directory is compiled once
//! at startup and registered under its file stem: `leaf.html` becomes `leaf`,
//! `feed_entry.xml` becomes `feed_entry`. Pages look templates up by that
//! name. Templates can also pull each other in by file name
//! (`{% include "nav.html" %}`) through a path loader on the same directory.
//!
//! Undefined variables are errors, not empty strings, so a template typo
//! fails the build instead of quietly producing broken pages. Output is not
//! auto-escaped: page bodies are already HTML. Trailing newlines are kept so
//! feed fragments concatenate line by line.

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TEMPLATE_EXTENSIONS: &[&str] = &["html", "xml"];

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template directory not found: {0}")]
    MissingDir(PathBuf),
    #[error("no templates found in {0}")]
    Empty(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Named templates, loaded once and read-only afterwards.
pub struct TemplateSet {
    env: Environment<'static>,
    names: BTreeSet<String>,
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("names", &self.names)
            .finish()
    }
}

fn new_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env
}

impl TemplateSet {
    /// Load every template in `dir`.
    ///
    /// A template that fails to compile is logged and left out. An empty
    /// result is an error: nothing could be rendered.
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        if !dir.is_dir() {
            return Err(TemplateError::MissingDir(dir.to_path_buf()));
        }
        tracing::info!(dir = %dir.display(), "loading templates");

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&&*e.to_string_lossy()))
            })
            .collect();
        files.sort();

        let mut sources = Vec::with_capacity(files.len());
        for path in &files {
            let Some(stem) = path.file_stem() else {
                continue;
            };
            sources.push((stem.to_string_lossy().into_owned(), fs::read_to_string(path)?));
        }

        let mut set = Self::from_sources(sources);
        set.env.set_loader(minijinja::path_loader(dir));
        if set.names.is_empty() {
            return Err(TemplateError::Empty(dir.to_path_buf()));
        }
        for name in &set.names {
            tracing::info!(template = %name, "found template");
        }
        Ok(set)
    }

    /// Build a set from in-memory `(name, source)` pairs.
    pub fn from_sources<I, N, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = new_environment();
        let mut names = BTreeSet::new();
        for (name, source) in sources {
            let name = name.into();
            match env.add_template_owned(name.clone(), source.into()) {
                Ok(()) => {
                    names.insert(name);
                }
                Err(e) => tracing::error!(template = %name, error = %e, "failed to compile template"),
            }
        }
        Self { env, names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Render a registered template against a context.
    pub fn render(&self, name: &str, ctx: &Value) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// Render a one-off template source (used for page bodies).
    pub fn render_str(&self, source: &str, ctx: &Value) -> Result<String, minijinja::Error> {
        self.env.render_str(source, ctx)
    }
}
