//! A single page: one numbered content directory, or one virtual page.
//!
//! Real pages come from the tree walk and own a [`SourceDir`]. Virtual pages
//! (one per tag, plus the optional top page) have no source directory; they
//! only aggregate other pages. Both share the same identity, context and
//! render path, distinguished by [`PageKind`].
//!
//! ## Paths
//!
//! ```text
//! source   content/1.journal/2.spring-trip/index.md
//! html     /blog/journal/spring-trip/                (html_root + stripped slugs)
//! dest     dist/journal/spring-trip/index.html       (dest_root + stripped slugs)
//! link     https://example.com/blog/journal/spring-trip/index.html
//! ```
//!
//! ## Context
//!
//! Each page starts from a copy of the site's template globals and layers its
//! own values on top: header fields, derived fields (`html_path`, `permalink`,
//! `tags`, `content_html`, ...), relationships (`children`, `parents`) and,
//! just before rendering, the site-wide `tag_dict`, `level1`, `level2`.
//! Nothing a page writes to its context leaks back into the globals.

use crate::config::SiteConfig;
use crate::content::{self, ContentError, ContentFile};
use crate::media;
use crate::naming;
use crate::templates::TemplateSet;
use minijinja::Value;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Template variables of one page.
pub type Context = BTreeMap<String, Value>;

/// Lookup table from `html_path` to page.
pub type PageIndex = BTreeMap<String, PageId>;

pub const LEAF_TEMPLATE: &str = "leaf";
pub const GALLERY_TEMPLATE: &str = "gallery";
pub const TAGS_TEMPLATE: &str = "tags";
pub const TOP_TEMPLATE: &str = "top";

/// Header value asking for automatic template selection.
const DEFAULT_TEMPLATE: &str = "default";

#[derive(Error, Debug)]
pub enum PageError {
    #[error("{page}: {source}")]
    Content {
        page: String,
        #[source]
        source: ContentError,
    },
    #[error("template error rendering {page}: {source}")]
    Template {
        page: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("no \"leaf\" template to fall back on for {page}")]
    MissingFallback { page: String },
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Position of a real page in the tree's page list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub usize);

/// What the walk found in a content directory.
#[derive(Debug, Clone)]
pub struct SourceDir {
    /// Directory path (under the source root).
    pub path: PathBuf,
    /// Directory path relative to the source root.
    pub rel_path: PathBuf,
    /// The content file, when the directory has one.
    pub content_file: Option<PathBuf>,
    /// Immediate subdirectory names, highest index first.
    pub subdirs: Vec<String>,
    /// Immediate file names, sorted.
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum PageKind {
    Real(SourceDir),
    Tag { name: String },
    Top,
}

/// How other pages appear in a template: `children`, `parents`, `level1`,
/// `level2`, `tag_dict` entries.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageSummary {
    pub html_path: String,
    pub permalink: String,
    pub title: String,
    pub slug: String,
    pub index: Option<u32>,
    pub depth: usize,
    pub date: String,
    pub tags: Vec<String>,
    pub thumbnail: Option<String>,
    pub tagname: Option<String>,
    pub child_count: usize,
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PageUnit {
    pub kind: PageKind,
    /// Sibling order from the `<int>.` prefix. `None` for virtual pages.
    pub index: Option<u32>,
    pub slug: String,
    /// URL path relative to `html_root`, empty or ending in `/`.
    pub html_rel_path: String,
    /// Absolute URL path, always ending in `/`. Lookup key.
    pub html_path: String,
    pub dest_dir: PathBuf,
    pub dest_file: PathBuf,
    pub permalink: String,
    /// Header fields; always holds `title`, `date`, `template`.
    pub meta: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub children: Vec<PageId>,
    /// Breadcrumb trail, outermost first, ending with this page.
    pub parents: Vec<PageId>,
    pub thumbnail: Option<String>,
    /// Resolved template name.
    pub template: String,
    pub content_html: String,
    /// Files written or copied for this page in this run.
    pub modified: Vec<PathBuf>,
    context: Context,
}

/// Natural page order: by `html_path`.
pub fn by_html_path(a: &PageUnit, b: &PageUnit) -> Ordering {
    a.html_path.cmp(&b.html_path)
}

fn join_url(root: &str, rel: &str) -> String {
    format!("{}{}", naming::with_trailing_slash(root), rel)
}

/// Where a page is published.
struct PagePaths {
    html_rel_path: String,
    html_path: String,
    dest_dir: PathBuf,
}

impl PagePaths {
    /// Paths under `html_root` / `dest_root` for a relative URL path.
    fn under_root(config: &SiteConfig, html_rel_path: String) -> Self {
        Self {
            html_path: join_url(&config.html_root, &html_rel_path),
            dest_dir: config.dest_root.join(&html_rel_path),
            html_rel_path,
        }
    }
}

impl PageUnit {
    fn new(
        config: &SiteConfig,
        globals: &Context,
        kind: PageKind,
        index: Option<u32>,
        slug: String,
        paths: PagePaths,
    ) -> Self {
        let PagePaths {
            html_rel_path,
            html_path,
            dest_dir,
        } = paths;
        let dest_file = dest_dir.join(&config.index_file);
        let permalink = format!(
            "{}://{}{}{}",
            config.scheme, config.hostname, html_path, config.index_file
        );
        let mut meta = BTreeMap::new();
        meta.insert("title".to_string(), config.title.clone());
        meta.insert("date".to_string(), config.date.clone());
        meta.insert("template".to_string(), DEFAULT_TEMPLATE.to_string());

        let mut page = Self {
            kind,
            index,
            slug,
            html_rel_path,
            html_path,
            dest_dir,
            dest_file,
            permalink,
            meta,
            tags: Vec::new(),
            children: Vec::new(),
            parents: Vec::new(),
            thumbnail: None,
            template: LEAF_TEMPLATE.to_string(),
            content_html: String::new(),
            modified: Vec::new(),
            context: globals.clone(),
        };
        page.set("html_path", page.html_path.clone());
        page.set("page_path", page.html_path.clone());
        page.set("permalink", page.permalink.clone());
        page.set("slug", page.slug.clone());
        page.set("content_html", "");
        page.set("images", Vec::<String>::new());
        page.set("scripts", Vec::<String>::new());
        page.set("media", Vec::<String>::new());
        page.sync_meta();
        page
    }

    /// A page for a content directory, or `None` when the directory name
    /// lacks the `<int>.<slug>` prefix.
    pub fn real(config: &SiteConfig, globals: &Context, dir: SourceDir) -> Option<Self> {
        let numbered = naming::parse_segment(&dir.path.file_name()?.to_string_lossy())?;
        let paths = PagePaths::under_root(config, naming::html_rel_path(&dir.rel_path));
        Some(Self::new(
            config,
            globals,
            PageKind::Real(dir),
            Some(numbered.index),
            numbered.slug,
            paths,
        ))
    }

    /// The index page of one tag, listing `pages` (already sorted).
    pub fn tag(
        config: &SiteConfig,
        globals: &Context,
        name: &str,
        pages: Vec<PageId>,
        summaries: Vec<PageSummary>,
    ) -> Self {
        let slug = naming::tag_slug(name);
        let paths = PagePaths::under_root(config, format!("tags/{slug}/"));
        let mut page = Self::new(
            config,
            globals,
            PageKind::Tag {
                name: name.to_string(),
            },
            None,
            slug,
            paths,
        );
        page.meta
            .insert("title".to_string(), format!("Posts tagged with '{name}'"));
        page.children = pages;
        page.sync_meta();
        page.set("tagname", name);
        page.set("children", summaries);
        page.set("parents", Vec::<PageSummary>::new());
        page
    }

    /// The top-level aggregation page at `html_top`, listing `level1`.
    pub fn top(
        config: &SiteConfig,
        globals: &Context,
        level1: Vec<PageId>,
        summaries: Vec<PageSummary>,
    ) -> Self {
        let mut page = Self::new(
            config,
            globals,
            PageKind::Top,
            None,
            String::new(),
            PagePaths {
                html_rel_path: String::new(),
                html_path: naming::with_trailing_slash(&config.html_top),
                dest_dir: config.dest_root.clone(),
            },
        );
        let title = config
            .global_str("blog_title")
            .unwrap_or(config.title.as_str())
            .to_string();
        page.meta.insert("title".to_string(), title);
        page.children = level1;
        page.template = TOP_TEMPLATE.to_string();
        page.sync_meta();
        page.set("children", summaries);
        page.set("parents", Vec::<PageSummary>::new());
        page
    }

    fn set(&mut self, key: &str, value: impl Serialize) {
        self.context
            .insert(key.to_string(), Value::from_serialize(&value));
    }

    /// Copy header fields and the values derived from them into the context.
    fn sync_meta(&mut self) {
        for (key, value) in &self.meta {
            self.context
                .insert(key.clone(), Value::from(value.as_str()));
        }
        self.set("tags", self.tags.clone());
        self.set("thumbnail", self.thumbnail.clone());
        self.set("depth", self.parents.len());
        self.set("index", self.index);
        self.set("template", self.template.clone());
    }

    pub fn title(&self) -> &str {
        self.meta.get("title").map(String::as_str).unwrap_or_default()
    }

    pub fn date(&self) -> &str {
        self.meta.get("date").map(String::as_str).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    pub fn is_virtual(&self) -> bool {
        !matches!(self.kind, PageKind::Real(_))
    }

    pub fn source(&self) -> Option<&SourceDir> {
        match &self.kind {
            PageKind::Real(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn content_file(&self) -> Option<&Path> {
        self.source().and_then(|dir| dir.content_file.as_deref())
    }

    pub fn tag_name(&self) -> Option<&str> {
        match &self.kind {
            PageKind::Tag { name } => Some(name),
            _ => None,
        }
    }

    /// Human-readable identity for log and error messages.
    pub fn identity(&self) -> String {
        match &self.kind {
            PageKind::Real(dir) => dir
                .content_file
                .as_deref()
                .unwrap_or(dir.path.as_path())
                .display()
                .to_string(),
            PageKind::Tag { name } => format!("tag '{name}'"),
            PageKind::Top => format!("top page {}", self.html_path),
        }
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary {
            html_path: self.html_path.clone(),
            permalink: self.permalink.clone(),
            title: self.title().to_string(),
            slug: self.slug.clone(),
            index: self.index,
            depth: self.depth(),
            date: self.date().to_string(),
            tags: self.tags.clone(),
            thumbnail: self.thumbnail.clone(),
            tagname: self.tag_name().map(str::to_string),
            child_count: self.children.len(),
            meta: self.meta.clone(),
        }
    }

    /// Resolve relationships, parse the content file and pick a template.
    ///
    /// Children and parents that are not in `page_index` are logged and
    /// left out. Virtual pages are already complete and are left alone.
    pub fn populate(
        &mut self,
        config: &SiteConfig,
        page_index: &PageIndex,
        templates: &TemplateSet,
    ) -> Result<(), PageError> {
        let Some(dir) = self.source() else {
            return Ok(());
        };
        let subdirs = dir.subdirs.clone();
        let content_file = dir.content_file.clone();
        let thumbnail = dir.files.iter().find(|f| media::is_thumbnail(f)).cloned();
        let dir_path = dir.path.clone();

        self.children = subdirs
            .iter()
            .filter_map(|sub| naming::parse_segment(sub))
            .filter(|child| child.index > 0)
            .filter_map(|child| {
                let child_path = format!("{}{}/", self.html_path, child.slug);
                let found = page_index.get(&child_path).copied();
                if found.is_none() {
                    tracing::warn!(page = %self.html_path, child = %child_path, "could not find child page");
                }
                found
            })
            .collect();

        self.parents = naming::breadcrumb_paths(&config.html_root, &self.html_rel_path)
            .into_iter()
            .filter_map(|parent_path| {
                let found = page_index.get(&parent_path).copied();
                if found.is_none() {
                    tracing::warn!(page = %self.html_path, parent = %parent_path, "could not find parent page");
                }
                found
            })
            .collect();

        if thumbnail.is_none() && config.warn_thumbnail {
            tracing::warn!(dir = %dir_path.display(), "no thumb.* found");
        }
        self.thumbnail = thumbnail;

        let parsed = match &content_file {
            Some(path) => content::read_content_file(path).map_err(|source| PageError::Content {
                page: self.identity(),
                source,
            })?,
            None => ContentFile::default(),
        };
        self.meta.extend(parsed.fields);
        self.tags = self
            .meta
            .get("tags")
            .map(|raw| content::split_tags(raw))
            .unwrap_or_default();
        self.template = self.resolve_template(templates)?;
        self.content_html = content::markdown_to_html(&parsed.body);

        tracing::info!(page = %self.html_path, template = %self.template, "generating");

        self.sync_meta();
        self.set("content_html", self.content_html.clone());
        Ok(())
    }

    /// Pick the template named by the `template:` header, or `gallery` for
    /// pages with children and `leaf` otherwise. Unknown names fall back to
    /// `leaf`; a missing `leaf` is fatal.
    fn resolve_template(&self, templates: &TemplateSet) -> Result<String, PageError> {
        let requested = match self.meta.get("template").map(String::as_str) {
            None | Some(DEFAULT_TEMPLATE) if self.children.is_empty() => LEAF_TEMPLATE,
            None | Some(DEFAULT_TEMPLATE) => GALLERY_TEMPLATE,
            Some(name) => name,
        };
        self.fallback_template(requested, templates)
    }

    /// `requested` if it exists, else `leaf` with a warning.
    pub fn fallback_template(
        &self,
        requested: &str,
        templates: &TemplateSet,
    ) -> Result<String, PageError> {
        if templates.contains(requested) {
            return Ok(requested.to_string());
        }
        if !templates.contains(LEAF_TEMPLATE) {
            return Err(PageError::MissingFallback {
                page: self.identity(),
            });
        }
        tracing::warn!(page = %self.identity(), template = %requested, "template not found, using leaf");
        Ok(LEAF_TEMPLATE.to_string())
    }

    pub fn set_template(&mut self, template: String) {
        self.template = template;
        self.set("template", self.template.clone());
    }

    /// Attach the summaries of this page's children and parents.
    pub fn set_relations(&mut self, children: Vec<PageSummary>, parents: Vec<PageSummary>) {
        self.set("children", children);
        self.set("parents", parents);
    }

    /// Layer site-wide values (`tag_dict`, `level1`, `level2`) onto the context.
    pub fn extend_context(&mut self, shared: &Context) {
        self.context
            .extend(shared.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_value(&self) -> Value {
        Value::from_serialize(&self.context)
    }

    /// Whether the output must be regenerated: it is missing, or the
    /// content file was modified after it was written.
    pub fn is_stale(&self) -> Result<bool, PageError> {
        if !self.dest_file.exists() {
            return Ok(true);
        }
        match self.content_file() {
            Some(src) if src.exists() => {
                media::is_newer(src, &self.dest_file).map_err(|source| PageError::Io {
                    path: src.to_path_buf(),
                    source,
                })
            }
            Some(_) => Ok(true),
            None => Ok(!self.is_virtual()),
        }
    }

    /// Copy this page's media next to its output and expose the listings
    /// as `images`, `scripts`, `media`. Virtual pages have none.
    pub fn copy_media(&mut self) -> Result<(), PageError> {
        let Some(dir) = self.source() else {
            return Ok(());
        };
        let src_dir = dir.path.clone();
        let files = dir.files.clone();
        self.create_dest_dir()?;
        let listing =
            media::copy_media(&src_dir, &files, &self.dest_dir).map_err(|source| PageError::Io {
                path: src_dir.clone(),
                source,
            })?;
        self.modified.extend(listing.copied);
        self.set("images", listing.images);
        self.set("scripts", listing.scripts);
        self.set("media", listing.media);
        Ok(())
    }

    fn create_dest_dir(&self) -> Result<(), PageError> {
        fs::create_dir_all(&self.dest_dir).map_err(|source| PageError::Io {
            path: self.dest_dir.clone(),
            source,
        })
    }

    fn template_error(&self, source: minijinja::Error) -> PageError {
        let page = self.identity();
        tracing::error!(page = %page, error = %source, "template error");
        PageError::Template { page, source }
    }

    /// The context templates see: with `expand_content`, `content_html` is
    /// the body rendered as a template against the page context. Page
    /// output and feed entries both go through here.
    pub fn render_context(
        &self,
        templates: &TemplateSet,
        expand_content: bool,
    ) -> Result<Value, minijinja::Error> {
        if !expand_content || self.content_html.is_empty() {
            return Ok(self.context_value());
        }
        let expanded = templates.render_str(&self.content_html, &self.context_value())?;
        let mut ctx = self.context.clone();
        ctx.insert("content_html".to_string(), Value::from(expanded));
        Ok(Value::from_serialize(&ctx))
    }

    /// Render the page through its template and write the output file.
    pub fn render(&mut self, templates: &TemplateSet, expand_content: bool) -> Result<(), PageError> {
        let ctx = self
            .render_context(templates, expand_content)
            .map_err(|e| self.template_error(e))?;
        let html = templates
            .render(&self.template, &ctx)
            .map_err(|e| self.template_error(e))?;

        self.create_dest_dir()?;
        fs::write(&self.dest_file, html).map_err(|source| PageError::Io {
            path: self.dest_file.clone(),
            source,
        })?;
        tracing::info!(file = %self.dest_file.display(), "wrote page");
        self.modified.push(self.dest_file.clone());
        Ok(())
    }
}
