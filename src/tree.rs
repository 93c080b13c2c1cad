//! The content tree: discovery, linking and rendering of every page.
//!
//! A run goes through three phases, each finishing before the next starts:
//!
//! ```text
//! walk    content/  →  pages + page_index     (one PageUnit per numbered dir)
//! link    pages     →  children, parents, levels, tag_index, tag pages, top page
//! render  pages     →  dest/                   (full, or incremental by mtime)
//! ```
//!
//! Pages live in a flat arena (`pages`) and refer to each other by [`PageId`].
//! `page_index` maps `html_path` to id and is the only way relationships are
//! resolved. Registering the same `html_path` twice (`1.notes` and `2.notes`
//! side by side) keeps the last one walked; both pages are still rendered.
//!
//! ## Incremental rules
//!
//! | Page | Rendered when |
//! |------|---------------|
//! | real | output missing, or content file strictly newer than output |
//! | tag  | output missing, or a page carrying the tag was rendered this run |
//! | top  | output missing, or any real or tag page was rendered this run |
//!
//! Media are copied whenever the source is newer, in both modes.

use crate::config::SiteConfig;
use crate::naming;
use crate::page::{
    self, Context, PageError, PageId, PageIndex, PageSummary, PageUnit, SourceDir, TAGS_TEMPLATE,
    TOP_TEMPLATE,
};
use crate::templates::{TemplateError, TemplateSet};
use minijinja::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("source root not found: {0}")]
    MissingSource(PathBuf),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct ContentTree {
    config: SiteConfig,
    templates: TemplateSet,
    globals: Context,
    /// Real pages in walk order.
    pub pages: Vec<PageUnit>,
    pub page_index: PageIndex,
    /// Tag → pages carrying it, sorted by `html_path`.
    pub tag_index: BTreeMap<String, Vec<PageId>>,
    /// One virtual page per tag, in [`naming::tag_order`].
    /// Depth → pages at that depth, sorted by `html_path`.
    pub levels: BTreeMap<usize, Vec<PageId>>,
    pub tag_pages: Vec<PageUnit>,
    pub top_page: Option<PageUnit>,
    /// Every file written or copied in this run.
    pub updated: Vec<PathBuf>,
    /// Real pages rendered in this run.
    pub updated_pages: Vec<PageId>,
    /// Tags of the real pages rendered in this run.
    pub updated_tags: BTreeSet<String>,
    shared: Context,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Sibling order: highest index first, unnumbered names last.
fn sort_subdirs(names: &mut [String]) {
    names.sort_by_key(|name| std::cmp::Reverse(naming::parse_segment(name).map(|n| n.index)));
}

impl ContentTree {
    /// Load templates from the configured directory. No templates is fatal.
    pub fn new(config: SiteConfig) -> Result<Self, TreeError> {
        let templates = TemplateSet::load(&config.template_dir)?;
        Ok(Self::with_templates(config, templates))
    }

    pub fn with_templates(config: SiteConfig, templates: TemplateSet) -> Self {
        let globals = config.template_globals();
        Self {
            config,
            templates,
            globals,
            pages: Vec::new(),
            page_index: PageIndex::new(),
            tag_index: BTreeMap::new(),
            levels: BTreeMap::new(),
            tag_pages: Vec::new(),
            top_page: None,
            updated: Vec::new(),
            updated_pages: Vec::new(),
            updated_tags: BTreeSet::new(),
            shared: Context::new(),
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn globals(&self) -> &Context {
        &self.globals
    }

    pub fn page(&self, id: PageId) -> &PageUnit {
        &self.pages[id.0]
    }

    pub fn find(&self, html_path: &str) -> Option<&PageUnit> {
        self.page_index.get(html_path).map(|id| self.page(*id))
    }

    /// Pages at `depth`, sorted by `html_path`.
    pub fn level(&self, depth: usize) -> &[PageId] {
        self.levels.get(&depth).map(Vec::as_slice).unwrap_or_default()
    }

    /// Real pages, then tag pages, then the top page.
    pub fn all_pages(&self) -> impl Iterator<Item = &PageUnit> {
        self.pages
            .iter()
            .chain(self.tag_pages.iter())
            .chain(self.top_page.iter())
    }

    fn summaries(&self, ids: &[PageId]) -> Vec<PageSummary> {
        ids.iter().map(|id| self.page(*id).summary()).collect()
    }

    /// Walk the source root and create one page per numbered directory
    /// holding a content file.
    pub fn walk(&mut self) -> Result<(), TreeError> {
        let root = self.config.src_root.clone();
        if !root.is_dir() {
            return Err(TreeError::MissingSource(root));
        }
        tracing::info!(root = %root.display(), "walking content tree");

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if naming::parse_segment(&name).is_none() {
                tracing::debug!(dir = %entry.path().display(), "not a numbered directory, skipping");
                continue;
            }
            let Some(dir) = self.read_source_dir(entry.path(), &root)? else {
                continue;
            };
            if let Some(page) = PageUnit::real(&self.config, &self.globals, dir) {
                self.register(page);
            }
        }
        tracing::info!(pages = self.pages.len(), "walk complete");
        Ok(())
    }

    /// List a directory's immediate files and subdirectories. `None` when it
    /// has no content file.
    fn read_source_dir(&self, path: &Path, root: &Path) -> Result<Option<SourceDir>, TreeError> {
        let io_err = |source: io::Error| TreeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in fs::read_dir(path).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if entry.path().is_dir() {
                subdirs.push(name);
            } else {
                files.push(name);
            }
        }
        files.sort();
        subdirs.sort();
        sort_subdirs(&mut subdirs);

        let ext = self.config.content_extension();
        let content: Vec<&String> = files
            .iter()
            .filter(|f| Path::new(f).extension().is_some_and(|e| e == ext))
            .collect();
        let content_file = match content.as_slice() {
            [] => {
                tracing::warn!(dir = %path.display(), ext = %self.config.content_ext, "no content file");
                return Ok(None);
            }
            [only] => path.join(only),
            [first, ..] => {
                tracing::warn!(dir = %path.display(), using = %first, "ambiguous content files");
                path.join(first)
            }
        };

        Ok(Some(SourceDir {
            path: path.to_path_buf(),
            rel_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
            content_file: Some(content_file),
            subdirs,
            files,
        }))
    }

    /// Add a page to the arena and the lookup table (last write wins).
    pub fn register(&mut self, page: PageUnit) -> PageId {
        let id = PageId(self.pages.len());
        if let Some(previous) = self.page_index.insert(page.html_path.clone(), id) {
            tracing::debug!(
                html_path = %page.html_path,
                replaced = %self.page(previous).identity(),
                "duplicate html path"
            );
        }
        self.pages.push(page);
        id
    }

    /// Resolve relationships, bucket pages by depth and tag, and create the
    /// virtual pages.
    pub fn link(&mut self) -> Result<(), TreeError> {
        for page in &mut self.pages {
            page.populate(&self.config, &self.page_index, &self.templates)?;
        }

        let summaries: Vec<PageSummary> = self.pages.iter().map(PageUnit::summary).collect();
        for page in &mut self.pages {
            let children = page.children.iter().map(|id| summaries[id.0].clone()).collect();
            let parents = page.parents.iter().map(|id| summaries[id.0].clone()).collect();
            page.set_relations(children, parents);
        }

        self.levels.clear();
        self.tag_index.clear();
        for (i, page) in self.pages.iter().enumerate() {
            self.levels.entry(page.depth()).or_default().push(PageId(i));
            for tag in &page.tags {
                self.tag_index.entry(tag.clone()).or_default().push(PageId(i));
            }
        }
        let pages = &self.pages;
        let by_path = |a: &PageId, b: &PageId| page::by_html_path(&pages[a.0], &pages[b.0]);
        for ids in self.levels.values_mut() {
            ids.sort_by(by_path);
        }
        for ids in self.tag_index.values_mut() {
            ids.sort_by(by_path);
        }

        let mut tags: Vec<(&String, &Vec<PageId>)> = self.tag_index.iter().collect();
        tags.sort_by(|a, b| naming::tag_order(a.0, b.0));
        self.tag_pages = tags
            .into_iter()
            .map(|(tag, ids)| {
                let mut page = PageUnit::tag(
                    &self.config,
                    &self.globals,
                    tag,
                    ids.clone(),
                    self.summaries(ids),
                );
                let template = page.fallback_template(TAGS_TEMPLATE, &self.templates)?;
                page.set_template(template);
                Ok(page)
            })
            .collect::<Result<_, PageError>>()?;

        self.top_page = if self.templates.contains(TOP_TEMPLATE) {
            let level1 = self.level(1).to_vec();
            let summaries = self.summaries(&level1);
            Some(PageUnit::top(&self.config, &self.globals, level1, summaries))
        } else {
            tracing::debug!("no top template, skipping top page");
            None
        };

        self.shared = self.shared_context();
        let shared = &self.shared;
        for page in self
            .pages
            .iter_mut()
            .chain(self.tag_pages.iter_mut())
            .chain(self.top_page.iter_mut())
        {
            page.extend_context(shared);
        }
        tracing::info!(
            pages = self.pages.len(),
            tags = self.tag_index.len(),
            "linked content tree"
        );
        Ok(())
    }

    /// `tag_dict`, `level1`, `level2`: the site-wide values every page sees.
    ///
    /// `tag_dict` maps each tag to its tag page's summary and iterates in
    /// tag page order.
    fn shared_context(&self) -> Context {
        let tag_dict: Value = self
            .tag_pages
            .iter()
            .filter_map(|page| {
                let tag = page.tag_name()?;
                Some((tag.to_string(), Value::from_serialize(page.summary())))
            })
            .collect();
        let mut shared = Context::new();
        shared.insert("tag_dict".into(), tag_dict);
        shared.insert(
            "level1".into(),
            Value::from_serialize(self.summaries(self.level(1))),
        );
        shared.insert(
            "level2".into(),
            Value::from_serialize(self.summaries(self.level(2))),
        );
        shared
    }

    /// Render real pages, then tag pages, then the top page.
    ///
    /// The first render error aborts the run; files already written stay.
    pub fn render(&mut self) -> Result<(), TreeError> {
        let incremental = self.config.incremental();
        let expand = self.config.expand_content;

        for (i, page) in self.pages.iter_mut().enumerate() {
            page.copy_media()?;
            if incremental && !page.is_stale()? {
                tracing::debug!(page = %page.html_path, "up to date");
            } else {
                page.render(&self.templates, expand)?;
                self.updated_pages.push(PageId(i));
                self.updated_tags.extend(page.tags.iter().cloned());
            }
            self.updated.extend(page.modified.iter().cloned());
        }

        let mut tags_rendered = false;
        for page in &mut self.tag_pages {
            let tagged = page
                .tag_name()
                .is_some_and(|tag| self.updated_tags.contains(tag));
            if incremental && !tagged && page.dest_file.exists() {
                tracing::debug!(page = %page.html_path, "tag page up to date");
                continue;
            }
            page.render(&self.templates, expand)?;
            tags_rendered = true;
            self.updated.extend(page.modified.iter().cloned());
        }

        let anything_rendered = tags_rendered || !self.updated_pages.is_empty();
        if let Some(page) = &mut self.top_page {
            if incremental && !anything_rendered && page.dest_file.exists() {
                tracing::debug!(page = %page.html_path, "top page up to date");
            } else {
                page.render(&self.templates, expand)?;
                self.updated.extend(page.modified.iter().cloned());
            }
        }

        tracing::info!(
            files = self.updated.len(),
            pages = self.updated_pages.len(),
            "render complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_page(root: &Path, rel: &str, text: &str) {
        let dir = root.join("content").join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.md"), text).unwrap();
    }

    fn test_templates() -> TemplateSet {
        TemplateSet::from_sources([
            ("leaf", "leaf {{ title }}"),
            ("gallery", "gallery {{ title }}{% for c in children %} {{ c.slug }}{% endfor %}"),
            ("tags", "tag {{ tagname }}{% for c in children %} {{ c.html_path }}{% endfor %}"),
        ])
    }

    fn tree_at(tmp: &Path, templates: TemplateSet) -> ContentTree {
        let config = SiteConfig {
            src_root: tmp.join("content"),
            dest_root: tmp.join("dist"),
            ..SiteConfig::default()
        };
        ContentTree::with_templates(config, templates)
    }

    fn linked(tmp: &Path) -> ContentTree {
        let mut tree = tree_at(tmp, test_templates());
        tree.walk().unwrap();
        tree.link().unwrap();
        tree
    }

    #[test]
    fn missing_source_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut tree = tree_at(tmp.path(), test_templates());
        assert!(matches!(tree.walk(), Err(TreeError::MissingSource(_))));
    }

    #[test]
    fn html_paths_strip_prefixes() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.journal", "title: Journal");
        write_page(tmp.path(), "1.journal/3.spring", "title: Spring");
        let tree = linked(tmp.path());

        let paths: Vec<&str> = tree.page_index.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["/journal/", "/journal/spring/"]);
        for page in &tree.pages {
            assert!(!page.html_path.contains("1."));
            assert!(!page.html_path.contains("3."));
        }
    }

    #[test]
    fn unnumbered_dirs_are_traversed_but_not_pages() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "scratch", "title: Scratch");
        write_page(tmp.path(), "scratch/1.kept", "title: Kept");
        write_page(tmp.path(), ".hidden/1.secret", "title: Secret");
        let tree = linked(tmp.path());

        assert_eq!(tree.pages.len(), 1);
        assert_eq!(tree.pages[0].title(), "Kept");
        assert_eq!(tree.pages[0].html_path, "/kept/");
    }

    #[test]
    fn directory_without_content_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("content/1.empty")).unwrap();
        fs::write(tmp.path().join("content/1.empty/notes.txt"), "x").unwrap();
        let tree = linked(tmp.path());
        assert!(tree.pages.is_empty());
    }

    #[test]
    fn first_content_file_wins() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("content/1.a");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.md"), "title: B").unwrap();
        fs::write(dir.join("a.md"), "title: A").unwrap();
        let tree = linked(tmp.path());
        assert_eq!(tree.pages[0].title(), "A");
    }

    #[test]
    fn duplicate_html_path_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.notes", "title: First");
        write_page(tmp.path(), "2.notes", "title: Second");
        let tree = linked(tmp.path());

        assert_eq!(tree.pages.len(), 2);
        assert_eq!(tree.page_index.len(), 1);
        assert_eq!(tree.find("/notes/").unwrap().title(), "Second");
    }

    #[test]
    fn children_newest_first_and_template_by_children() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.journal", "title: Journal");
        write_page(tmp.path(), "1.journal/1.winter", "title: Winter");
        write_page(tmp.path(), "1.journal/2.spring", "title: Spring");
        let tree = linked(tmp.path());

        let journal = tree.find("/journal/").unwrap();
        let children: Vec<&str> = journal
            .children
            .iter()
            .map(|id| tree.page(*id).slug.as_str())
            .collect();
        assert_eq!(children, vec!["spring", "winter"]);
        assert_eq!(journal.template, "gallery");
        assert_eq!(tree.find("/journal/winter/").unwrap().template, "leaf");
    }

    #[test]
    fn levels_bucket_by_depth() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "2.b", "title: B");
        write_page(tmp.path(), "1.a", "title: A");
        write_page(tmp.path(), "1.a/1.x", "title: X");
        let tree = linked(tmp.path());

        let level1: Vec<&str> = tree
            .level(1)
            .iter()
            .map(|id| tree.page(*id).html_path.as_str())
            .collect();
        assert_eq!(level1, vec!["/a/", "/b/"]);
        assert_eq!(tree.level(2).len(), 1);
        assert!(tree.level(3).is_empty());
    }

    #[test]
    fn tag_index_sorted() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.zeta", "tags: travel, food");
        write_page(tmp.path(), "2.alpha", "tags: travel");
        write_page(tmp.path(), "3.mid", "tags: art");
        let tree = linked(tmp.path());

        let tags: Vec<&str> = tree.tag_index.keys().map(String::as_str).collect();
        assert_eq!(tags, vec!["art", "food", "travel"]);
        let travel: Vec<&str> = tree.tag_index["travel"]
            .iter()
            .map(|id| tree.page(*id).html_path.as_str())
            .collect();
        assert_eq!(travel, vec!["/alpha/", "/zeta/"]);
        assert_eq!(tree.tag_pages.len(), 3);
        assert_eq!(tree.tag_pages[2].html_path, "/tags/travel/");
    }

    #[test]
    fn tag_pages_order_ignores_case() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "tags: beta, alpha, Gamma");
        let tree = linked(tmp.path());

        let names: Vec<&str> = tree.tag_pages.iter().filter_map(|p| p.tag_name()).collect();
        assert_eq!(names, vec!["alpha", "beta", "Gamma"]);
    }

    #[test]
    fn tag_dict_points_at_tag_pages() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "tags: travel, Zoo");
        write_page(tmp.path(), "2.b", "tags: travel, art");
        let templates = TemplateSet::from_sources([(
            "leaf",
            "{% for t, p in tag_dict | items %}{{ t }}={{ p.html_path }}:{{ p.child_count }};{% endfor %}",
        )]);
        let mut tree = tree_at(tmp.path(), templates);
        tree.walk().unwrap();
        tree.link().unwrap();
        tree.render().unwrap();

        assert_eq!(
            fs::read_to_string(tmp.path().join("dist/a/index.html")).unwrap(),
            "art=/tags/art/:1;travel=/tags/travel/:2;Zoo=/tags/Zoo/:1;"
        );
    }

    #[test]
    fn zero_index_dir_is_a_page_but_not_a_child() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "title: A");
        write_page(tmp.path(), "1.a/0.intro", "title: Intro");
        let tree = linked(tmp.path());

        let a = tree.find("/a/").unwrap();
        assert!(a.children.is_empty());
        assert_eq!(a.template, "leaf");
        assert_eq!(tree.find("/a/intro/").unwrap().title(), "Intro");
    }

    #[test]
    fn top_page_needs_top_template() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "title: A");
        assert!(linked(tmp.path()).top_page.is_none());

        let mut tree = tree_at(
            tmp.path(),
            TemplateSet::from_sources([("leaf", "x"), ("top", "{{ title }}")]),
        );
        tree.walk().unwrap();
        tree.link().unwrap();
        let top = tree.top_page.as_ref().unwrap();
        assert_eq!(top.children.len(), 1);
        assert_eq!(top.title(), "default_title");
    }

    #[test]
    fn tag_pages_fall_back_to_leaf() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "tags: x");
        let mut tree = tree_at(tmp.path(), TemplateSet::from_sources([("leaf", "{{ title }}")]));
        tree.walk().unwrap();
        tree.link().unwrap();
        assert_eq!(tree.tag_pages[0].template, "leaf");
    }

    #[test]
    fn full_render_writes_every_page() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.journal", "title: Journal\ntags: life");
        write_page(tmp.path(), "1.journal/1.winter", "title: Winter\ntags: life");
        let mut tree = linked(tmp.path());
        tree.render().unwrap();

        let dist = tmp.path().join("dist");
        assert_eq!(
            fs::read_to_string(dist.join("journal/index.html")).unwrap(),
            "gallery Journal winter"
        );
        assert_eq!(
            fs::read_to_string(dist.join("tags/life/index.html")).unwrap(),
            "tag life /journal/ /journal/winter/"
        );
        assert_eq!(tree.updated_pages.len(), 2);
        assert!(tree.updated_tags.contains("life"));
    }

    #[test]
    fn incremental_rerun_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "title: A\ntags: t");
        let mut first = linked(tmp.path());
        first.render().unwrap();

        let config = first.config().clone().with_run(crate::config::RunInfo {
            incremental: true,
            ..Default::default()
        });
        let mut second = ContentTree::with_templates(config, test_templates());
        second.walk().unwrap();
        second.link().unwrap();
        second.render().unwrap();

        assert!(second.updated.is_empty());
        assert!(second.all_pages().all(|p| p.modified.is_empty()));
    }

    #[test]
    fn render_error_aborts() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "1.a", "title: A");
        let mut tree = tree_at(tmp.path(), TemplateSet::from_sources([("leaf", "{{ nope }}")]));
        tree.walk().unwrap();
        tree.link().unwrap();
        assert!(matches!(
            tree.render(),
            Err(TreeError::Page(PageError::Template { .. }))
        ));
    }
}
